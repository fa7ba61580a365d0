//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_project(configs::PROJECT);
//!     fixture.command().arg("list").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Settings documents for testing.
#[allow(dead_code)]
pub mod configs {
    /// Instance backend with an identity service, a built service, a disabled
    /// service and the reverse proxy.
    pub const PROJECT: &str = r#"
config:
  name: acme
components:
  be:
    components:
      infra:
        components:
          cluster:
            config:
              type: instance
      application:
        config:
          feature_set: ci
          feature_from_branch: false
        environment:
          log_level: info
        components:
          platform:
            environment:
              rails_env: test
            components:
              iam:
                config:
                  type: basic
              core:
                environment:
                  db_pool: 5
              billing:
                config:
                  enabled: false
          services:
            components:
              nginx:
                config:
                  type: basic
                  image: nginx:1.25
"#;

    /// Overlay for the `test` environment.
    pub const TEST_ENV: &str = r#"
components:
  be:
    components:
      application:
        environment:
          log_level: debug
"#;

    /// Settings without `config.name`.
    pub const NAMELESS: &str = r#"
components:
  be:
    components:
      application:
        config:
          feature_set: ci
"#;

    pub const INVALID_YAML: &str = "config: [unclosed";
}

/// A temporary project directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `config/deployment.yml`.
    pub fn with_project(self, content: &str) -> Self {
        self.with_file("config/deployment.yml", content)
    }

    /// Write `config/environments/{env}.yml`.
    #[allow(dead_code)]
    pub fn with_environment(self, env: &str, content: &str) -> Self {
        self.with_file(&format!("config/environments/{}.yml", env), content)
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// `stackctl` in the fixture directory, env `test`, free of ambient overrides.
    #[allow(dead_code)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stackctl");
        cmd.current_dir(self.path())
            .env_remove("STACK_ENV")
            .env_remove("STACK_PROFILE")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .args(["--env", "test"]);
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
