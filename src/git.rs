//! VCS metadata used for naming.
//!
//! Uses the system `git` binary. Outside a working tree the branch is absent
//! and the commit falls back to [`NO_SHA`].

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Commit placeholder when no repository is available.
pub const NO_SHA: &str = "no-sha";

/// Branch and commit of the project checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsInfo {
    pub branch: Option<String>,
    pub sha: String,
}

impl VcsInfo {
    pub fn detect(dir: &Path) -> Self {
        Self {
            branch: branch_name(dir),
            sha: short_sha(dir),
        }
    }

    /// Metadata for a directory that is not under version control.
    pub fn untracked() -> Self {
        Self {
            branch: None,
            sha: NO_SHA.to_string(),
        }
    }
}

/// Current branch with every character outside `[A-Za-z0-9-]` replaced by `-`.
pub fn branch_name(dir: &Path) -> Option<String> {
    match rev_parse(dir, &["--abbrev-ref", "HEAD"]) {
        Ok(name) if !name.is_empty() => Some(sanitize_branch(&name)),
        Ok(_) => None,
        Err(e) => {
            log::debug!("no branch for {}: {}", dir.display(), e);
            None
        }
    }
}

/// Abbreviated commit hash, or [`NO_SHA`].
pub fn short_sha(dir: &Path) -> String {
    rev_parse(dir, &["--short", "HEAD"])
        .ok()
        .filter(|sha| !sha.is_empty())
        .unwrap_or_else(|| NO_SHA.to_string())
}

pub fn sanitize_branch(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

fn rev_parse(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("rev-parse")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::CommandSpawn {
            program: "git".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ExternalCommand {
            command: format!("git rev-parse {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
