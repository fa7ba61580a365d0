//! # Error Handling
//!
//! This module defines the centralized error type for `stackctl`. It uses
//! `thiserror` to build a single `Error` enum covering every fatal failure
//! mode of the library, each variant carrying enough context to print a
//! useful message.
//!
//! ## Fatal errors versus recorded failures
//!
//! `Error` is reserved for failures that stop the current operation: a
//! missing project root, an unknown settings path, a template that cannot be
//! found or rendered, an external tool that could not be spawned. Failures
//! of individual services during a lifecycle operation are not errors in
//! this sense; they are recorded in a [`crate::report::ErrorReport`] and the
//! operation carries on with the next service.
//!
//! The `Result` alias is used across the crate.

use thiserror::Error;

/// Main error type for stackctl operations
#[derive(Error, Debug)]
pub enum Error {
    /// The project configuration could not be located or is malformed.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A strict settings lookup addressed a path that is not present.
    #[error("Unknown settings path: {path}")]
    UnknownSettingsPath { path: String },

    /// No template exists for a component type on the active backend.
    #[error("Template not found: {backend}/{template_type}.yml")]
    TemplateNotFound {
        template_type: String,
        backend: String,
    },

    /// A template could not be rendered.
    ///
    /// May include the name of the problematic variable when applicable.
    #[error("Template processing error: {message}{}", variable.as_ref().map(|v| format!(" (variable: {})", v)).unwrap_or_default())]
    Template {
        message: String,
        /// The template variable that caused the error, if applicable
        variable: Option<String>,
    },

    /// An external tool could not be started at all.
    #[error("Failed to run {program}: {message}")]
    CommandSpawn { program: String, message: String },

    /// An external tool ran and exited unsuccessfully where a result was required.
    #[error("Command failed: {command} - {stderr}")]
    ExternalCommand { command: String, stderr: String },

    /// A prerequisite of a backend operation is missing.
    #[error("Precondition not met: {message}")]
    PreconditionUnmet { message: String },

    /// An error occurred while reading or writing generated files.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A base64 decoding error, wrapped from `base64::DecodeError`.
    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Shorthand for a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let error = Error::config("config/deployment.yml not found");
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("config/deployment.yml not found"));
        assert!(!display.contains("hint"));
    }

    #[test]
    fn test_error_display_config_with_hint() {
        let error = Error::Config {
            message: "feature_set is missing".to_string(),
            hint: Some("Add 'feature_set:' under application config".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("feature_set is missing"));
        assert!(display.contains("hint: Add 'feature_set:'"));
    }

    #[test]
    fn test_error_display_unknown_path() {
        let error = Error::UnknownSettingsPath {
            path: "components.be.config.nope".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Unknown settings path: components.be.config.nope"
        );
    }

    #[test]
    fn test_error_display_template_not_found() {
        let error = Error::TemplateNotFound {
            template_type: "worker".to_string(),
            backend: "compose".to_string(),
        };
        assert_eq!(format!("{}", error), "Template not found: compose/worker.yml");
    }

    #[test]
    fn test_error_display_template_with_variable() {
        let error = Error::Template {
            message: "undefined variable".to_string(),
            variable: Some("service.image".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Template processing error: undefined variable"));
        assert!(display.contains("(variable: service.image)"));
    }

    #[test]
    fn test_error_display_command_spawn() {
        let error = Error::CommandSpawn {
            program: "kubectl".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Failed to run kubectl: No such file or directory"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: Error = io.into();
        assert!(format!("{}", error).starts_with("I/O error"));
    }

    #[test]
    fn test_error_from_yaml() {
        let yaml = serde_yaml::from_str::<serde_yaml::Value>("a: [b").unwrap_err();
        let error: Error = yaml.into();
        assert!(format!("{}", error).starts_with("YAML parsing error"));
    }
}
