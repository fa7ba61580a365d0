//! # Output Configuration
//!
//! Color and emoji policy for user-facing output, plus the rendering of the
//! end-of-run error summary.
//!
//! The policy honors, in order:
//! - `--color=never|always|auto`
//! - `NO_COLOR` (any value disables colors, https://no-color.org/)
//! - `CLICOLOR=0` disables and `CLICOLOR_FORCE=1` forces colors
//! - `TERM=dumb`
//! - otherwise the terminal's own capabilities
//!
//! ```rust,ignore
//! use stackctl::output::{emoji, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} generating manifests", emoji(&out, "🔧", "[GEN]"));
//! ```

use std::env;

use console::style;

use crate::report::ErrorReport;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the policy from the `--color` flag and the environment.
    ///
    /// `always` overrides `NO_COLOR`; `never` disables; anything else
    /// detects from the environment and terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji` when colors are enabled, else the plain alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Summary lines for a finished run; empty when nothing failed.
pub fn report_lines(config: &OutputConfig, report: &ErrorReport) -> Vec<String> {
    if report.is_empty() {
        return Vec::new();
    }
    let marker = emoji(config, "❌", "[ERR]");
    let mut lines = vec![format!("{} {} error(s)", marker, report.len())];
    for line in report.summary_lines() {
        if config.use_color {
            lines.push(format!("  {}", style(line).red()));
        } else {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "🔧", "[GEN]"), "🔧");
        assert_eq!(emoji(&OutputConfig::without_color(), "🔧", "[GEN]"), "[GEN]");
    }

    #[test]
    fn test_report_lines_plain() {
        let mut report = ErrorReport::new();
        assert!(report_lines(&OutputConfig::without_color(), &report).is_empty());

        report.add_with_detail("up", "see terminal output", "core");
        report.add("proxy", "port in use");
        let lines = report_lines(&OutputConfig::without_color(), &report);
        assert_eq!(lines[0], "[ERR] 2 error(s)");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("proxy=port in use"));
    }
}
