//! # Error Report
//!
//! Lifecycle operations keep going when a single service fails. Each failure
//! is recorded here under an attribute naming the step that failed (`up`,
//! `build`, `database_check`, ...). Recording the same attribute twice keeps
//! its original position and replaces the message, so the number of entries
//! counts distinct failing steps. That count is the process exit status.

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub attribute: String,
    pub message: String,
    /// Extra context, typically the names of the services involved.
    pub details: Vec<String>,
}

/// Insertion-ordered collection of failures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    entries: Vec<ReportEntry>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` under `attribute`, replacing any earlier message.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        let attribute = attribute.into();
        let message = message.into();
        log::debug!("recording failure {}: {}", attribute, message);
        match self.entries.iter_mut().find(|e| e.attribute == attribute) {
            Some(entry) => entry.message = message,
            None => self.entries.push(ReportEntry {
                attribute,
                message,
                details: Vec::new(),
            }),
        }
    }

    /// Record a failure together with one detail line.
    pub fn add_with_detail(
        &mut self,
        attribute: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        let attribute = attribute.into();
        self.add(attribute.clone(), message);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.attribute == attribute) {
            entry.details.push(detail.into());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.entries.iter().any(|e| e.attribute == attribute)
    }

    pub fn get(&self, attribute: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.attribute == attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    /// Exit status for the run, saturating at the largest portable code.
    pub fn exit_code(&self) -> i32 {
        self.entries.len().min(255) as i32
    }

    /// `attribute=message` lines printed at the end of a run.
    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                if e.details.is_empty() {
                    format!("{}={}", e.attribute, e.message)
                } else {
                    format!("{}={} [{}]", e.attribute, e.message, e.details.join(", "))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_exits_zero() {
        let report = ErrorReport::new();
        assert!(report.is_empty());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_same_attribute_counts_once() {
        let mut report = ErrorReport::new();
        report.add("up", "see terminal output");
        report.add("build", "see terminal output");
        report.add("up", "container exited");

        assert_eq!(report.len(), 2);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.get("up").unwrap().message, "container exited");
        let order: Vec<&str> = report.iter().map(|e| e.attribute.as_str()).collect();
        assert_eq!(order, vec!["up", "build"]);
    }

    #[test]
    fn test_details_accumulate() {
        let mut report = ErrorReport::new();
        report.add_with_detail("up", "see terminal output", "core");
        report.add_with_detail("up", "see terminal output", "iam");
        assert_eq!(report.len(), 1);
        assert_eq!(report.get("up").unwrap().details, vec!["core", "iam"]);
        assert_eq!(
            report.summary_lines(),
            vec!["up=see terminal output [core, iam]".to_string()]
        );
    }

    #[test]
    fn test_summary_without_details() {
        let mut report = ErrorReport::new();
        report.add("database_check", "relation does not exist");
        assert_eq!(
            report.summary_lines(),
            vec!["database_check=relation does not exist".to_string()]
        );
    }
}
