//! Error types for kpiboard-core
//!
//! Provides the error taxonomy of the pipeline with thiserror, plus a
//! stage report used for graceful degradation: a failing KPI or a
//! failing external service is recorded instead of aborting the run.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kpiboard operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // External services
    // ===================
    #[error("Authentication failed for {service}: {message}")]
    AuthenticationFailed { service: String, message: String },

    #[error("{service} unavailable: {message}")]
    ServiceUnavailable { service: String, message: String },

    // ===================
    // Data errors
    // ===================
    #[error("KPI '{kpi}' not found in historical data columns: [{}]", .available.join(", "))]
    MissingKpi { kpi: String, available: Vec<String> },

    #[error("{metric} undefined on {date}: division by zero")]
    DivisionUndefined { metric: String, date: NaiveDate },

    #[error("Insufficient history for {model} model: need at least {required} points, got {actual}")]
    InsufficientHistory {
        model: String,
        required: usize,
        actual: usize,
    },

    #[error("Invalid forecast horizon: {0}")]
    InvalidHorizon(String),

    #[error("Duplicate date in metric table: {date}")]
    DuplicateDate { date: NaiveDate },

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    // ===================
    // Config errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML in {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON in {path}: {message}")]
    JsonParse {
        path: PathBuf,
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn auth_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run rather than one stage
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::AuthenticationFailed { .. })
    }
}

/// Result alias used throughout the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Severity level for stage failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Non-critical, the panel renders with degraded content
    Warning,
    /// The affected KPI panel could not be computed
    Error,
    /// Cannot continue
    Fatal,
}

/// Pipeline stage an issue was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Derive,
    Aggregate,
    Forecast,
    Insight,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Derive => "derive",
            Stage::Aggregate => "aggregate",
            Stage::Forecast => "forecast",
            Stage::Insight => "insight",
        }
    }
}

/// Individual issue entry in a pipeline report
#[derive(Debug, Clone, Serialize)]
pub struct StageIssue {
    /// KPI the issue is scoped to (None = whole run)
    pub kpi: Option<String>,
    pub stage: Stage,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Actionable suggestion for user (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl StageIssue {
    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kpi: None,
            stage,
            message: message.into(),
            severity: ErrorSeverity::Warning,
            suggestion: None,
        }
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kpi: None,
            stage,
            message: message.into(),
            severity: ErrorSeverity::Error,
            suggestion: None,
        }
    }

    /// Scope this issue to a single KPI
    pub fn for_kpi(mut self, kpi: impl Into<String>) -> Self {
        self.kpi = Some(kpi.into());
        self
    }

    /// Add an actionable suggestion to this issue
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create user-friendly issue from CoreError with context-aware suggestions
    ///
    /// Severity follows the propagation policy: data-quality problems are
    /// warnings, a KPI that cannot be computed is an error, credentials are fatal.
    pub fn from_core_error(stage: Stage, error: &CoreError) -> Self {
        let (severity, suggestion) = match error {
            CoreError::AuthenticationFailed { service, .. } => (
                ErrorSeverity::Fatal,
                Some(format!("Check the {} credentials (token expired or revoked?)", service)),
            ),
            CoreError::ServiceUnavailable { .. } if stage == Stage::Insight => (
                ErrorSeverity::Warning,
                Some("Insights unavailable, the rest of the dashboard is unaffected".to_string()),
            ),
            CoreError::ServiceUnavailable { .. } => (
                ErrorSeverity::Error,
                Some("Transient failure, run again later".to_string()),
            ),
            CoreError::MissingKpi { available, .. } => (
                ErrorSeverity::Error,
                Some(format!("Pick one of: {}", available.join(", "))),
            ),
            CoreError::DivisionUndefined { .. } => (ErrorSeverity::Warning, None),
            CoreError::InsufficientHistory { required, .. } => (
                ErrorSeverity::Warning,
                Some(format!(
                    "Fetch at least {} days of history (--history-days)",
                    required
                )),
            ),
            CoreError::FileRead { path, .. } => (
                ErrorSeverity::Error,
                Some(format!("Check permissions: chmod +r {}", path.display())),
            ),
            _ => (ErrorSeverity::Error, None),
        };

        Self {
            kpi: None,
            stage,
            message: error.to_string(),
            severity,
            suggestion,
        }
    }
}

/// Report of issues encountered during a pipeline run
///
/// Enables graceful degradation by tracking partial failures
/// instead of failing completely on any error.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineReport {
    pub issues: Vec<StageIssue>,
    pub records_fetched: usize,
    pub kpis_requested: usize,
    pub kpis_failed: usize,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: StageIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, stage: Stage, message: impl Into<String>) {
        self.issues.push(StageIssue::warning(stage, message));
    }

    /// Returns true if there are any fatal issues
    pub fn has_fatal_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|e| e.severity == ErrorSeverity::Fatal)
    }

    /// Returns true if there are any issues (including warnings)
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues scoped to one KPI
    pub fn issues_for<'a>(&'a self, kpi: &'a str) -> impl Iterator<Item = &'a StageIssue> + 'a {
        self.issues
            .iter()
            .filter(move |e| e.kpi.as_deref() == Some(kpi))
    }

    /// Returns count by severity
    pub fn issue_count(&self) -> (usize, usize, usize) {
        let warnings = self
            .issues
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Warning)
            .count();
        let errors = self
            .issues
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Error)
            .count();
        let fatal = self
            .issues
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Fatal)
            .count();
        (warnings, errors, fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_severity_counting() {
        let mut report = PipelineReport::new();
        report.add_warning(Stage::Derive, "null engagement");
        report.add_issue(StageIssue::error(Stage::Aggregate, "missing column"));
        report.add_issue(StageIssue::from_core_error(
            Stage::Fetch,
            &CoreError::auth_failed("GA4", "401"),
        ));

        let (warnings, errors, fatal) = report.issue_count();
        assert_eq!(warnings, 1);
        assert_eq!(errors, 1);
        assert_eq!(fatal, 1);
        assert!(report.has_fatal_errors());
    }

    #[test]
    fn test_missing_kpi_message_lists_columns() {
        let err = CoreError::MissingKpi {
            kpi: "revenue".to_string(),
            available: vec!["sessions".to_string(), "users".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'revenue'"));
        assert!(msg.contains("sessions, users"));
    }

    #[test]
    fn test_insight_outage_is_warning() {
        let issue = StageIssue::from_core_error(
            Stage::Insight,
            &CoreError::unavailable("chat completions", "timeout"),
        );
        assert_eq!(issue.severity, ErrorSeverity::Warning);

        let fetch = StageIssue::from_core_error(
            Stage::Fetch,
            &CoreError::unavailable("GA4", "timeout"),
        );
        assert_eq!(fetch.severity, ErrorSeverity::Error);
    }

    #[test]
    fn test_issues_for_kpi() {
        let mut report = PipelineReport::new();
        report.add_issue(StageIssue::warning(Stage::Forecast, "short").for_kpi("sessions"));
        report.add_issue(StageIssue::warning(Stage::Forecast, "short").for_kpi("users"));
        assert_eq!(report.issues_for("sessions").count(), 1);
        assert_eq!(report.issues_for("bounce_rate_pct").count(), 0);
    }
}
