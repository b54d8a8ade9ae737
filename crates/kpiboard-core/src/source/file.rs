//! Offline metric source backed by a JSON file
//!
//! The file holds an array of daily records in the canonical schema:
//!
//! ```json
//! [
//!   {"date": "2025-01-01", "sessions": 100, "users": 80,
//!    "engagement_duration": 24000, "bounce_rate": 0.5}
//! ]
//! ```
//!
//! Useful for demos and for re-running a report on exported data without
//! analytics credentials.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::MetricsSource;
use crate::error::{CoreError, Result};
use crate::models::{MetricRecord, MetricTable};

/// Reads daily records from a JSON file on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<MetricRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::FileRead {
                path: self.path.clone(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| CoreError::JsonParse {
            path: self.path.clone(),
            message: e.to_string(),
            source: e,
        })
    }
}

impl MetricsSource for JsonFileSource {
    fn name(&self) -> &str {
        "file"
    }

    /// The property id is ignored: a file holds a single property
    async fn fetch(&self, _property_id: &str, start: NaiveDate, end: NaiveDate) -> Result<MetricTable> {
        let mut records = self.load().await?;
        let total = records.len();
        records.retain(|r| r.date >= start && r.date <= end);

        tracing::info!(
            path = %self.path.display(),
            kept = records.len(),
            total,
            "Loaded metric records from file"
        );
        MetricTable::from_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_filters_range() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"date": "2024-12-31", "sessions": 90}},
                {{"date": "2025-01-01", "sessions": 100, "bounce_rate": 0.5}},
                {{"date": "2025-01-02", "sessions": 110, "bounce_rate": null}},
                {{"date": "2025-01-03", "sessions": 120}}
            ]"#
        )
        .unwrap();

        let source = JsonFileSource::new(file.path());
        let table = source
            .fetch("ignored", date(2025, 1, 1), date(2025, 1, 2))
            .await
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.first_date(), Some(date(2025, 1, 1)));
        assert_eq!(table.records()[0].get("bounce_rate"), Some(0.5));
        assert_eq!(table.records()[1].get("bounce_rate"), None);
        assert!(table.has_column("bounce_rate"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let source = JsonFileSource::new("/nonexistent/kpiboard/metrics.json");
        let err = source
            .fetch("p", date(2025, 1, 1), date(2025, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FileRead { .. }));
    }

    #[tokio::test]
    async fn test_fetch_duplicate_dates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"date": "2025-01-01", "sessions": 1}}, {{"date": "2025-01-01", "sessions": 2}}]"#
        )
        .unwrap();

        let err = JsonFileSource::new(file.path())
            .fetch("p", date(2025, 1, 1), date(2025, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateDate { .. }));
    }
}
