//! Google Analytics 4 Data API client
//!
//! Calls `properties/{id}:runReport` with a bearer token, one `date`
//! dimension and the four raw metrics the dashboard needs. Metric values
//! come back as strings; they are parsed here and renamed to the canonical
//! columns using the response's `metricHeaders`.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::MetricsSource;
use crate::error::{CoreError, Result};
use crate::models::{columns, MetricRecord, MetricTable};

/// Public GA4 Data API base URL
pub const DEFAULT_GA4_ENDPOINT: &str = "https://analyticsdata.googleapis.com/v1beta";

const SERVICE: &str = "GA4";

/// GA4 metric name -> canonical column
const METRICS: [(&str, &str); 4] = [
    ("sessions", columns::SESSIONS),
    ("activeUsers", columns::USERS),
    ("userEngagementDuration", columns::ENGAGEMENT_DURATION),
    ("bounceRate", columns::BOUNCE_RATE),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest {
    date_ranges: Vec<DateRange>,
    dimensions: Vec<Named>,
    metrics: Vec<Named>,
    keep_empty_rows: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    metric_headers: Vec<Named>,
    /// Absent when the range has no data
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    dimension_values: Vec<Value>,
    metric_values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Value {
    #[serde(default)]
    value: String,
}

/// Error body returned by Google APIs
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// GA4 runReport client
#[derive(Debug, Clone)]
pub struct Ga4Client {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl Ga4Client {
    /// Create a client with a request timeout
    ///
    /// `endpoint` is the API base (normally [`DEFAULT_GA4_ENDPOINT`]); a
    /// trailing slash is ignored.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::unavailable(SERVICE, format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn report_url(&self, property_id: &str) -> String {
        format!("{}/properties/{}:runReport", self.endpoint, property_id)
    }
}

impl MetricsSource for Ga4Client {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn fetch(&self, property_id: &str, start: NaiveDate, end: NaiveDate) -> Result<MetricTable> {
        let url = self.report_url(property_id);
        tracing::info!(property_id, %start, %end, "Fetching GA4 report");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&build_request(start, end))
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            tracing::debug!(%status, body = %body, "GA4 request rejected");
            return Err(match status.as_u16() {
                401 | 403 => CoreError::auth_failed(SERVICE, message),
                _ => CoreError::unavailable(SERVICE, format!("HTTP {}: {}", status, message)),
            });
        }

        let table = parse_run_report(&body)?;
        tracing::info!(rows = table.len(), "GA4 report fetched");
        Ok(table)
    }
}

fn build_request(start: NaiveDate, end: NaiveDate) -> RunReportRequest {
    RunReportRequest {
        date_ranges: vec![DateRange {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        }],
        dimensions: vec![Named {
            name: "date".to_string(),
        }],
        metrics: METRICS
            .iter()
            .map(|(name, _)| Named {
                name: name.to_string(),
            })
            .collect(),
        keep_empty_rows: true,
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

fn canonical_column(ga4_name: &str) -> Option<&'static str> {
    METRICS
        .iter()
        .find(|(name, _)| *name == ga4_name)
        .map(|(_, column)| *column)
}

/// Parse a runReport JSON body into a metric table
///
/// Unknown metric headers are skipped. A value that is not a number is
/// stored as null for that day.
pub fn parse_run_report(body: &str) -> Result<MetricTable> {
    let report: RunReportResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::unavailable(SERVICE, format!("Malformed runReport body: {}", e)))?;

    let headers: Vec<Option<&'static str>> = report
        .metric_headers
        .iter()
        .map(|h| canonical_column(&h.name))
        .collect();

    let mut records = Vec::with_capacity(report.rows.len());
    for row in &report.rows {
        let raw_date = row
            .dimension_values
            .first()
            .map(|v| v.value.as_str())
            .unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d").map_err(|e| {
            CoreError::unavailable(SERVICE, format!("Bad date dimension '{}': {}", raw_date, e))
        })?;

        let mut record = MetricRecord::new(date);
        for (column, value) in headers.iter().zip(&row.metric_values) {
            if let Some(column) = column {
                record.set(*column, value.value.trim().parse::<f64>().ok());
            }
        }
        records.push(record);
    }

    MetricTable::from_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "dimensionHeaders": [{"name": "date"}],
        "metricHeaders": [
            {"name": "sessions", "type": "TYPE_INTEGER"},
            {"name": "activeUsers", "type": "TYPE_INTEGER"},
            {"name": "userEngagementDuration", "type": "TYPE_SECONDS"},
            {"name": "bounceRate", "type": "TYPE_FLOAT"}
        ],
        "rows": [
            {
                "dimensionValues": [{"value": "20250102"}],
                "metricValues": [{"value": "120"}, {"value": "95"}, {"value": "27000"}, {"value": "0.41"}]
            },
            {
                "dimensionValues": [{"value": "20250101"}],
                "metricValues": [{"value": "100"}, {"value": "80"}, {"value": "24000"}, {"value": "0.5"}]
            }
        ],
        "rowCount": 2,
        "kind": "analyticsData#runReport"
    }"#;

    #[test]
    fn test_parse_run_report_canonical_columns() {
        let table = parse_run_report(REPORT).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &["bounce_rate", "engagement_duration", "sessions", "users"]
        );
        // Sorted by date regardless of response order
        let first = &table.records()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(first.get("sessions"), Some(100.0));
        assert_eq!(first.get("users"), Some(80.0));
        assert_eq!(first.get("engagement_duration"), Some(24000.0));
        assert_eq!(first.get("bounce_rate"), Some(0.5));
    }

    #[test]
    fn test_parse_run_report_without_rows() {
        let table = parse_run_report(r#"{"metricHeaders": [], "kind": "analyticsData#runReport"}"#)
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_run_report_bad_date() {
        let body = r#"{
            "metricHeaders": [{"name": "sessions"}],
            "rows": [{"dimensionValues": [{"value": "2025-01-01"}], "metricValues": [{"value": "1"}]}]
        }"#;
        let err = parse_run_report(body).unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_parse_run_report_malformed() {
        let err = parse_run_report("<html>oops</html>").unwrap_err();
        assert!(err.to_string().contains("Malformed runReport body"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = build_request(
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["dateRanges"][0]["startDate"], "2024-11-01");
        assert_eq!(json["dateRanges"][0]["endDate"], "2025-01-09");
        assert_eq!(json["dimensions"][0]["name"], "date");
        assert_eq!(json["metrics"][1]["name"], "activeUsers");
        assert_eq!(json["metrics"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_error_message_from_google_body() {
        let body = r#"{"error": {"code": 403, "message": "User does not have sufficient permissions", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("User does not have sufficient permissions")
        );
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn test_report_url_trims_slash() {
        let client = Ga4Client::new(
            "https://example.test/v1beta/",
            "token",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.report_url("12345"),
            "https://example.test/v1beta/properties/12345:runReport"
        );
    }
}
