//! Daily metric sources
//!
//! A source returns one row per day in the canonical schema (see
//! [`crate::models::columns`]), with columns named the way the rest of the
//! crate expects them, whatever the upstream field names are.

use std::future::Future;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::MetricTable;

pub mod file;
pub mod ga4;

pub use file::JsonFileSource;
pub use ga4::{Ga4Client, DEFAULT_GA4_ENDPOINT};

/// Something that can produce a daily metric table for a date range
pub trait MetricsSource {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Fetch daily rows for `start..=end`
    ///
    /// # Errors
    /// `CoreError::AuthenticationFailed` when the credentials are rejected,
    /// `CoreError::ServiceUnavailable` for everything else that stops the
    /// fetch (transport, timeout, unexpected status, unparsable body).
    fn fetch(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<MetricTable>> + Send;
}
