//! Derived KPI columns
//!
//! The analytics API returns raw daily fields; the dashboard reports on a
//! few secondary KPIs computed from them, row by row:
//! - `avg_engagement_time` = `engagement_duration` / `sessions` (seconds)
//! - `bounce_rate_pct` = `bounce_rate` * 100
//!
//! A day with zero sessions has no defined average engagement time. That
//! day gets a null value and is listed in the outcome; the rest of the
//! table is unaffected.

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::models::metrics::{columns, MetricTable};

/// What a derivation pass produced
#[derive(Debug, Default)]
pub struct DeriveOutcome {
    /// Columns added to the table
    pub added: Vec<&'static str>,
    /// Days where a derived value is undefined (null in the table)
    pub undefined: Vec<CoreError>,
}

impl DeriveOutcome {
    pub fn undefined_dates(&self) -> Vec<NaiveDate> {
        self.undefined
            .iter()
            .filter_map(|e| match e {
                CoreError::DivisionUndefined { date, .. } => Some(*date),
                _ => None,
            })
            .collect()
    }
}

/// Average engagement time for one day
///
/// Returns None when sessions is zero (or negative, or either input is
/// missing): the ratio is undefined, not zero.
pub fn average_engagement_time(duration: Option<f64>, sessions: Option<f64>) -> Option<f64> {
    match (duration, sessions) {
        (Some(d), Some(s)) if s > 0.0 => Some(d / s),
        _ => None,
    }
}

/// Bounce fraction to percentage
pub fn bounce_rate_percentage(fraction: f64) -> f64 {
    fraction * 100.0
}

/// Add the derived KPI columns to a table in place
///
/// Columns are only added when their inputs exist in the table.
pub fn derive_metrics(table: &mut MetricTable) -> DeriveOutcome {
    let mut outcome = DeriveOutcome::default();

    let can_average =
        table.has_column(columns::ENGAGEMENT_DURATION) && table.has_column(columns::SESSIONS);
    let can_bounce = table.has_column(columns::BOUNCE_RATE);

    for record in table.records_mut() {
        if can_average {
            let avg = average_engagement_time(
                record.get(columns::ENGAGEMENT_DURATION),
                record.get(columns::SESSIONS),
            );
            if avg.is_none() {
                outcome.undefined.push(CoreError::DivisionUndefined {
                    metric: columns::AVG_ENGAGEMENT_TIME.to_string(),
                    date: record.date,
                });
            }
            record.set(columns::AVG_ENGAGEMENT_TIME, avg);
        }

        if can_bounce {
            let pct = record.get(columns::BOUNCE_RATE).map(bounce_rate_percentage);
            record.set(columns::BOUNCE_RATE_PCT, pct);
        }
    }

    if can_average {
        table.add_column(columns::AVG_ENGAGEMENT_TIME);
        outcome.added.push(columns::AVG_ENGAGEMENT_TIME);
    }
    if can_bounce {
        table.add_column(columns::BOUNCE_RATE_PCT);
        outcome.added.push(columns::BOUNCE_RATE_PCT);
    }

    if !outcome.undefined.is_empty() {
        tracing::warn!(
            "{} day(s) with zero sessions: average engagement time left null",
            outcome.undefined.len()
        );
    }

    outcome
}
