//! Date-keyed metric tables
//!
//! A [`MetricTable`] is the canonical in-memory shape of one analytics
//! fetch: one [`MetricRecord`] per reporting day, ordered by date, with
//! named numeric columns. Values are `Option<f64>` so derived metrics can
//! carry nulls without aborting the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Canonical column names (see the schema table in the README)
pub mod columns {
    pub const SESSIONS: &str = "sessions";
    pub const USERS: &str = "users";
    /// Total engagement duration in seconds for the day
    pub const ENGAGEMENT_DURATION: &str = "engagement_duration";
    /// Raw bounce fraction (0.0-1.0)
    pub const BOUNCE_RATE: &str = "bounce_rate";
    /// Derived: engagement_duration / sessions, in seconds
    pub const AVG_ENGAGEMENT_TIME: &str = "avg_engagement_time";
    /// Derived: bounce_rate * 100
    pub const BOUNCE_RATE_PCT: &str = "bounce_rate_pct";
}

/// How a KPI's daily values roll up into a period value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Counts: sum the days
    Sum,
    /// Rates and averages: mean of the days
    Mean,
}

impl Aggregation {
    /// Aggregation kind for a canonical column (unknown columns are summed)
    pub fn for_kpi(kpi: &str) -> Self {
        match kpi {
            columns::AVG_ENGAGEMENT_TIME | columns::BOUNCE_RATE | columns::BOUNCE_RATE_PCT => {
                Aggregation::Mean
            }
            _ => Aggregation::Sum,
        }
    }

    /// Period value from the total of `days` valued days (None without any)
    pub fn rollup(&self, total: f64, days: usize) -> Option<f64> {
        if days == 0 {
            return None;
        }
        match self {
            Aggregation::Sum => Some(total),
            Aggregation::Mean => Some(total / days as f64),
        }
    }
}

/// Metrics for one reporting day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub date: NaiveDate,
    /// metric name -> value (None = undefined for that day)
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl MetricRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert of a defined value
    pub fn with(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.values.insert(metric.into(), Some(value));
        self
    }

    /// Value of a metric, flattening "absent" and "null"
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().flatten()
    }

    pub fn set(&mut self, metric: impl Into<String>, value: Option<f64>) {
        self.values.insert(metric.into(), value);
    }
}

/// Ordered table of daily metric records
///
/// Invariant: records are sorted ascending by date and dates are unique.
/// Every constructor enforces it, so forecasters can rely on ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricTable {
    columns: Vec<String>,
    records: Vec<MetricRecord>,
}

impl MetricTable {
    /// Build a table from unordered records
    ///
    /// Sorts by date and rejects duplicate dates. The column list is the
    /// union of every record's metric names, in first-seen order.
    pub fn from_records(mut records: Vec<MetricRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.date);

        if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(CoreError::DuplicateDate { date: pair[0].date });
        }

        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for name in record.values.keys() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
        }

        Ok(Self { columns, records })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Fail with MissingKpi unless `kpi` is a column of this table
    pub fn require_column(&self, kpi: &str) -> Result<()> {
        if self.has_column(kpi) {
            Ok(())
        } else {
            Err(CoreError::MissingKpi {
                kpi: kpi.to_string(),
                available: self.columns.clone(),
            })
        }
    }

    /// Ordered (date, value) pairs for one column, skipping nulls
    pub fn series(&self, kpi: &str) -> Result<Vec<(NaiveDate, f64)>> {
        self.require_column(kpi)?;
        Ok(self
            .records
            .iter()
            .filter_map(|r| r.get(kpi).map(|v| (r.date, v)))
            .collect())
    }

    /// Mutable access for in-place derivations. Dates must not be changed.
    pub(crate) fn records_mut(&mut self) -> &mut [MetricRecord] {
        &mut self.records
    }

    /// Register a column produced by a derivation
    pub(crate) fn add_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }
}
