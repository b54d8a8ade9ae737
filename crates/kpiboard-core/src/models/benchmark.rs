//! KPI benchmark tiers
//!
//! Each KPI has three reference levels: a threshold (minimum acceptable),
//! a target, and a challenge (stretch goal). For "lower is better" KPIs
//! such as bounce rate the tiers descend instead of ascend.
//!
//! Average engagement time tiers are expressed in seconds, matching the
//! derived `avg_engagement_time` column.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::metrics::columns;

/// Reference levels for one KPI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub threshold: f64,
    pub target: f64,
    pub challenge: f64,
}

/// Which tier a value reaches against a benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Worse than the threshold
    BelowThreshold,
    /// Threshold reached, target not
    Threshold,
    /// Target reached, challenge not
    Target,
    /// Challenge reached
    Challenge,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::BelowThreshold => "below threshold",
            Tier::Threshold => "threshold",
            Tier::Target => "target",
            Tier::Challenge => "challenge",
        }
    }
}

impl Benchmark {
    pub const fn new(threshold: f64, target: f64, challenge: f64) -> Self {
        Self {
            threshold,
            target,
            challenge,
        }
    }

    /// True when smaller values are better (challenge below threshold)
    pub fn lower_is_better(&self) -> bool {
        self.challenge < self.threshold
    }

    /// Largest of the three levels (gauge upper bound)
    pub fn upper_bound(&self) -> f64 {
        self.threshold.max(self.target).max(self.challenge)
    }

    /// All three levels are finite numbers
    pub fn is_finite(&self) -> bool {
        self.threshold.is_finite() && self.target.is_finite() && self.challenge.is_finite()
    }

    /// Classify a value into a tier
    pub fn classify(&self, value: f64) -> Tier {
        let reaches = |level: f64| {
            if self.lower_is_better() {
                value <= level
            } else {
                value >= level
            }
        };

        if reaches(self.challenge) {
            Tier::Challenge
        } else if reaches(self.target) {
            Tier::Target
        } else if reaches(self.threshold) {
            Tier::Threshold
        } else {
            Tier::BelowThreshold
        }
    }
}

/// Built-in benchmark defaults
static DEFAULT_BENCHMARKS: Lazy<BTreeMap<String, Benchmark>> = Lazy::new(|| {
    let mut m = BTreeMap::new();
    m.insert(
        columns::USERS.to_string(),
        Benchmark::new(50_000.0, 70_000.0, 90_000.0),
    );
    m.insert(
        columns::SESSIONS.to_string(),
        Benchmark::new(80_000.0, 100_000.0, 120_000.0),
    );
    // 3:00 / 4:00 / 5:00
    m.insert(
        columns::AVG_ENGAGEMENT_TIME.to_string(),
        Benchmark::new(180.0, 240.0, 300.0),
    );
    m.insert(
        columns::BOUNCE_RATE_PCT.to_string(),
        Benchmark::new(60.0, 50.0, 35.0),
    );
    m
});

/// Immutable KPI -> benchmark mapping
///
/// Built once at start-up and handed to the pipeline; there is no global
/// mutable benchmark state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkTable {
    entries: BTreeMap<String, Benchmark>,
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_BENCHMARKS.clone(),
        }
    }
}

impl BenchmarkTable {
    /// Table with no benchmarks at all
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Defaults with configured overrides layered on top
    pub fn with_overrides(overrides: &BTreeMap<String, Benchmark>) -> Self {
        let mut table = Self::default();
        if !overrides.is_empty() {
            tracing::debug!(
                "Merging {} configured benchmarks with {} defaults",
                overrides.len(),
                table.entries.len()
            );
        }
        table
            .entries
            .extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        table
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Benchmark)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, kpi: &str) -> Option<&Benchmark> {
        self.entries.get(kpi)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Benchmark)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
