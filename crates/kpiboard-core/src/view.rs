//! Presentation payload
//!
//! Everything a front-end needs to draw the dashboard: one panel per KPI
//! with a gauge, a timeline merging actuals and forecast, the period
//! summary and the insight text. Layout and chart rendering are left to
//! the consumer; the whole view serializes to JSON.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{InsightOutcome, InsightRequest, KpiTargets, PeriodSummary};
use crate::error::PipelineReport;
use crate::models::{
    columns, Aggregation, Benchmark, ForecastSeries, MetricTable, PeriodWindow, Tier,
};

/// Human label for a KPI column
pub fn kpi_label(kpi: &str) -> String {
    match kpi {
        columns::USERS => "Users".to_string(),
        columns::SESSIONS => "Sessions".to_string(),
        columns::ENGAGEMENT_DURATION => "Engagement Duration".to_string(),
        columns::AVG_ENGAGEMENT_TIME => "Average Engagement Time".to_string(),
        columns::BOUNCE_RATE => "Bounce Rate (fraction)".to_string(),
        columns::BOUNCE_RATE_PCT => "Bounce Rate".to_string(),
        other => other.to_string(),
    }
}

/// Display unit of a KPI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Count,
    Seconds,
    Percent,
}

impl Unit {
    pub fn for_kpi(kpi: &str) -> Self {
        match kpi {
            columns::AVG_ENGAGEMENT_TIME | columns::ENGAGEMENT_DURATION => Unit::Seconds,
            columns::BOUNCE_RATE_PCT => Unit::Percent,
            _ => Unit::Count,
        }
    }

    /// Format a value for display
    pub fn format(&self, value: f64) -> String {
        match self {
            Unit::Count => format!("{:.0}", value),
            Unit::Seconds => format_duration(value),
            Unit::Percent => format!("{:.1}%", value),
        }
    }
}

/// Seconds as `m:ss` (e.g. 185.4 -> "3:05")
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-".to_string();
    }
    let total = seconds.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Gauge axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeRange {
    pub min: f64,
    pub max: f64,
}

/// Progress gauge for the current month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    /// Month-to-date actual (sum or mean per the KPI); None on the 1st
    pub value: Option<f64>,
    pub range: GaugeRange,
    /// Tier reached by `value`
    pub tier: Option<Tier>,
    /// Whole-month projection from the forecast
    pub projected: Option<f64>,
    pub projected_tier: Option<Tier>,
}

impl Gauge {
    pub fn build(summary: &PeriodSummary, benchmark: Option<&Benchmark>) -> Self {
        let value = summary.month_to_date_value();

        let projected = summary.forecast_total.map(|total| match summary.aggregation {
            Aggregation::Sum => total,
            Aggregation::Mean => total / summary.days_in_month as f64,
        });

        let max = if Unit::for_kpi(&summary.kpi) == Unit::Percent {
            100.0
        } else {
            [benchmark.map(|b| b.upper_bound()), value, projected]
                .into_iter()
                .flatten()
                .fold(0.0, f64::max)
        };

        Self {
            value,
            range: GaugeRange { min: 0.0, max },
            tier: benchmark.zip(value).map(|(b, v)| b.classify(v)),
            projected,
            projected_tier: benchmark.zip(projected).map(|(b, v)| b.classify(v)),
        }
    }
}

/// One day of a KPI timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Actual values and forecast merged into one ordered series
pub fn build_timeline(
    table: &MetricTable,
    kpi: &str,
    forecast: Option<&ForecastSeries>,
) -> Vec<TimelinePoint> {
    let mut by_date: BTreeMap<NaiveDate, TimelinePoint> = BTreeMap::new();

    for record in table.records() {
        if let Some(actual) = record.get(kpi) {
            by_date
                .entry(record.date)
                .or_insert_with(|| TimelinePoint {
                    date: record.date,
                    ..Default::default()
                })
                .actual = Some(actual);
        }
    }

    for point in forecast.map(|f| f.points.as_slice()).unwrap_or_default() {
        let entry = by_date.entry(point.date).or_insert_with(|| TimelinePoint {
            date: point.date,
            ..Default::default()
        });
        entry.predicted = Some(point.predicted);
        entry.lower = point.lower;
        entry.upper = point.upper;
    }

    by_date.into_values().collect()
}

/// Everything shown for one KPI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiPanel {
    pub kpi: String,
    pub label: String,
    pub unit: Unit,
    pub benchmark: Option<Benchmark>,
    pub gauge: Gauge,
    pub timeline: Vec<TimelinePoint>,
    pub summary: PeriodSummary,
    pub targets: KpiTargets,
    /// None when the forecast step was skipped
    pub forecast: Option<ForecastSeries>,
    pub insight: InsightOutcome,
}

impl KpiPanel {
    /// Inputs of the insight prompt for this panel
    pub fn insight_request(&self) -> InsightRequest<'_> {
        InsightRequest {
            summary: &self.summary,
            benchmark: self.benchmark.as_ref(),
            targets: self.targets,
            forecast: self.forecast.as_ref(),
        }
    }
}

/// Complete dashboard for one run
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub property_id: String,
    pub today: NaiveDate,
    pub fetched_window: PeriodWindow,
    pub table: MetricTable,
    pub panels: Vec<KpiPanel>,
    pub report: PipelineReport,
}

impl DashboardView {
    pub fn panel(&self, kpi: &str) -> Option<&KpiPanel> {
        self.panels.iter().find(|p| p.kpi == kpi)
    }
}
