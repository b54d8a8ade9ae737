//! Actual vs forecast totals per calendar month
//!
//! Answers two questions for one KPI: did last month hit its target, and is
//! the current month on track. The previous-month total comes from actual
//! data; the current-month total comes from the forecast over the whole
//! month, alongside the month-to-date actuals.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::period::{
    current_month_span, current_month_window, days_in_month, previous_month_window,
};
use crate::error::Result;
use crate::models::{Aggregation, ForecastSeries, MetricTable, PeriodWindow};

/// Aggregated view of one KPI relative to "today"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub kpi: String,
    pub aggregation: Aggregation,
    pub previous_month_window: PeriodWindow,
    /// None on the first day of a month
    pub current_month_window: Option<PeriodWindow>,
    /// Sum of the KPI over the previous month (nulls skipped)
    pub historical_total: f64,
    /// Days with a value in the previous month
    pub historical_days: usize,
    /// Sum of the KPI over the current month so far
    pub month_to_date_total: f64,
    pub month_to_date_days: usize,
    /// Sum of forecast values over the current month (None = no forecast)
    pub forecast_total: Option<f64>,
    pub days_in_month: u32,
    /// Caller-supplied monthly target for the current month
    pub monthly_target: Option<f64>,
    /// monthly_target / days_in_month
    pub daily_target: Option<f64>,
}

impl PeriodSummary {
    /// Previous month rolled up per the KPI's aggregation kind
    pub fn historical_value(&self) -> Option<f64> {
        self.aggregation
            .rollup(self.historical_total, self.historical_days)
    }

    /// Current month so far rolled up per the KPI's aggregation kind
    pub fn month_to_date_value(&self) -> Option<f64> {
        self.aggregation
            .rollup(self.month_to_date_total, self.month_to_date_days)
    }
}

/// Monthly target spread evenly over the days of the current month
pub fn daily_target(monthly_target: f64, today: NaiveDate) -> f64 {
    monthly_target / days_in_month(today) as f64
}

/// History handed to the forecaster: every value up to the end of the
/// previous month, so predictions start on the first of the current month
pub fn forecast_history(
    table: &MetricTable,
    kpi: &str,
    today: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
    let cutoff = previous_month_window(today).end;
    let mut series = table.series(kpi)?;
    series.retain(|(date, _)| *date <= cutoff);
    Ok(series)
}

/// Forecast horizon covering the rest of the current month
///
/// Equals the number of days in the current month when the history ends on
/// the last day of the previous month. A history that stops earlier gets a
/// longer horizon so the whole current month is still covered.
pub fn forecast_horizon(history: &[(NaiveDate, f64)], today: NaiveDate) -> usize {
    let month = current_month_span(today);
    let start = history
        .last()
        .map(|(date, _)| *date + Duration::days(1))
        .unwrap_or(month.start)
        .min(month.start);
    (month.end - start).num_days() as usize + 1
}

/// Sum of a KPI's non-null values inside a window
fn window_total(series: &[(NaiveDate, f64)], window: &PeriodWindow) -> (f64, usize) {
    series
        .iter()
        .filter(|(date, _)| window.contains(*date))
        .fold((0.0, 0), |(sum, n), (_, v)| (sum + v, n + 1))
}

/// Aggregate one KPI
///
/// # Errors
/// `CoreError::MissingKpi` when the KPI is not a column of the table. The
/// totals are never silently defaulted to zero for an unknown column.
pub fn aggregate(
    table: &MetricTable,
    kpi: &str,
    monthly_target: Option<f64>,
    forecast: Option<&ForecastSeries>,
    today: NaiveDate,
) -> Result<PeriodSummary> {
    let series = table.series(kpi)?;

    let previous_month_window = previous_month_window(today);
    let current_month_window = current_month_window(today);

    let (historical_total, historical_days) = window_total(&series, &previous_month_window);
    let (month_to_date_total, month_to_date_days) = current_month_window
        .as_ref()
        .map(|w| window_total(&series, w))
        .unwrap_or((0.0, 0));

    let month = current_month_span(today);
    let forecast_total = forecast.map(|f| f.total_between(month.start, month.end));

    Ok(PeriodSummary {
        kpi: kpi.to_string(),
        aggregation: Aggregation::for_kpi(kpi),
        previous_month_window,
        current_month_window,
        historical_total,
        historical_days,
        month_to_date_total,
        month_to_date_days,
        forecast_total,
        days_in_month: days_in_month(today),
        monthly_target,
        daily_target: monthly_target.map(|t| daily_target(t, today)),
    })
}
