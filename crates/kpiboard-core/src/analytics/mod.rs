//! KPI analytics: period windows, aggregation, forecasting and insight prompts
//!
//! Everything here is synchronous and pure. Network access lives in
//! `source` and `llm`; this module only sees an in-memory `MetricTable`.

use chrono::NaiveDate;

use crate::error::{CoreError, Result};
use crate::models::{ForecastSeries, MetricTable};

pub mod aggregator;
pub mod forecasting;
pub mod insights;
pub mod period;


pub use aggregator::{aggregate, daily_target, forecast_history, forecast_horizon, PeriodSummary};
pub use forecasting::{
    ForecastModel, Forecaster, LinearTrendModel, SeasonalTrendModel, MIN_LINEAR_POINTS,
    MIN_SEASONAL_POINTS, WEEKLY_PERIOD,
};
pub use insights::{
    build_prompt, InsightOutcome, InsightPrompt, InsightRequest, KpiTargets, SYSTEM_PROMPT,
};
pub use period::{
    current_month_span, current_month_window, days_in_month, previous_month_window, today,
};

/// Aggregation and forecast for one KPI
#[derive(Debug)]
pub struct KpiAnalysis {
    pub summary: PeriodSummary,
    pub forecast: Option<ForecastSeries>,
    /// Why the forecast is missing (InsufficientHistory and friends)
    pub forecast_error: Option<CoreError>,
}

impl KpiAnalysis {
    /// Analyze one KPI of an already-derived table
    ///
    /// A missing column fails the whole KPI. A forecast failure only drops
    /// the forecast: the historical side is still returned.
    pub fn compute<F: Forecaster + ?Sized>(
        table: &MetricTable,
        kpi: &str,
        monthly_target: Option<f64>,
        forecaster: &F,
        today: NaiveDate,
    ) -> Result<Self> {
        table.require_column(kpi)?;

        let history = forecast_history(table, kpi, today)?;
        let horizon = forecast_horizon(&history, today);

        let (forecast, forecast_error) = match forecaster.forecast(&history, horizon) {
            Ok(series) => {
                tracing::info!(
                    kpi,
                    model = forecaster.name(),
                    points = series.len(),
                    "Forecast computed"
                );
                (Some(series), None)
            }
            Err(e) => {
                tracing::warn!(kpi, error = %e, "Forecast skipped");
                (None, Some(e))
            }
        };

        let summary = aggregate(table, kpi, monthly_target, forecast.as_ref(), today)?;

        Ok(Self {
            summary,
            forecast,
            forecast_error,
        })
    }
}
