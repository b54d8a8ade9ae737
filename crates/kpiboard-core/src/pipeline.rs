//! Dashboard pipeline
//!
//! One sequential run per invocation:
//! fetch -> derive -> per KPI {forecast, aggregate, prompt, insight} -> view.
//!
//! Failures are scoped to the narrowest stage. A fetch failure aborts the
//! run (there is nothing to show). A missing KPI drops that KPI's panel. A
//! short history drops the forecast only. An insight failure replaces the
//! insight text with "insights unavailable". Everything short of a fetch
//! failure is recorded in the view's [`PipelineReport`].

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::analytics::{
    build_prompt, previous_month_window, Forecaster, ForecastModel, InsightOutcome, KpiAnalysis,
    KpiTargets,
};
use crate::config::{AppConfig, DEFAULT_KPIS};
use crate::derive::derive_metrics;
use crate::error::{CoreError, PipelineReport, Result, Stage, StageIssue};
use crate::llm::InsightService;
use crate::models::{BenchmarkTable, PeriodWindow};
use crate::source::MetricsSource;
use crate::view::{build_timeline, kpi_label, DashboardView, Gauge, KpiPanel, Unit};

const AUTH_FAILED_REASON: &str = "authentication failed";

/// Read-only settings shared by every run
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub benchmarks: BenchmarkTable,
    /// Default per-KPI targets (a run request can override them)
    pub targets: BTreeMap<String, KpiTargets>,
    /// Days of history fetched before today
    pub history_days: u32,
    pub insights_enabled: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            benchmarks: BenchmarkTable::default(),
            targets: BTreeMap::new(),
            history_days: 90,
            insights_enabled: true,
        }
    }
}

impl DashboardConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            benchmarks: config.benchmark_table(),
            targets: config.targets.clone(),
            history_days: config.analytics.history_days,
            insights_enabled: config.insights.enabled,
        }
    }
}

/// Parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub property_id: String,
    pub kpis: Vec<String>,
    /// Reference date; windows are derived from it on every run
    pub today: NaiveDate,
    /// Targets for this run, layered over the configured ones
    pub targets: BTreeMap<String, KpiTargets>,
}

impl RunRequest {
    /// Request for the default KPIs
    pub fn new(property_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            property_id: property_id.into(),
            kpis: DEFAULT_KPIS.iter().map(|k| k.to_string()).collect(),
            today,
            targets: BTreeMap::new(),
        }
    }

    pub fn with_kpis(mut self, kpis: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.kpis = kpis.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, kpi: impl Into<String>, targets: KpiTargets) -> Self {
        self.targets.insert(kpi.into(), targets);
        self
    }
}

/// Date range fetched for a run: `history_days` back (always covering the
/// whole previous month) up to yesterday
///
/// A span reaching past the calendar's range starts at the previous month.
pub fn fetch_window(today: NaiveDate, history_days: u32) -> PeriodWindow {
    let yesterday = today - Duration::days(1);
    let month_start = previous_month_window(today).start;
    let start = today
        .checked_sub_signed(Duration::days(i64::from(history_days.max(1))))
        .map_or(month_start, |start| start.min(month_start));
    PeriodWindow {
        start,
        end: yesterday,
    }
}

/// The dashboard: a metrics source, an optional insight service and the
/// forecasting model, wired together
pub struct Dashboard<S, L, F = ForecastModel> {
    source: S,
    insights: Option<L>,
    forecaster: F,
    config: DashboardConfig,
}

impl<S, L> Dashboard<S, L, ForecastModel>
where
    S: MetricsSource + Sync,
    L: InsightService + Sync,
{
    pub fn new(source: S, insights: Option<L>, config: DashboardConfig) -> Self {
        Self {
            source,
            insights,
            forecaster: ForecastModel::default(),
            config,
        }
    }
}

impl<S, L, F> Dashboard<S, L, F> {
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn insight_service(&self) -> Option<&L> {
        self.insights.as_ref()
    }
}

impl<S, L, F> Dashboard<S, L, F>
where
    S: MetricsSource + Sync,
    L: InsightService + Sync,
    F: Forecaster + Sync,
{
    /// Swap the forecasting model
    pub fn with_forecaster<G: Forecaster + Sync>(self, forecaster: G) -> Dashboard<S, L, G> {
        Dashboard {
            source: self.source,
            insights: self.insights,
            forecaster,
            config: self.config,
        }
    }

    fn targets_for(&self, request: &RunRequest, kpi: &str) -> KpiTargets {
        request
            .targets
            .get(kpi)
            .or_else(|| self.config.targets.get(kpi))
            .copied()
            .unwrap_or_default()
    }

    /// Run the whole pipeline
    ///
    /// # Errors
    /// Only when the fetch fails (`AuthenticationFailed`,
    /// `ServiceUnavailable`, file errors). Per-KPI failures are reported in
    /// `DashboardView::report`.
    pub async fn run(&self, request: &RunRequest) -> Result<DashboardView> {
        let mut report = PipelineReport::new();
        report.kpis_requested = request.kpis.len();

        let window = fetch_window(request.today, self.config.history_days);
        tracing::info!(
            source = self.source.name(),
            property_id = %request.property_id,
            %window,
            "Starting dashboard run"
        );

        let mut table = self
            .source
            .fetch(&request.property_id, window.start, window.end)
            .await?;
        report.records_fetched = table.len();

        if table.is_empty() {
            report.add_warning(
                Stage::Fetch,
                format!("No data returned for {}", window),
            );
        }

        let derived = derive_metrics(&mut table);
        if !derived.undefined.is_empty() {
            let dates = derived
                .undefined_dates()
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            report.add_issue(
                StageIssue::warning(
                    Stage::Derive,
                    format!(
                        "Average engagement time undefined (zero sessions) on: {}",
                        dates
                    ),
                )
                .with_suggestion("Those days are left blank instead of counted as zero"),
            );
        }

        let insights_enabled = self.config.insights_enabled && self.insights.is_some();
        let mut insights_rejected = false;
        let mut panels = Vec::with_capacity(request.kpis.len());

        for kpi in &request.kpis {
            let targets = self.targets_for(request, kpi);

            let analysis = match KpiAnalysis::compute(
                &table,
                kpi,
                targets.this_month,
                &self.forecaster,
                request.today,
            ) {
                Ok(analysis) => analysis,
                Err(e) => {
                    tracing::warn!(kpi = %kpi, error = %e, "KPI skipped");
                    report.add_issue(StageIssue::from_core_error(Stage::Aggregate, &e).for_kpi(kpi));
                    report.kpis_failed += 1;
                    continue;
                }
            };

            if let Some(e) = &analysis.forecast_error {
                report.add_issue(StageIssue::from_core_error(Stage::Forecast, e).for_kpi(kpi));
            }

            let benchmark = self.config.benchmarks.get(kpi).copied();
            let mut panel = KpiPanel {
                kpi: kpi.clone(),
                label: kpi_label(kpi),
                unit: Unit::for_kpi(kpi),
                benchmark,
                gauge: Gauge::build(&analysis.summary, benchmark.as_ref()),
                timeline: build_timeline(&table, kpi, analysis.forecast.as_ref()),
                summary: analysis.summary,
                targets,
                forecast: analysis.forecast,
                insight: InsightOutcome::Disabled,
            };

            if insights_rejected {
                // Rejected credentials will be rejected for every KPI
                panel.insight = InsightOutcome::Unavailable {
                    reason: AUTH_FAILED_REASON.to_string(),
                };
            } else if insights_enabled {
                panel.insight = self.insight_for(&panel, &mut report).await;
                insights_rejected = report.has_fatal_errors();
            }

            panels.push(panel);
        }

        let (warnings, errors, fatal) = report.issue_count();
        tracing::info!(
            panels = panels.len(),
            warnings,
            errors,
            fatal,
            "Dashboard run complete"
        );

        Ok(DashboardView {
            property_id: request.property_id.clone(),
            today: request.today,
            fetched_window: window,
            table,
            panels,
            report,
        })
    }

    async fn insight_for(&self, panel: &KpiPanel, report: &mut PipelineReport) -> InsightOutcome {
        let Some(service) = &self.insights else {
            return InsightOutcome::Disabled;
        };

        let prompt = build_prompt(&panel.insight_request());
        match service.complete(&prompt).await {
            Ok(text) => InsightOutcome::Generated { text },
            Err(e) => {
                tracing::warn!(kpi = %panel.kpi, error = %e, "Insights unavailable");
                report.add_issue(StageIssue::from_core_error(Stage::Insight, &e).for_kpi(&panel.kpi));
                InsightOutcome::Unavailable {
                    reason: match &e {
                        CoreError::AuthenticationFailed { .. } => AUTH_FAILED_REASON.to_string(),
                        other => other.to_string(),
                    },
                }
            }
        }
    }
}
