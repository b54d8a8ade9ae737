//! LLM insight prompts
//!
//! Builds the two-message chat prompt for one KPI from its period summary,
//! benchmark and forecast. The reply is opaque narrative text: it is shown
//! to the user as-is and never parsed.

use serde::{Deserialize, Serialize};

use super::aggregator::PeriodSummary;
use crate::models::{Benchmark, ForecastSeries};

/// System message sent with every insight request
pub const SYSTEM_PROMPT: &str = "You are a world-class data scientist.";

/// The three questions every insight request asks
pub const QUESTIONS: [&str; 3] = [
    "Did we meet all the KPIs last month?",
    "Are we on track to meet all the KPIs this month?",
    "Provide detailed insights, including wins, challenges, and what should be done based on the data.",
];

/// User-supplied monthly targets for one KPI
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiTargets {
    pub last_month: Option<f64>,
    pub this_month: Option<f64>,
}

/// Everything the prompt needs for one KPI
#[derive(Debug, Clone, Copy)]
pub struct InsightRequest<'a> {
    pub summary: &'a PeriodSummary,
    pub benchmark: Option<&'a Benchmark>,
    pub targets: KpiTargets,
    pub forecast: Option<&'a ForecastSeries>,
}

/// Chat prompt: one system message, one user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightPrompt {
    pub system: String,
    pub user: String,
}

/// Result of the insight step for one KPI panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightOutcome {
    /// Narrative text returned by the model, unmodified
    Generated { text: String },
    /// The service failed; the rest of the panel is still shown
    Unavailable { reason: String },
    /// Insights turned off for this run
    Disabled,
}

impl InsightOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            InsightOutcome::Generated { text } => Some(text),
            _ => None,
        }
    }

    /// Line shown in place of the insight text
    pub fn display(&self) -> &str {
        match self {
            InsightOutcome::Generated { text } => text,
            InsightOutcome::Unavailable { .. } => "insights unavailable",
            InsightOutcome::Disabled => "insights disabled",
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), fmt_value)
}

fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Build the chat prompt for one KPI
pub fn build_prompt(request: &InsightRequest<'_>) -> InsightPrompt {
    let summary = request.summary;
    let benchmark = request.benchmark;

    let mut user = format!(
        "Analyze the following KPI data (historical and forecast) and generate insights for a business to take action.\n\
         \n\
         KPI: {kpi}\n\
         Target Last Month: {last}\n\
         Target This Month: {this}\n\
         Threshold: {threshold}\n\
         Target: {target}\n\
         Challenge: {challenge}\n\
         \n\
         Historical Total for Last Month ({window}): {historical}\n",
        kpi = summary.kpi,
        last = fmt_opt(request.targets.last_month),
        this = fmt_opt(request.targets.this_month),
        threshold = fmt_opt(benchmark.map(|b| b.threshold)),
        target = fmt_opt(benchmark.map(|b| b.target)),
        challenge = fmt_opt(benchmark.map(|b| b.challenge)),
        window = summary.previous_month_window,
        historical = fmt_value(summary.historical_total),
    );

    if let Some(window) = &summary.current_month_window {
        user.push_str(&format!(
            "Month-to-Date Total ({}): {}\n",
            window,
            fmt_value(summary.month_to_date_total)
        ));
    }
    user.push_str(&format!(
        "Forecast Total This Month: {}\n\n",
        fmt_opt(summary.forecast_total)
    ));

    match request.forecast {
        Some(forecast) if !forecast.is_empty() => {
            user.push_str("Forecast Data (date: predicted):\n");
            for point in &forecast.points {
                user.push_str(&format!("- {}: {}\n", point.date, fmt_value(point.predicted)));
            }
        }
        _ => user.push_str("Forecast Data: unavailable\n"),
    }

    user.push_str("\nPlease provide:\n");
    for (i, question) in QUESTIONS.iter().enumerate() {
        user.push_str(&format!("{}. {}\n", i + 1, question));
    }

    InsightPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
