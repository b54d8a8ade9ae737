//! kpiboard-core - Core library for kpiboard
//!
//! Fetches daily web-analytics metrics, derives secondary KPIs, compares
//! last month and the current month against targets and benchmark tiers,
//! forecasts the rest of the month and asks an LLM to narrate the result.
//! The output is a serializable [`DashboardView`]; rendering is left to
//! the caller.

pub mod analytics;
pub mod config;
pub mod derive;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod view;

pub use analytics::{
    InsightOutcome, InsightPrompt, KpiAnalysis, KpiTargets, PeriodSummary,
};
pub use config::AppConfig;
pub use error::{CoreError, ErrorSeverity, PipelineReport, Stage, StageIssue};
pub use llm::{ChatCompletionsClient, InsightService};
pub use models::{Benchmark, BenchmarkTable, MetricRecord, MetricTable, Tier};
pub use pipeline::{Dashboard, DashboardConfig, RunRequest};
pub use source::{Ga4Client, JsonFileSource, MetricsSource};
pub use view::{DashboardView, KpiPanel};
