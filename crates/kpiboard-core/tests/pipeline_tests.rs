//! End-to-end pipeline tests with in-memory sources and insight services

use std::sync::Mutex;

use chrono::{Duration, NaiveDate};
use kpiboard_core::analytics::{InsightOutcome, InsightPrompt, KpiTargets};
use kpiboard_core::models::columns;
use kpiboard_core::{
    CoreError, Dashboard, DashboardConfig, ErrorSeverity, InsightService, MetricRecord,
    MetricTable, MetricsSource, RunRequest, Stage,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Serves a fixed set of records, filtered to the requested range
struct FakeSource {
    records: Vec<MetricRecord>,
    fail_with_auth: bool,
}

impl FakeSource {
    fn new(records: Vec<MetricRecord>) -> Self {
        Self {
            records,
            fail_with_auth: false,
        }
    }
}

impl MetricsSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(
        &self,
        _property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> kpiboard_core::error::Result<MetricTable> {
        if self.fail_with_auth {
            return Err(CoreError::auth_failed("fake", "token revoked"));
        }
        let records = self
            .records
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect();
        MetricTable::from_records(records)
    }
}

enum Reply {
    Text(&'static str),
    Unavailable,
    Unauthorized,
}

/// Records every prompt and answers with a canned reply
struct FakeLlm {
    reply: Reply,
    prompts: Mutex<Vec<InsightPrompt>>,
}

impl FakeLlm {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl InsightService for FakeLlm {
    async fn complete(&self, prompt: &InsightPrompt) -> kpiboard_core::error::Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Unavailable => Err(CoreError::unavailable("LLM", "HTTP 429: quota exceeded")),
            Reply::Unauthorized => Err(CoreError::auth_failed("LLM", "Incorrect API key")),
        }
    }
}

/// 30 December days of sessions = 100
fn december_sessions() -> Vec<MetricRecord> {
    (1..=30)
        .map(|d| MetricRecord::new(date(2024, 12, d)).with(columns::SESSIONS, 100.0))
        .collect()
}

/// Raw GA4-shaped rows for `days` days from `start`
fn raw_days(start: NaiveDate, days: i64) -> Vec<MetricRecord> {
    (0..days)
        .map(|i| {
            let sessions = if i == 40 { 0.0 } else { 100.0 + (i % 7) as f64 * 5.0 };
            MetricRecord::new(start + Duration::days(i))
                .with(columns::SESSIONS, sessions)
                .with(columns::USERS, sessions * 0.8)
                .with(columns::ENGAGEMENT_DURATION, sessions * 200.0)
                .with(columns::BOUNCE_RATE, 0.42)
        })
        .collect()
}

#[tokio::test]
async fn test_december_sessions_end_to_end() {
    let dashboard = Dashboard::new(
        FakeSource::new(december_sessions()),
        None::<FakeLlm>,
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10)).with_kpis([columns::SESSIONS]);

    let view = dashboard.run(&request).await.unwrap();

    let panel = view.panel("sessions").unwrap();
    assert_eq!(panel.summary.historical_total, 3000.0);
    assert_eq!(panel.summary.previous_month_window.start, date(2024, 12, 1));
    assert_eq!(panel.summary.previous_month_window.end, date(2024, 12, 31));
    assert_eq!(panel.insight, InsightOutcome::Disabled);

    // Flat history: the forecast stays at 100 per day for all of January
    let forecast_total = panel.summary.forecast_total.unwrap();
    assert!((forecast_total - 3100.0).abs() < 1e-6, "got {}", forecast_total);
    assert_eq!(view.report.records_fetched, 30);
}

#[tokio::test]
async fn test_missing_kpi_does_not_block_other_panels() {
    let dashboard = Dashboard::new(
        FakeSource::new(december_sessions()),
        None::<FakeLlm>,
        DashboardConfig::default(),
    );
    let request =
        RunRequest::new("123", date(2025, 1, 10)).with_kpis(["revenue", columns::SESSIONS]);

    let view = dashboard.run(&request).await.unwrap();

    assert_eq!(view.panels.len(), 1);
    assert_eq!(view.panels[0].kpi, "sessions");
    assert_eq!(view.report.kpis_failed, 1);

    let issue = view.report.issues_for("revenue").next().unwrap();
    assert_eq!(issue.stage, Stage::Aggregate);
    assert_eq!(issue.severity, ErrorSeverity::Error);
    assert!(issue.message.contains("'revenue'"));
    assert!(issue.message.contains("sessions"));
}

#[tokio::test]
async fn test_full_run_with_insights() {
    let llm = FakeLlm::new(Reply::Text("1. Yes\n2. On track\n3. Keep going"));
    let dashboard = Dashboard::new(
        FakeSource::new(raw_days(date(2024, 10, 1), 100)),
        Some(llm),
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10)).with_target(
        columns::SESSIONS,
        KpiTargets {
            last_month: Some(3300.0),
            this_month: Some(3400.0),
        },
    );

    let view = dashboard.run(&request).await.unwrap();

    assert_eq!(view.panels.len(), 4);
    for panel in &view.panels {
        assert_eq!(
            panel.insight.text(),
            Some("1. Yes\n2. On track\n3. Keep going"),
            "{}",
            panel.kpi
        );
        assert!(panel.forecast.is_some(), "{}", panel.kpi);
        assert!(!panel.timeline.is_empty());
    }

    let sessions = view.panel("sessions").unwrap();
    assert_eq!(sessions.summary.monthly_target, Some(3400.0));
    assert!((sessions.summary.daily_target.unwrap() * 31.0 - 3400.0).abs() < 1e-9);
    assert!(sessions.gauge.tier.is_some());

    let engagement = view.panel("avg_engagement_time").unwrap();
    assert!((engagement.gauge.value.unwrap() - 200.0).abs() < 1e-9);

    // One warning for the zero-session day
    let derive_issues: Vec<_> = view
        .report
        .issues
        .iter()
        .filter(|i| i.stage == Stage::Derive)
        .collect();
    assert_eq!(derive_issues.len(), 1);
    assert_eq!(derive_issues[0].severity, ErrorSeverity::Warning);
    assert!(derive_issues[0].message.contains("2024-11-10"));
}

#[tokio::test]
async fn test_prompt_carries_request_targets() {
    let dashboard = Dashboard::new(
        FakeSource::new(december_sessions()),
        Some(FakeLlm::new(Reply::Text("ok"))),
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10))
        .with_kpis([columns::SESSIONS])
        .with_target(
            columns::SESSIONS,
            KpiTargets {
                last_month: Some(2900.0),
                this_month: Some(3100.0),
            },
        );

    dashboard.run(&request).await.unwrap();

    let view_prompt = {
        let llm = dashboard_llm(&dashboard);
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        prompts[0].clone()
    };
    assert_eq!(view_prompt.system, "You are a world-class data scientist.");
    assert!(view_prompt.user.contains("Target Last Month: 2900"));
    assert!(view_prompt.user.contains("Target This Month: 3100"));
    assert!(view_prompt.user.contains("Threshold: 80000"));
    assert!(view_prompt.user.contains("Historical Total for Last Month"));
}

fn dashboard_llm<S, F>(dashboard: &Dashboard<S, FakeLlm, F>) -> &FakeLlm {
    dashboard
        .insight_service()
        .expect("dashboard built with an insight service")
}

#[tokio::test]
async fn test_insight_failure_is_scoped() {
    let dashboard = Dashboard::new(
        FakeSource::new(raw_days(date(2024, 10, 1), 100)),
        Some(FakeLlm::new(Reply::Unavailable)),
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10));

    let view = dashboard.run(&request).await.unwrap();

    assert_eq!(view.panels.len(), 4);
    for panel in &view.panels {
        assert!(matches!(panel.insight, InsightOutcome::Unavailable { .. }));
        assert_eq!(panel.insight.display(), "insights unavailable");
        assert!(panel.summary.historical_total > 0.0);
    }
    let insight_warnings = view
        .report
        .issues
        .iter()
        .filter(|i| i.stage == Stage::Insight && i.severity == ErrorSeverity::Warning)
        .count();
    assert_eq!(insight_warnings, 4);
    assert!(!view.report.has_fatal_errors());
}

#[tokio::test]
async fn test_insight_auth_failure_stops_insight_calls() {
    let dashboard = Dashboard::new(
        FakeSource::new(raw_days(date(2024, 10, 1), 100)),
        Some(FakeLlm::new(Reply::Unauthorized)),
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10));

    let view = dashboard.run(&request).await.unwrap();

    assert_eq!(dashboard_llm(&dashboard).calls(), 1);
    assert!(view.report.has_fatal_errors());
    assert_eq!(view.panels.len(), 4);
    for panel in &view.panels {
        assert_eq!(
            panel.insight,
            InsightOutcome::Unavailable {
                reason: "authentication failed".to_string()
            },
            "{}",
            panel.kpi
        );
        assert_eq!(panel.insight.display(), "insights unavailable");
    }
}

#[tokio::test]
async fn test_fetch_auth_failure_aborts_run() {
    let source = FakeSource {
        records: Vec::new(),
        fail_with_auth: true,
    };
    let dashboard = Dashboard::new(source, None::<FakeLlm>, DashboardConfig::default());

    let err = dashboard
        .run(&RunRequest::new("123", date(2025, 1, 10)))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_short_history_drops_forecast_only() {
    // Ten December days, then January
    let dashboard = Dashboard::new(
        FakeSource::new(raw_days(date(2024, 12, 22), 19)),
        None::<FakeLlm>,
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10)).with_kpis([columns::USERS]);

    let view = dashboard.run(&request).await.unwrap();

    let panel = view.panel("users").unwrap();
    assert!(panel.forecast.is_none());
    assert!(panel.summary.forecast_total.is_none());
    assert_eq!(panel.summary.historical_days, 10);
    assert_eq!(panel.summary.month_to_date_days, 9);
    assert!(panel.timeline.iter().all(|p| p.predicted.is_none()));

    let issue = view.report.issues_for("users").next().unwrap();
    assert_eq!(issue.stage, Stage::Forecast);
    assert_eq!(issue.severity, ErrorSeverity::Warning);
}

#[tokio::test]
async fn test_view_serializes() {
    let dashboard = Dashboard::new(
        FakeSource::new(december_sessions()),
        None::<FakeLlm>,
        DashboardConfig::default(),
    );
    let request = RunRequest::new("123", date(2025, 1, 10)).with_kpis([columns::SESSIONS]);
    let view = dashboard.run(&request).await.unwrap();

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["property_id"], "123");
    assert_eq!(json["today"], "2025-01-10");
    assert_eq!(json["panels"][0]["kpi"], "sessions");
    assert_eq!(json["panels"][0]["summary"]["historical_total"], 3000.0);
    assert_eq!(json["panels"][0]["insight"]["status"], "disabled");
    assert_eq!(json["table"]["records"][0]["sessions"], 100.0);
}
