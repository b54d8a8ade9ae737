//! CLI helpers for the report, benchmarks, windows and prompt commands
//!
//! Argument parsing that clap cannot express directly, plus the human
//! (comfy-table) renderings of a dashboard run.

use chrono::NaiveDate;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use kpiboard_core::analytics::{current_month_window, days_in_month, previous_month_window};
use kpiboard_core::error::{CoreError, ErrorSeverity, PipelineReport};
use kpiboard_core::models::{BenchmarkTable, Tier};
use kpiboard_core::view::{DashboardView, Unit};
use kpiboard_core::KpiTargets;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    InvalidTarget { spec: String, reason: String },
    InvalidDate { value: String },
    MissingPropertyId,
    Core(CoreError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::InvalidTarget { spec, reason } => {
                write!(
                    f,
                    "Invalid target '{}': {} (expected kpi=LAST,THIS, e.g. sessions=95000,100000)",
                    spec, reason
                )
            }
            CliError::InvalidDate { value } => {
                write!(f, "Invalid date '{}' (expected YYYY-MM-DD)", value)
            }
            CliError::MissingPropertyId => {
                write!(
                    f,
                    "No analytics property id: pass --property-id, set KPIBOARD_PROPERTY_ID, \
                     or add property_id to the config file"
                )
            }
            CliError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        CliError::Core(e)
    }
}

// ============================================================================
// Argument Parsing
// ============================================================================

/// Parse `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| CliError::InvalidDate {
        value: s.to_string(),
    })
}

fn parse_amount(spec: &str, raw: &str) -> Result<Option<f64>, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw
        .replace('_', "")
        .parse::<f64>()
        .map_err(|_| CliError::InvalidTarget {
            spec: spec.to_string(),
            reason: format!("'{}' is not a number", raw),
        })?;
    if !value.is_finite() || value < 0.0 {
        return Err(CliError::InvalidTarget {
            spec: spec.to_string(),
            reason: format!("'{}' must be a non-negative number", raw),
        });
    }
    Ok(Some(value))
}

/// Parse `kpi=LAST,THIS`; either side may be empty (`sessions=,100000`)
/// and a single number sets only this month's target
pub fn parse_target(spec: &str) -> Result<(String, KpiTargets), CliError> {
    let (kpi, values) = spec.split_once('=').ok_or_else(|| CliError::InvalidTarget {
        spec: spec.to_string(),
        reason: "missing '='".to_string(),
    })?;

    let kpi = kpi.trim();
    if kpi.is_empty() {
        return Err(CliError::InvalidTarget {
            spec: spec.to_string(),
            reason: "empty KPI name".to_string(),
        });
    }

    let targets = match values.split_once(',') {
        Some((last, this)) => KpiTargets {
            last_month: parse_amount(spec, last)?,
            this_month: parse_amount(spec, this)?,
        },
        None => KpiTargets {
            last_month: None,
            this_month: parse_amount(spec, values)?,
        },
    };

    Ok((kpi.to_string(), targets))
}

// ============================================================================
// Formatters
// ============================================================================

/// Compact number: 1234567 -> "1.23M"
pub fn format_number(n: f64) -> String {
    let abs = n.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.2}B", n / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.0}", n)
    }
}

fn format_value(unit: Unit, value: Option<f64>) -> String {
    match (unit, value) {
        (_, None) => "-".to_string(),
        (Unit::Count, Some(v)) => format_number(v),
        (unit, Some(v)) => unit.format(v),
    }
}

fn tier_cell(tier: Option<Tier>, no_color: bool) -> Cell {
    let Some(tier) = tier else {
        return Cell::new("-");
    };
    let cell = Cell::new(tier.label());
    if no_color {
        return cell;
    }
    match tier {
        Tier::BelowThreshold => cell.fg(Color::Red),
        Tier::Threshold => cell.fg(Color::Yellow),
        Tier::Target => cell.fg(Color::Green),
        Tier::Challenge => cell.fg(Color::Cyan),
    }
}

fn header(table: &mut Table, names: &[&str], no_color: bool) {
    if no_color {
        table.set_header(names.to_vec());
    } else {
        table.set_header(
            names
                .iter()
                .map(|n| Cell::new(n).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

/// KPI summary table for a dashboard run
pub fn format_dashboard(view: &DashboardView, no_color: bool) -> String {
    if view.panels.is_empty() {
        return "No KPI could be computed.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(
        &mut table,
        &[
            "KPI",
            "Last month",
            "Month to date",
            "Tier",
            "Forecast (month)",
            "Projected tier",
            "Target",
            "Daily target",
        ],
        no_color,
    );

    for panel in &view.panels {
        let summary = &panel.summary;
        let projected = panel.gauge.projected;

        table.add_row(Row::from(vec![
            Cell::new(&panel.label),
            Cell::new(format_value(panel.unit, summary.historical_value())),
            Cell::new(format_value(panel.unit, panel.gauge.value)),
            tier_cell(panel.gauge.tier, no_color),
            Cell::new(format_value(panel.unit, projected)),
            tier_cell(panel.gauge.projected_tier, no_color),
            Cell::new(format_value(panel.unit, summary.monthly_target)),
            Cell::new(format_value(panel.unit, summary.daily_target)),
        ]));
    }

    let mut out = format!(
        "Property {} | today {} | data {}\n",
        view.property_id, view.today, view.fetched_window
    );
    out.push_str(&table.to_string());
    out
}

/// Insight text per KPI
pub fn format_insights(view: &DashboardView) -> String {
    view.panels
        .iter()
        .map(|p| format!("== {} ==\n{}", p.label, p.insight.display().trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Warnings and errors collected during the run
pub fn format_report(report: &PipelineReport) -> Option<String> {
    if !report.has_issues() {
        return None;
    }

    let (warnings, errors, fatal) = report.issue_count();
    let mut lines = vec![format!(
        "{} warning(s), {} error(s), {} fatal",
        warnings, errors, fatal
    )];

    for issue in &report.issues {
        let marker = match issue.severity {
            ErrorSeverity::Warning => "warn",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Fatal => "FATAL",
        };
        let scope = issue.kpi.as_deref().unwrap_or("-");
        lines.push(format!(
            "  [{}] {}/{}: {}",
            marker,
            issue.stage.label(),
            scope,
            issue.message
        ));
        if let Some(suggestion) = &issue.suggestion {
            lines.push(format!("        hint: {}", suggestion));
        }
    }

    Some(lines.join("\n"))
}

/// Effective benchmark tiers
pub fn format_benchmarks(benchmarks: &BenchmarkTable, no_color: bool) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(
        &mut table,
        &["KPI", "Threshold", "Target", "Challenge", "Direction"],
        no_color,
    );

    for (kpi, b) in benchmarks.iter() {
        let unit = Unit::for_kpi(kpi);
        let direction = if b.lower_is_better() {
            "lower is better"
        } else {
            "higher is better"
        };
        table.add_row(Row::from(vec![
            kpi.to_string(),
            format_value(unit, Some(b.threshold)),
            format_value(unit, Some(b.target)),
            format_value(unit, Some(b.challenge)),
            direction.to_string(),
        ]));
    }

    table.to_string()
}

/// The two reporting windows for a date
pub fn format_windows(today: NaiveDate) -> String {
    let previous = previous_month_window(today);
    let current = current_month_window(today)
        .map(|w| w.to_string())
        .unwrap_or_else(|| "(empty: first day of the month)".to_string());

    [
        format!("Today:            {}", today),
        format!("Previous month:   {} ({} days)", previous, previous.days()),
        format!("Month to date:    {}", current),
        format!("Days this month:  {}", days_in_month(today)),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_both() {
        let (kpi, t) = parse_target("sessions=95000,100000").unwrap();
        assert_eq!(kpi, "sessions");
        assert_eq!(t.last_month, Some(95000.0));
        assert_eq!(t.this_month, Some(100000.0));
    }

    #[test]
    fn test_parse_target_partial() {
        let (_, t) = parse_target("users=,70_000").unwrap();
        assert_eq!(t.last_month, None);
        assert_eq!(t.this_month, Some(70000.0));

        let (_, t) = parse_target("users=65000").unwrap();
        assert_eq!(t.last_month, None);
        assert_eq!(t.this_month, Some(65000.0));
    }

    #[test]
    fn test_parse_target_invalid() {
        assert!(matches!(
            parse_target("sessions"),
            Err(CliError::InvalidTarget { .. })
        ));
        assert!(matches!(
            parse_target("=100"),
            Err(CliError::InvalidTarget { .. })
        ));
        let err = parse_target("sessions=abc,1").unwrap_err();
        assert!(err.to_string().contains("'abc' is not a number"));
        assert!(parse_target("sessions=-5").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-01-10").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
        );
        assert!(matches!(
            parse_date("10/01/2025"),
            Err(CliError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(950.0), "950");
        assert_eq!(format_number(1_500.0), "1.50K");
        assert_eq!(format_number(2_345_678.0), "2.35M");
        assert_eq!(format_number(3_000_000_000.0), "3.00B");
    }

    #[test]
    fn test_format_value_units() {
        assert_eq!(format_value(Unit::Count, Some(100_000.0)), "100.00K");
        assert_eq!(format_value(Unit::Seconds, Some(180.0)), "3:00");
        assert_eq!(format_value(Unit::Percent, Some(35.0)), "35.0%");
        assert_eq!(format_value(Unit::Percent, None), "-");
    }

    #[test]
    fn test_format_windows() {
        let out = format_windows(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert!(out.contains("2024-12-01 .. 2024-12-31 (31 days)"));
        assert!(out.contains("2025-01-01 .. 2025-01-14"));

        let first = format_windows(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(first.contains("first day of the month"));
    }

    #[test]
    fn test_format_benchmarks() {
        let out = format_benchmarks(&BenchmarkTable::default(), true);
        assert!(out.contains("avg_engagement_time"));
        assert!(out.contains("4:00"));
        assert!(out.contains("lower is better"));
    }

    #[test]
    fn test_format_report_empty() {
        assert!(format_report(&PipelineReport::new()).is_none());
    }
}
