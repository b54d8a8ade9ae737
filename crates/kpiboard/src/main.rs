//! kpiboard - Marketing KPI dashboard

mod cli;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use kpiboard_core::analytics::{build_prompt, today, ForecastModel};
use kpiboard_core::config::MAX_HISTORY_DAYS;
use kpiboard_core::pipeline::fetch_window;
use kpiboard_core::{
    AppConfig, ChatCompletionsClient, Dashboard, DashboardConfig, DashboardView, Ga4Client,
    JsonFileSource, MetricsSource, RunRequest,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::cli::CliError;

#[derive(Parser)]
#[command(
    name = "kpiboard",
    version,
    about = "Marketing KPI dashboard",
    long_about = "Fetches daily web-analytics metrics, compares last month and the month to date\n\
                  against targets and benchmark tiers, forecasts the rest of the month and asks\n\
                  an LLM for a short commentary per KPI.\n\
                  \n\
                  Examples:\n\
                    kpiboard report --property-id 123456789          # Full run (GA4 + insights)\n\
                    kpiboard report --no-insights --json             # JSON payload, no LLM calls\n\
                    kpiboard report --source-file daily.json         # Offline run from a file\n\
                    kpiboard report --target sessions=95000,100000   # Override a KPI target\n\
                    kpiboard prompt --source-file daily.json         # Print the insight prompts\n\
                    kpiboard windows --today 2025-01-15              # Show the reporting windows\n\
                    kpiboard benchmarks                              # Show the benchmark tiers\n\
                  \n\
                  Environment Variables:\n\
                    KPIBOARD_PROPERTY_ID             # Analytics property id\n\
                    KPIBOARD_GA4_TOKEN               # OAuth bearer token for the Data API\n\
                    KPIBOARD_LLM_API_KEY             # API key for the insight service\n\
                    KPIBOARD_LOG                     # Log filter (falls back to RUST_LOG)\n\
                    KPIBOARD_NO_COLOR                # Disable ANSI colors"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config_dir>/kpiboard/config.toml)
    #[arg(long, global = true, env = "KPIBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Disable ANSI colors
    #[arg(long, global = true, env = "KPIBOARD_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dashboard pipeline and print the result
    Report {
        #[command(flatten)]
        run: RunArgs,

        /// API key for the insight service
        #[arg(long, env = "KPIBOARD_LLM_API_KEY", hide_env_values = true)]
        llm_api_key: Option<String>,

        /// Skip LLM insights
        #[arg(long)]
        no_insights: bool,

        /// Output the full view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the insight prompt of every KPI without calling the LLM
    Prompt {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show the effective benchmark tiers
    Benchmarks,
    /// Show the reporting windows for a date
    Windows {
        /// Reference date (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Analytics property id
    #[arg(long, env = "KPIBOARD_PROPERTY_ID")]
    property_id: Option<String>,

    /// OAuth bearer token for the analytics Data API
    #[arg(long, env = "KPIBOARD_GA4_TOKEN", hide_env_values = true)]
    ga4_token: Option<String>,

    /// Read daily metrics from a JSON file instead of the analytics API
    #[arg(long)]
    source_file: Option<PathBuf>,

    /// KPI to report (repeatable, default: config or built-in list)
    #[arg(long = "kpi")]
    kpis: Vec<String>,

    /// Target override as kpi=LAST,THIS (repeatable)
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Reference date (YYYY-MM-DD, default: today)
    #[arg(long)]
    today: Option<String>,

    /// Days of history to fetch
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HISTORY_DAYS)))]
    history_days: Option<u32>,

    /// Forecasting model (default: config)
    #[arg(long, value_enum)]
    forecast_model: Option<ForecastArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ForecastArg {
    /// Trend plus weekly seasonality
    Seasonal,
    /// Least-squares trend
    Linear,
}

impl From<ForecastArg> for ForecastModel {
    fn from(arg: ForecastArg) -> Self {
        match arg {
            ForecastArg::Seasonal => ForecastModel::Seasonal,
            ForecastArg::Linear => ForecastModel::Linear,
        }
    }
}

/// Log to stderr, filtered by KPIBOARD_LOG, then RUST_LOG, then "warn"
fn init_logging() {
    let filter = EnvFilter::try_from_env("KPIBOARD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let no_color = cli.no_color;

    match cli.command {
        Command::Report {
            run,
            llm_api_key,
            no_insights,
            json,
        } => {
            let llm_api_key = if no_insights { None } else { llm_api_key };
            run_report(&config, &run, llm_api_key, json, no_color).await?;
        }
        Command::Prompt { run } => {
            run_prompt(&config, &run).await?;
        }
        Command::Benchmarks => {
            println!("{}", cli::format_benchmarks(&config.benchmark_table(), no_color));
        }
        Command::Windows { today: date } => {
            let date = resolve_today(date.as_deref())?;
            let window = fetch_window(date, config.analytics.history_days);
            println!("{}", cli::format_windows(date));
            println!("Fetch window:     {} ({} days)", window, window.days());
        }
    }

    Ok(())
}

fn resolve_today(value: Option<&str>) -> Result<NaiveDate, CliError> {
    match value {
        Some(v) => cli::parse_date(v),
        None => Ok(today()),
    }
}

fn build_request(config: &AppConfig, run: &RunArgs) -> Result<RunRequest> {
    let property_id = match (&run.property_id, &config.property_id, &run.source_file) {
        (Some(id), _, _) | (None, Some(id), _) => id.clone(),
        (None, None, Some(path)) => path.display().to_string(),
        (None, None, None) => return Err(CliError::MissingPropertyId.into()),
    };

    let kpis = if run.kpis.is_empty() {
        config.kpis.clone()
    } else {
        run.kpis.clone()
    };

    let mut request =
        RunRequest::new(property_id, resolve_today(run.today.as_deref())?).with_kpis(kpis);
    for spec in &run.targets {
        let (kpi, targets) = cli::parse_target(spec)?;
        request = request.with_target(kpi, targets);
    }

    Ok(request)
}

fn forecast_model(config: &AppConfig, run: &RunArgs) -> ForecastModel {
    run.forecast_model
        .map_or(config.forecast.model, ForecastModel::from)
}

async fn run_dashboard<S: MetricsSource + Sync>(
    source: S,
    llm: Option<ChatCompletionsClient>,
    config: DashboardConfig,
    model: ForecastModel,
    request: &RunRequest,
) -> Result<DashboardView> {
    let dashboard = Dashboard::new(source, llm, config).with_forecaster(model);
    Ok(dashboard.run(request).await?)
}

/// Build the source and insight client, then run the pipeline behind a spinner
async fn execute(
    config: &AppConfig,
    run: &RunArgs,
    llm_api_key: Option<String>,
) -> Result<DashboardView> {
    use indicatif::{ProgressBar, ProgressStyle};

    let request = build_request(config, run)?;

    let mut dashboard_config = DashboardConfig::from_app_config(config);
    if let Some(days) = run.history_days {
        dashboard_config.history_days = days;
    }

    let llm = match llm_api_key {
        Some(key) if dashboard_config.insights_enabled => Some(
            ChatCompletionsClient::new(key, config.insights.llm_settings())
                .context("Failed to create insight client")?,
        ),
        _ => {
            if dashboard_config.insights_enabled {
                tracing::info!("No LLM API key, insights disabled");
            }
            dashboard_config.insights_enabled = false;
            None
        }
    };

    let model = forecast_model(config, run);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Fetching metrics for {}...", request.property_id));

    let result = match &run.source_file {
        Some(path) => {
            let source = JsonFileSource::new(path);
            run_dashboard(source, llm, dashboard_config, model, &request).await
        }
        None => {
            let token = run.ga4_token.clone().context(
                "No analytics token: pass --ga4-token or set KPIBOARD_GA4_TOKEN \
                 (or use --source-file)",
            )?;
            let source = Ga4Client::new(
                config.analytics.endpoint.clone(),
                token,
                Duration::from_secs(config.analytics.timeout_secs),
            )
            .context("Failed to create analytics client")?;
            run_dashboard(source, llm, dashboard_config, model, &request).await
        }
    };

    spinner.finish_and_clear();
    result.context("Dashboard run failed")
}

async fn run_report(
    config: &AppConfig,
    run: &RunArgs,
    llm_api_key: Option<String>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let view = execute(config, run, llm_api_key).await?;

    if json {
        let out = serde_json::to_string_pretty(&view).context("Failed to serialize view")?;
        println!("{}", out);
    } else {
        println!("{}", cli::format_dashboard(&view, no_color));
        if view.panels.iter().any(|p| p.insight.text().is_some()) {
            println!();
            println!("{}", cli::format_insights(&view));
        }
    }

    if let Some(issues) = cli::format_report(&view.report) {
        eprintln!("{}", issues);
    }

    if view.report.has_fatal_errors() {
        std::process::exit(2);
    }

    Ok(())
}

async fn run_prompt(config: &AppConfig, run: &RunArgs) -> Result<()> {
    let view = execute(config, run, None).await?;

    for panel in &view.panels {
        let prompt = build_prompt(&panel.insight_request());
        println!("=== {} ===", panel.label);
        println!("[system]\n{}\n", prompt.system);
        println!("[user]\n{}", prompt.user);
    }

    if let Some(issues) = cli::format_report(&view.report) {
        eprintln!("{}", issues);
    }

    Ok(())
}
