//! kpiboard configuration file
//!
//! TOML at `<config_dir>/kpiboard/config.toml` (e.g.
//! `~/.config/kpiboard/config.toml` on Linux). Every key is optional:
//!
//! ```toml
//! property_id = "123456789"
//! kpis = ["users", "sessions", "avg_engagement_time", "bounce_rate_pct"]
//!
//! [analytics]
//! history_days = 120
//!
//! [insights]
//! model = "gpt-4o"
//! temperature = 0.3
//!
//! [forecast]
//! model = "linear"
//!
//! [benchmarks.sessions]
//! threshold = 8000
//! target = 10000
//! challenge = 12000
//!
//! [targets.sessions]
//! last_month = 9500
//! this_month = 10000
//! ```
//!
//! Credentials are never read from this file; they come from the
//! environment or the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analytics::{ForecastModel, KpiTargets};
use crate::error::{CoreError, Result};
use crate::llm::{LlmSettings, DEFAULT_LLM_ENDPOINT};
use crate::models::{columns, Benchmark, BenchmarkTable};
use crate::source::DEFAULT_GA4_ENDPOINT;

/// KPIs reported when neither the config nor the command line picks any
pub const DEFAULT_KPIS: [&str; 4] = [
    columns::USERS,
    columns::SESSIONS,
    columns::AVG_ENGAGEMENT_TIME,
    columns::BOUNCE_RATE_PCT,
];

/// Upper bound for `analytics.history_days` (ten years)
pub const MAX_HISTORY_DAYS: u32 = 3650;

/// `[analytics]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub endpoint: String,
    /// Days of history fetched before today (forecast training data)
    pub history_days: u32,
    pub timeout_secs: u64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GA4_ENDPOINT.to_string(),
            history_days: 90,
            timeout_secs: 30,
        }
    }
}

/// `[insights]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        let llm = LlmSettings::default();
        Self {
            enabled: true,
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: llm.model,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            timeout_secs: llm.timeout_secs,
        }
    }
}

impl InsightSettings {
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// `[forecast]` section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub model: ForecastModel,
}

/// Whole configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub property_id: Option<String>,
    pub kpis: Vec<String>,
    pub analytics: AnalyticsSettings,
    pub insights: InsightSettings,
    pub forecast: ForecastSettings,
    /// Per-KPI overrides merged over the built-in benchmarks
    pub benchmarks: BTreeMap<String, Benchmark>,
    pub targets: BTreeMap<String, KpiTargets>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            property_id: None,
            kpis: DEFAULT_KPIS.iter().map(|k| k.to_string()).collect(),
            analytics: AnalyticsSettings::default(),
            insights: InsightSettings::default(),
            forecast: ForecastSettings::default(),
            benchmarks: BTreeMap::new(),
            targets: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Default config location, None when the platform has no config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kpiboard").join("config.toml"))
    }

    /// Load configuration
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is tried and a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => {
                    tracing::debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !required && !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| CoreError::FileRead {
            path: path.clone(),
            source: e,
        })?;

        let config = Self::from_toml(&content, &path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content (`path` is only used in errors)
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(CoreError::InvalidConfig { message });

        if !(0.0..=2.0).contains(&self.insights.temperature) {
            return invalid(format!(
                "insights.temperature must be within [0, 2], got {}",
                self.insights.temperature
            ));
        }
        if self.insights.max_tokens == 0 {
            return invalid("insights.max_tokens must be > 0".to_string());
        }
        if !(1..=MAX_HISTORY_DAYS).contains(&self.analytics.history_days) {
            return invalid(format!(
                "analytics.history_days must be within [1, {}], got {}",
                MAX_HISTORY_DAYS, self.analytics.history_days
            ));
        }
        if self.analytics.timeout_secs == 0 || self.insights.timeout_secs == 0 {
            return invalid("timeout_secs must be > 0".to_string());
        }
        if let Some((kpi, _)) = self.benchmarks.iter().find(|(_, b)| !b.is_finite()) {
            return invalid(format!("benchmarks.{} has a non-finite tier", kpi));
        }
        if let Some((kpi, _)) = self.targets.iter().find(|(_, t)| {
            [t.last_month, t.this_month]
                .iter()
                .flatten()
                .any(|v| !v.is_finite() || *v < 0.0)
        }) {
            return invalid(format!("targets.{} must be finite and non-negative", kpi));
        }
        Ok(())
    }

    /// Built-in benchmarks with this file's overrides applied
    pub fn benchmark_table(&self) -> BenchmarkTable {
        BenchmarkTable::with_overrides(&self.benchmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.kpis.len(), 4);
        assert_eq!(config.analytics.history_days, 90);
        assert_eq!(config.insights.model, "gpt-4");
        assert_eq!(config.insights.max_tokens, 500);
        assert!(config.insights.enabled);
        assert_eq!(config.forecast.model, ForecastModel::Seasonal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
property_id = "123456"
kpis = ["sessions"]

[analytics]
history_days = 120

[insights]
enabled = false
temperature = 0.2

[forecast]
model = "linear"

[benchmarks.sessions]
threshold = 1.0
target = 2.0
challenge = 3.0

[targets.sessions]
last_month = 9500.0
this_month = 10000.0
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.property_id.as_deref(), Some("123456"));
        assert_eq!(config.kpis, vec!["sessions".to_string()]);
        assert_eq!(config.analytics.history_days, 120);
        assert_eq!(config.analytics.timeout_secs, 30);
        assert!(!config.insights.enabled);
        assert_eq!(config.insights.model, "gpt-4");
        assert_eq!(config.forecast.model, ForecastModel::Linear);
        assert_eq!(config.targets["sessions"].this_month, Some(10000.0));

        let table = config.benchmark_table();
        assert_eq!(table.get("sessions").unwrap().challenge, 3.0);
        assert_eq!(table.get("users").unwrap().target, 70_000.0);
    }

    #[test]
    fn test_history_days_out_of_range() {
        let path = Path::new("config.toml");
        for days in [0, MAX_HISTORY_DAYS + 1, 100_000_000] {
            let content = format!("[analytics]\nhistory_days = {}\n", days);
            let err = AppConfig::from_toml(&content, path).unwrap_err();
            assert!(matches!(err, CoreError::InvalidConfig { .. }), "{} days", days);
        }

        let content = format!("[analytics]\nhistory_days = {}\n", MAX_HISTORY_DAYS);
        assert!(AppConfig::from_toml(&content, path).is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/kpiboard.toml"))).unwrap_err();
        assert!(matches!(err, CoreError::FileRead { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = AppConfig::from_toml("kpis = [", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_validate_temperature() {
        let err = AppConfig::from_toml("[insights]\ntemperature = 3.5\n", Path::new("c.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_validate_max_tokens() {
        let mut config = AppConfig::default();
        config.insights.max_tokens = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_benchmarks_finite() {
        let mut config = AppConfig::default();
        config
            .benchmarks
            .insert("users".to_string(), Benchmark::new(1.0, f64::NAN, 3.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("benchmarks.users"));
    }

    #[test]
    fn test_llm_settings_from_section() {
        let mut insights = InsightSettings::default();
        insights.model = "gpt-4o-mini".to_string();
        let llm = insights.llm_settings();
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.temperature, 0.7);
    }
}
