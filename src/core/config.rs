use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    StatusInvest,
    Yahoo,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StatusInvestProviderConfig {
    pub base_url: String,
}

impl Default for StatusInvestProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://statusinvest.com.br".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Exchange suffix appended to tickers that carry none, e.g. `PETR4` -> `PETR4.SA`.
    pub symbol_suffix: Option<String>,
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            symbol_suffix: Some(".SA".to_string()),
            max_attempts: 2,
            retry_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub status_invest: StatusInvestProviderConfig,
    pub yahoo: YahooProviderConfig,
    /// Order in which the chain consults the providers.
    pub order: Vec<ProviderKind>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            status_invest: StatusInvestProviderConfig::default(),
            yahoo: YahooProviderConfig::default(),
            order: vec![ProviderKind::StatusInvest, ProviderKind::Yahoo],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub provider_delay_ms: u64,
    pub refresh_attempts: usize,
    pub refresh_retry_delay_ms: u64,
    pub storage_attempts: usize,
    pub storage_backoff_ms: u64,
    pub ticker_delay_ms: u64,
    pub auto_ticker_delay_ms: u64,
    pub auto_refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub bulk_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            provider_delay_ms: 1000,
            refresh_attempts: 2,
            refresh_retry_delay_ms: 2000,
            storage_attempts: 3,
            storage_backoff_ms: 200,
            ticker_delay_ms: 1000,
            auto_ticker_delay_ms: 500,
            auto_refresh_interval_secs: 120,
            request_timeout_secs: 60,
            bulk_timeout_secs: 900,
            http_timeout_secs: 15,
        }
    }
}

impl SyncConfig {
    pub fn provider_delay(&self) -> Duration {
        Duration::from_millis(self.provider_delay_ms)
    }

    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SalaryConfigSection {
    pub check_interval_secs: u64,
    pub label: String,
}

impl Default for SalaryConfigSection {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            label: "Monthly salary".to_string(),
        }
    }
}

impl SalaryConfigSection {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct InvestmentsConfig {
    /// Expense category that tags investment purchases; created on first use.
    pub category: String,
    pub description_prefix: String,
}

impl Default for InvestmentsConfig {
    fn default() -> Self {
        Self {
            category: "Investment".to_string(),
            description_prefix: "Investment:".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: Option<String>,
    pub database: DatabaseConfig,
    pub providers: ProvidersConfig,
    pub sync: SyncConfig,
    pub salary: SalaryConfigSection,
    pub investments: InvestmentsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "moneta", "moneta")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn database_file(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.database_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "moneta", "moneta")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("moneta.sqlite"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        if config_str.trim().is_empty() {
            debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
