use bigdecimal::BigDecimal;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::{CoreError, Result};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_env("LOTLEDGER")
    }

    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> std::result::Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?
            .add_source(Environment::with_prefix(prefix).separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("LOTLEDGER").separator("__"));

        builder.build()?.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        builder
            .set_default("ingestion.default_premium_percent", DEFAULT_PREMIUM_PERCENT)?
            .set_default("ingestion.default_tax_percent", DEFAULT_TAX_PERCENT)?
            .set_default("ingestion.checkpoint_flush_interval", 10)?
            .set_default("ingestion.parallelism", 1)?
            .set_default("ingestion.max_keywords", 20)?
            .set_default("ingestion.document_extensions", vec!["txt", "text"])?
            .set_default("timeouts.document_read_secs", 30)?
            .set_default("timeouts.persist_secs", 60)?
            .set_default("timeouts.connect_secs", 10)?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ingestion: IngestionConfig::default(),
            timeouts: TimeoutConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Buyer's premium applied when a document has no auction metadata row
pub const DEFAULT_PREMIUM_PERCENT: &str = "18";
/// Sales tax applied when a document has no auction metadata row
pub const DEFAULT_TAX_PERCENT: &str = "8.625";

/// Ingestion behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Kept as text so the percentage never passes through a float
    #[serde(default = "default_premium_percent")]
    pub default_premium_percent: String,
    #[serde(default = "default_tax_percent")]
    pub default_tax_percent: String,
    /// Flush the checkpoint every N successful documents
    #[serde(default = "default_flush_interval")]
    pub checkpoint_flush_interval: usize,
    /// Documents processed concurrently per wave
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,
}

impl IngestionConfig {
    pub fn with_default_rates(
        mut self,
        premium_percent: impl Into<String>,
        tax_percent: impl Into<String>,
    ) -> Self {
        self.default_premium_percent = premium_percent.into();
        self.default_tax_percent = tax_percent.into();
        self
    }

    pub fn with_flush_interval(mut self, interval: usize) -> Self {
        self.checkpoint_flush_interval = interval;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Parse the configured fallback rates into exact decimals
    pub fn financial_defaults(&self) -> Result<FinancialDefaults> {
        FinancialDefaults::parse(&self.default_premium_percent, &self.default_tax_percent)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            default_premium_percent: default_premium_percent(),
            default_tax_percent: default_tax_percent(),
            checkpoint_flush_interval: default_flush_interval(),
            parallelism: default_parallelism(),
            max_keywords: default_max_keywords(),
            document_extensions: default_document_extensions(),
        }
    }
}

fn default_premium_percent() -> String {
    DEFAULT_PREMIUM_PERCENT.to_string()
}

fn default_tax_percent() -> String {
    DEFAULT_TAX_PERCENT.to_string()
}

fn default_flush_interval() -> usize {
    10
}

fn default_parallelism() -> usize {
    1
}

fn default_max_keywords() -> usize {
    20
}

fn default_document_extensions() -> Vec<String> {
    vec!["txt".to_string(), "text".to_string()]
}

/// Fallback financial rates used on a metadata miss
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialDefaults {
    pub premium_percent: BigDecimal,
    pub tax_percent: BigDecimal,
}

impl FinancialDefaults {
    pub fn parse(premium_percent: &str, tax_percent: &str) -> Result<Self> {
        Ok(Self {
            premium_percent: parse_percent("default_premium_percent", premium_percent)?,
            tax_percent: parse_percent("default_tax_percent", tax_percent)?,
        })
    }
}

impl Default for FinancialDefaults {
    fn default() -> Self {
        // Both constants are valid decimal literals
        Self {
            premium_percent: BigDecimal::from_str(DEFAULT_PREMIUM_PERCENT)
                .unwrap_or_else(|_| BigDecimal::from(18)),
            tax_percent: BigDecimal::from_str(DEFAULT_TAX_PERCENT)
                .unwrap_or_else(|_| BigDecimal::from(0)),
        }
    }
}

fn parse_percent(field: &str, value: &str) -> Result<BigDecimal> {
    let parsed = BigDecimal::from_str(value.trim()).map_err(|_| CoreError::InvalidDecimal {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    if parsed < BigDecimal::from(0) {
        return Err(CoreError::InvalidDecimal {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

/// Bounded timeouts for I/O
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_document_read_secs")]
    pub document_read_secs: u64,
    #[serde(default = "default_persist_secs")]
    pub persist_secs: u64,
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
}

impl TimeoutConfig {
    pub fn document_read(&self) -> Duration {
        Duration::from_secs(self.document_read_secs)
    }

    pub fn persist(&self) -> Duration {
        Duration::from_secs(self.persist_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            document_read_secs: default_document_read_secs(),
            persist_secs: default_persist_secs(),
            connect_secs: default_connect_secs(),
        }
    }
}

fn default_document_read_secs() -> u64 {
    30
}

fn default_persist_secs() -> u64 {
    60
}

fn default_connect_secs() -> u64 {
    10
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: String) -> Self {
        Self {
            url: Some(url),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }

    pub fn with_pool_size(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}
