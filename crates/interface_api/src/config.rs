//! API configuration
//!
//! Loaded from `API_`-prefixed environment variables; nested sections use a
//! double underscore, e.g. `API_BILLING__TAX_RATE=0.2` or
//! `API_BILLING__HOLIDAYS=2024-12-25,2024-12-26`.

use config::{Config, ConfigError, Environment};
use domain_billing::BillingConfig;
use infra_db::DatabaseConfig;
use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Log filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
    pub billing: BillingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            database_max_connections: 10,
            log_level: "info".to_string(),
            log_json: false,
            billing: BillingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(environment())
    }

    /// Loads configuration from an explicit environment source
    pub fn from_environment(source: Environment) -> Result<Self, ConfigError> {
        let config: ApiConfig = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config
            .billing
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pool settings, if a database is configured
    pub fn database(&self) -> Option<DatabaseConfig> {
        self.database_url
            .as_ref()
            .map(|url| DatabaseConfig::new(url.clone()).max_connections(self.database_max_connections))
    }
}

/// `API_` prefix, `__` between nested keys, comma-separated holiday lists
pub fn environment() -> Environment {
    Environment::with_prefix("API")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("billing.holidays")
        .try_parsing(true)
}
