//! Top level configuration of the command line tool.

use std::{net::SocketAddr, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::Deserialize;
use tbtc_ethutil::{config::parse_toml, EthereumConfig};
use tracing::Level;

/// The configuration file, in TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Host chain connection, account and contract addresses.
    pub ethereum: EthereumConfig,
    /// Logging and trace export.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Prometheus endpoint served by `watch`.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl CliConfig {
    /// Parses the configuration without applying environment overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(parse_toml(contents)?)
    }

    /// Loads the configuration file and applies the `TBTC_ETHEREUM_*`
    /// environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .ethereum
            .apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }
}

/// Observability configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ObservabilityConfig {
    /// Log level filter, `info` unless set.
    pub level: String,
    /// Whether traces are exported over OTLP.
    pub use_otel: bool,
    /// Service name attached to exported traces.
    pub service_name: String,
    /// OTLP collector endpoint; the exporter default when unset.
    pub otel_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            use_otel: false,
            service_name: "tbtc-cli".to_string(),
            otel_endpoint: None,
        }
    }
}

impl ObservabilityConfig {
    /// The configured level, falling back to `INFO` when it does not parse.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

/// Address of the metrics server.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MetricsConfig {
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 9601,
        }
    }
}

impl MetricsConfig {
    /// The socket the metrics server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .with_context(|| format!("invalid metrics address {}:{}", self.address, self.port))
    }
}
