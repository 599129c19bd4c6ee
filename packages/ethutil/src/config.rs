//! Configuration of the Ethereum connection and the operator account.

use std::{collections::BTreeMap, fmt, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use alloy::{
    primitives::{utils::parse_units, Address, U256},
    signers::local::PrivateKeySigner,
};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

use crate::{
    keys::{parse_private_key, read_from_keystore},
    mining::{DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_GAS_FEE_CAP},
};

/// Overrides the key file password.
pub const PASSWORD_ENV: &str = "TBTC_ETHEREUM_PASSWORD";
/// Overrides the JSON-RPC URL.
pub const URL_ENV: &str = "TBTC_ETHEREUM_URL";
/// Overrides the key file path.
pub const KEY_FILE_ENV: &str = "TBTC_ETHEREUM_KEYFILE";

/// The Ethereum section of the configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint of the Ethereum node.
    pub url: Url,
    /// The operator account. Without a key the contracts are bound read-only.
    #[serde(default)]
    pub account: AccountConfig,
    /// Contract addresses by contract name, e.g. `Bridge`.
    #[serde(default)]
    pub contract_addresses: BTreeMap<String, Address>,
    /// Transaction mining and resubmission.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Maximum number of requests per second sent to the node; 0 disables the limit.
    #[serde(default)]
    pub requests_per_second_limit: u32,
    /// Maximum number of concurrent requests to the node; 0 disables the limit.
    #[serde(default)]
    pub concurrency_limit: usize,
    /// Account balance below which an alert is logged. Unset or zero
    /// disables balance monitoring.
    #[serde(default)]
    pub balance_alert_threshold: Option<Wei>,
}

impl EthereumConfig {
    /// Parses the configuration from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        parse_toml(contents)
    }

    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.display().to_string(), err))?;
        parse_toml(&contents)
    }

    /// Applies the environment overrides, reading variables through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(URL_ENV) {
            self.url = Url::parse(&url).map_err(|err| ConfigError::InvalidUrl(url, err))?;
        }
        if let Some(key_file) = lookup(KEY_FILE_ENV) {
            self.account.key_file = Some(PathBuf::from(key_file));
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.account.key_file_password = Some(password);
        }
        Ok(())
    }

    /// The configured address of contract `name`.
    pub fn contract_address(&self, name: &str) -> Result<Address, ConfigError> {
        self.contract_addresses
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::MissingContractAddress(name.to_string()))
    }

    /// The balance alert threshold, if balance monitoring is enabled.
    #[must_use]
    pub fn balance_alert_threshold(&self) -> Option<U256> {
        self.balance_alert_threshold
            .map(|threshold| threshold.0)
            .filter(|threshold| !threshold.is_zero())
    }
}

/// The operator account key.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Path to an encrypted V3 JSON keystore.
    pub key_file: Option<PathBuf>,
    /// Password of the keystore.
    pub key_file_password: Option<String>,
    /// Hex encoded private key, used instead of a keystore.
    pub private_key: Option<String>,
}

impl AccountConfig {
    /// Loads the configured signer, `None` when no key is configured.
    pub fn signer(&self) -> crate::error::Result<Option<PrivateKeySigner>> {
        match (&self.key_file, &self.private_key) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingKeys.into()),
            (Some(key_file), None) => {
                let password = self.key_file_password.as_deref().unwrap_or_default();
                read_from_keystore(key_file, password).map(Some)
            }
            (None, Some(private_key)) => parse_private_key(private_key).map(Some),
            (None, None) => Ok(None),
        }
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("key_file", &self.key_file)
            .field(
                "key_file_password",
                &self.key_file_password.as_ref().map(|_| "<redacted>"),
            )
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Transaction mining and resubmission.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MiningConfig {
    /// Seconds between receipt checks of a pending transaction.
    pub check_interval_secs: u64,
    /// Fee cap above which transactions are not resubmitted.
    pub max_gas_fee_cap: Wei,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
            max_gas_fee_cap: Wei(U256::from(DEFAULT_MAX_GAS_FEE_CAP)),
        }
    }
}

impl MiningConfig {
    /// The receipt check interval.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// The maximum fee cap in wei.
    #[must_use]
    pub fn max_gas_fee_cap(&self) -> u128 {
        self.max_gas_fee_cap.0.saturating_to()
    }
}

/// An amount of ether in wei.
///
/// Written in configuration either as an integer number of wei or as a string
/// with a unit, e.g. `"500 gwei"` or `"0.5 ether"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wei(pub U256);

impl FromStr for Wei {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidAmount {
            value: value.to_string(),
            reason,
        };

        let mut parts = value.split_whitespace();
        let (Some(amount), unit, None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected an amount and an optional unit".to_string()));
        };
        if amount.starts_with('-') {
            return Err(invalid("amount must not be negative".to_string()));
        }

        match unit {
            None => U256::from_str_radix(amount, 10)
                .map(Self)
                .map_err(|err| invalid(err.to_string())),
            Some(unit) => parse_units(amount, unit.to_lowercase().as_str())
                .map(|parsed| Self(parsed.get_absolute()))
                .map_err(|err| invalid(err.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Integer(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Integer(wei) => Ok(Self(U256::from(wei))),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// Parses TOML with path-aware error messages.
pub fn parse_toml<T>(contents: &str) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    let deserializer = toml::Deserializer::new(contents);
    serde_path_to_error::deserialize(deserializer).map_err(|err| ConfigError::Toml {
        path: err.path().to_string(),
        source: err.into_inner(),
    })
}

/// Errors that can occur loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("config error at `{path}`: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid URL `{0}`: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("invalid amount `{value}`: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("no address configured for contract {0}")]
    MissingContractAddress(String),

    #[error("account key_file and private_key are mutually exclusive")]
    ConflictingKeys,
}
