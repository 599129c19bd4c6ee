use std::io::Write;

use alloy::primitives::{address, U256};
use tbtc_cli::config::CliConfig;
use tempfile::NamedTempFile;

/// A complete configuration; tests tweak it textually.
const FULL: &str = r#"
[ethereum]
url = "http://localhost:8545"
requests_per_second_limit = 20
concurrency_limit = 5
balance_alert_threshold = "0.5 ether"

[ethereum.account]
key_file = "/keys/operator.json"
key_file_password = "password"

[ethereum.contract_addresses]
Bridge = "0x5e4861a80b55f035d899f66772117f00fa0e8e7b"
WalletProposalValidator = "0x8a0b6e5c6c2d1f4e6a1a7c08b0d4a5b6e2d9f3c1"

[ethereum.mining]
check_interval_secs = 30
max_gas_fee_cap = "150 gwei"

[observability]
level = "debug"
use_otel = true
service_name = "tbtc-watcher"
otel_endpoint = "http://collector:4317"

[metrics]
address = "127.0.0.1"
port = 9700
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn parses_full_config_file() {
    let file = write_config(FULL);
    let config = CliConfig::load(file.path()).unwrap();

    assert_eq!(config.ethereum.requests_per_second_limit, 20);
    assert_eq!(
        config.ethereum.contract_address("Bridge").unwrap(),
        address!("0x5e4861a80b55f035d899f66772117f00fa0e8e7b")
    );
    assert_eq!(
        config.ethereum.balance_alert_threshold(),
        Some(U256::from(500_000_000_000_000_000u64))
    );
    assert_eq!(config.ethereum.mining.max_gas_fee_cap(), 150_000_000_000);
    assert_eq!(config.observability.level(), tracing::Level::DEBUG);
    assert_eq!(
        config.observability.otel_endpoint.as_deref(),
        Some("http://collector:4317")
    );
    assert_eq!(
        config.metrics.socket_addr().unwrap(),
        "127.0.0.1:9700".parse().unwrap()
    );
}

#[test]
fn optional_sections_default() {
    let config = CliConfig::from_toml_str(
        r#"
        [ethereum]
        url = "http://localhost:8545"
        "#,
    )
    .unwrap();

    assert_eq!(config.observability.level(), tracing::Level::INFO);
    assert!(!config.observability.use_otel);
    assert_eq!(config.metrics.port, 9601);
    assert!(config.ethereum.contract_addresses.is_empty());
    assert_eq!(config.ethereum.balance_alert_threshold(), None);
}

#[test]
fn errors_name_the_failing_field() {
    let broken = FULL.replace("port = 9700", "port = \"nine\"");
    let err = CliConfig::from_toml_str(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("metrics.port"), "{err:#}");

    let broken = FULL.replace("max_gas_fee_cap = \"150 gwei\"", "max_gas_fee_cap = \"150 lots\"");
    let err = CliConfig::from_toml_str(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("ethereum.mining.max_gas_fee_cap"), "{err:#}");
}

#[test]
fn unknown_fields_are_rejected() {
    let broken = FULL.replace("[metrics]", "[metrics]\nhost = \"0.0.0.0\"");
    assert!(CliConfig::from_toml_str(&broken).is_err());
}

#[test]
fn missing_file_is_reported() {
    let err = CliConfig::load("/nonexistent/tbtc.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/tbtc.toml"));
}
