//! Command line interface.

use std::path::PathBuf;

use alloy::primitives::{BlockNumber, U256};
use clap::{Parser, Subcommand};
use tbtc_ethutil::config::Wei;

/// Command line client of the tBTC contracts.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct TbtcCli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "config.toml", env = "TBTC_CONFIG")]
    pub config: PathBuf,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The subcommands.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Lists the methods of a contract with their signatures.
    Methods {
        /// Contract name, e.g. `Bridge`.
        contract: String,
    },
    /// Prints past events of a contract as JSON.
    Events(EventsCmd),
    /// Follows the events of every configured contract and serves metrics.
    Watch,
    /// `<contract> <method> [args..]`: calls or submits a contract method.
    #[command(external_subcommand)]
    Invoke(Vec<String>),
}

/// Arguments of the `events` subcommand.
#[derive(Clone, Debug, Parser)]
pub struct EventsCmd {
    /// Contract name.
    pub contract: String,
    /// Event name, e.g. `DepositRevealed`.
    pub event: String,
    /// First block of the range.
    #[arg(long, default_value_t = 0)]
    pub from_block: BlockNumber,
    /// Last block of the range, the latest block when unset.
    #[arg(long)]
    pub to_block: Option<BlockNumber>,
}

/// Arguments of a contract method invocation.
#[derive(Clone, Debug, Parser)]
#[command(no_binary_name = true)]
pub struct InvokeCmd {
    /// Contract name.
    pub contract: String,
    /// Method name, in ABI or snake/kebab case.
    pub method: String,
    /// Method arguments in ABI literal syntax; tuples and arrays as
    /// `(a,b,[c,d])`.
    pub args: Vec<String>,
    /// Block at which calls are executed, the latest block when unset.
    #[arg(long)]
    pub block: Option<BlockNumber>,
    /// Submits a state changing method as a transaction instead of
    /// simulating it.
    #[arg(long, conflicts_with = "estimate_gas")]
    pub submit: bool,
    /// Ether transferred to a payable method, in wei or with a unit
    /// (`0.1 ether`).
    #[arg(long)]
    pub value: Option<Wei>,
    /// Prints the gas estimate of a state changing method.
    #[arg(long)]
    pub estimate_gas: bool,
}

impl InvokeCmd {
    /// Parses the words captured by [`Commands::Invoke`].
    pub fn parse_words(words: &[String]) -> Result<Self, clap::Error> {
        Self::try_parse_from(words)
    }

    /// The transferred value, zero when unset.
    #[must_use]
    pub fn value(&self) -> U256 {
        self.value.map(|value| value.0).unwrap_or_default()
    }
}
