//! Command line client of the tBTC contracts: calls and transactions built
//! from the contract ABIs at runtime, past event queries and a live event
//! watcher exporting metrics.

#![warn(clippy::nursery, clippy::pedantic, unused_crate_dependencies)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod abi;
pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;

#[cfg(test)]
use tempfile as _;
