//! Chain-binding toolkit for the tBTC contracts: transaction submission with
//! nonce management and fee bumping, error resolution, event subscriptions,
//! block tracking, client rate limiting and balance monitoring.
#![warn(clippy::nursery, clippy::pedantic, unused_crate_dependencies)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod backend;
pub mod balance;
pub mod block_counter;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod error_resolver;
pub mod keys;
pub mod metrics;
pub mod mining;
pub mod nonce;
pub mod subscription;
pub mod transactor;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{ChainBackend, SharedBackend};
pub use config::EthereumConfig;
pub use contract::{BoundContract, TopicFilter};
pub use error::{Error, Result};
pub use subscription::{ContractEvent, EventSubscription, SubscribeOpts, SubscriptionHandle};
pub use transactor::{SubmittedTransaction, TransactionOptions, Transactor};
