//! Typed bindings of the tBTC contracts on Ethereum and the [`Chain`] handle
//! that connects them.
//!
//! Every wrapper exposes, for each state changing method `m`, the submission
//! `m`, the simulation `call_m` and the estimate `m_gas_estimate`; for each
//! constant method `m`, the reads `m` and `m_at_block`; for each event `E`,
//! the subscription `e_event` and the query `past_e_events`.

#![warn(clippy::nursery, clippy::pedantic, unused_crate_dependencies)]
#![allow(
    clippy::too_many_arguments,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

#[macro_use]
mod macros;

pub mod bridge;
pub mod chain;
pub mod light_relay;
pub mod light_relay_maintainer_proxy;
pub mod wallet_proposal_validator;

pub use bridge::Bridge;
pub use chain::Chain;
pub use light_relay::LightRelay;
pub use light_relay_maintainer_proxy::LightRelayMaintainerProxy;
pub use wallet_proposal_validator::WalletProposalValidator;

