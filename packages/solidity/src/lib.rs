//! Solidity types for the tBTC contracts.
//!
//! Every module runs `sol!` over the contract's ABI in `abi/` and exposes the
//! raw ABI JSON for callers that need dynamic encoding.

#![deny(clippy::nursery, clippy::pedantic, warnings, unused_crate_dependencies)]

pub mod bridge;
pub mod light_relay;
pub mod light_relay_maintainer_proxy;
pub mod wallet_proposal_validator;

/// Names under which the contracts are registered in the address book.
pub mod names {
    /// The `Bridge` contract.
    pub const BRIDGE: &str = "Bridge";
    /// The `LightRelay` contract.
    pub const LIGHT_RELAY: &str = "LightRelay";
    /// The `LightRelayMaintainerProxy` contract.
    pub const LIGHT_RELAY_MAINTAINER_PROXY: &str = "LightRelayMaintainerProxy";
    /// The `WalletProposalValidator` contract.
    pub const WALLET_PROPOSAL_VALIDATOR: &str = "WalletProposalValidator";

    /// All known contract names.
    pub const ALL: [&str; 4] = [
        BRIDGE,
        LIGHT_RELAY,
        LIGHT_RELAY_MAINTAINER_PROXY,
        WALLET_PROPOSAL_VALIDATOR,
    ];
}

/// Returns the ABI JSON of a contract by its registered name.
#[must_use]
pub fn abi_json(name: &str) -> Option<&'static str> {
    match name {
        names::BRIDGE => Some(bridge::ABI_JSON),
        names::LIGHT_RELAY => Some(light_relay::ABI_JSON),
        names::LIGHT_RELAY_MAINTAINER_PROXY => Some(light_relay_maintainer_proxy::ABI_JSON),
        names::WALLET_PROPOSAL_VALIDATOR => Some(wallet_proposal_validator::ABI_JSON),
        _ => None,
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FromStateError {
    #[error("unknown wallet state: {0}")]
    UnknownWalletState(u8),
    #[error("unknown moved funds sweep request state: {0}")]
    UnknownMovedFundsSweepRequestState(u8),
}
