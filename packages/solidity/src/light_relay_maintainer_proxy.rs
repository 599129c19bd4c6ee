//! Solidity types for `LightRelayMaintainerProxy.sol`

/// The ABI of the `LightRelayMaintainerProxy` contract.
pub const ABI_JSON: &str = include_str!("../../../abi/LightRelayMaintainerProxy.json");

alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    LightRelayMaintainerProxy,
    "../../abi/LightRelayMaintainerProxy.json"
);
