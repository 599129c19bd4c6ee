//! Solidity types for `LightRelay.sol`

/// The ABI of the `LightRelay` contract.
pub const ABI_JSON: &str = include_str!("../../../abi/LightRelay.json");

alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    LightRelay,
    "../../abi/LightRelay.json"
);
