//! Solidity types for `WalletProposalValidator.sol`

/// The ABI of the `WalletProposalValidator` contract.
pub const ABI_JSON: &str = include_str!("../../../abi/WalletProposalValidator.json");

alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    WalletProposalValidator,
    "../../abi/WalletProposalValidator.json"
);
