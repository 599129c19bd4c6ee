//! Solidity types for `Bridge.sol`

use alloy_primitives::FixedBytes;

use crate::FromStateError;

/// The ABI of the `Bridge` contract.
pub const ABI_JSON: &str = include_str!("../../../abi/Bridge.json");

alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    Bridge,
    "../../abi/Bridge.json"
);

/// Lifecycle state of a wallet registered in the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WalletState {
    /// The wallet is unknown to the bridge.
    Unknown,
    /// The wallet can sweep deposits and handle redemptions.
    Live,
    /// The wallet was asked to move its funds to other wallets.
    MovingFunds,
    /// The wallet moved its funds and waits for the closing period to end.
    Closing,
    /// The wallet is closed.
    Closed,
    /// The wallet committed fraud or failed to move funds.
    Terminated,
}

impl TryFrom<u8> for WalletState {
    type Error = FromStateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Live),
            2 => Ok(Self::MovingFunds),
            3 => Ok(Self::Closing),
            4 => Ok(Self::Closed),
            5 => Ok(Self::Terminated),
            _ => Err(FromStateError::UnknownWalletState(value)),
        }
    }
}

/// State of a moved funds sweep request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MovedFundsSweepRequestState {
    /// The request is unknown to the bridge.
    Unknown,
    /// The request waits to be swept.
    Pending,
    /// The moved funds were swept.
    Processed,
    /// The request timed out.
    TimedOut,
}

impl TryFrom<u8> for MovedFundsSweepRequestState {
    type Error = FromStateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Processed),
            3 => Ok(Self::TimedOut),
            _ => Err(FromStateError::UnknownMovedFundsSweepRequestState(value)),
        }
    }
}

impl Wallets::Wallet {
    /// The decoded wallet state.
    ///
    /// # Errors
    /// Returns an error if the contract reported a state this crate does not know.
    pub fn wallet_state(&self) -> Result<WalletState, FromStateError> {
        WalletState::try_from(self.state)
    }

    /// Whether the wallet holds no main UTXO.
    #[must_use]
    pub fn has_no_main_utxo(&self) -> bool {
        self.mainUtxoHash == FixedBytes::ZERO
    }
}

impl MovingFunds::MovedFundsSweepRequest {
    /// The decoded request state.
    ///
    /// # Errors
    /// Returns an error if the contract reported a state this crate does not know.
    pub fn request_state(&self) -> Result<MovedFundsSweepRequestState, FromStateError> {
        MovedFundsSweepRequestState::try_from(self.state)
    }
}
