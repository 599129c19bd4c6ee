//! Error types for the chain-binding toolkit.

use alloy::primitives::Bytes;

use crate::config::ConfigError;

/// Result alias used across the toolkit.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the chain-binding toolkit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A JSON-RPC request failed. Carries revert data when the node returned it.
    #[error("rpc error: {message}")]
    Rpc {
        /// The error message reported by the node or transport.
        message: String,
        /// Raw revert data attached to the error response, if any.
        revert_data: Option<Bytes>,
    },

    /// A contract interaction failed and the failure was resolved against the contract.
    #[error("{resolution}; original error: [{source}]")]
    Resolved {
        /// The human readable resolution of the failure.
        resolution: String,
        /// The error that triggered the resolution.
        #[source]
        source: Box<Error>,
    },

    /// ABI encoding or decoding failed.
    #[error("abi error: {0}")]
    Abi(#[from] alloy::sol_types::Error),

    /// Dynamic ABI encoding or decoding failed.
    #[error("dynamic abi error: {0}")]
    DynAbi(#[from] alloy::dyn_abi::Error),

    /// Signing a transaction failed.
    #[error("failed to sign transaction: {0}")]
    Signing(#[from] alloy::signers::Error),

    /// Reading or decrypting the account key failed.
    #[error("failed to load account key: {0}")]
    Key(String),

    /// The binding was created without a signer and cannot submit transactions.
    #[error("contract {0} is bound read-only; no account key configured")]
    ReadOnly(String),

    /// The requested method or event does not exist in the contract ABI.
    #[error("no {kind} [{name}] in contract {contract}")]
    UnknownAbiItem {
        /// `method` or `event`.
        kind: &'static str,
        /// The name that was looked up.
        name: String,
        /// The contract that was searched.
        contract: String,
    },

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A background task or channel closed unexpectedly.
    #[error("{0} closed")]
    Closed(&'static str),
}

impl Error {
    /// Creates an [`Error::Rpc`] without revert data.
    #[must_use]
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            message: message.into(),
            revert_data: None,
        }
    }

    /// Returns the revert data carried by this error or the error it resolved.
    #[must_use]
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::Rpc { revert_data, .. } => revert_data.as_ref(),
            Self::Resolved { source, .. } => source.revert_data(),
            _ => None,
        }
    }
}

impl From<alloy::transports::TransportError> for Error {
    fn from(err: alloy::transports::TransportError) -> Self {
        let revert_data = err.as_error_resp().and_then(|payload| payload.as_revert_data());
        Self::Rpc {
            message: err.to_string(),
            revert_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_error_mentions_both_causes() {
        let err = Error::Resolved {
            resolution: "contract failed with: [not authorized]".to_string(),
            source: Box::new(Error::rpc("execution reverted")),
        };

        let message = err.to_string();
        assert!(message.contains("not authorized"));
        assert!(message.contains("execution reverted"));
    }

    #[test]
    fn revert_data_is_found_through_resolution() {
        let data = Bytes::from_static(&[1, 2, 3, 4]);
        let err = Error::Resolved {
            resolution: "resolved".to_string(),
            source: Box::new(Error::Rpc {
                message: "reverted".to_string(),
                revert_data: Some(data.clone()),
            }),
        };

        assert_eq!(err.revert_data(), Some(&data));
        assert_eq!(Error::rpc("plain").revert_data(), None);
    }
}
