//! Turning opaque contract failures into readable errors.

use alloy::{
    eips::BlockId,
    primitives::{hex, Address, Bytes, U256},
    sol_types::{Panic, Revert, SolError},
};

use crate::{backend::SharedBackend, error::Error, transactor::call_request};

/// Resolves failed contract interactions by replaying them as calls and
/// decoding the revert data.
#[derive(Clone)]
pub struct ErrorResolver {
    backend: SharedBackend,
    address: Address,
}

impl ErrorResolver {
    /// Creates a resolver for the contract at `address`.
    #[must_use]
    pub fn new(backend: SharedBackend, address: Address) -> Self {
        Self { backend, address }
    }

    /// Wraps `original` with an explanation of why the call failed.
    ///
    /// Revert data already attached to the error is decoded directly;
    /// otherwise the call is replayed against the latest block.
    pub async fn resolve(&self, original: Error, from: Address, value: U256, data: Bytes) -> Error {
        let resolution = match original.revert_data() {
            Some(revert_data) => describe_revert(revert_data),
            None => self.replay(from, value, data).await,
        };

        Error::Resolved {
            resolution,
            source: Box::new(original),
        }
    }

    async fn replay(&self, from: Address, value: U256, data: Bytes) -> String {
        let request = call_request(from, self.address, value, data);
        match self.backend.call(request, BlockId::latest()).await {
            Ok(response) => describe_revert(&response),
            Err(err) => match err.revert_data() {
                Some(revert_data) => describe_revert(revert_data),
                None => format!("unable to resolve error: [{err}]"),
            },
        }
    }
}

/// Describes revert data returned by a contract.
pub fn describe_revert(data: &[u8]) -> String {
    if data.len() < 4 {
        return format!(
            "response [{}] was not long enough to interpret as an error",
            hex::encode_prefixed(data)
        );
    }

    let selector = &data[..4];
    if selector == Revert::SELECTOR {
        return match Revert::abi_decode(data) {
            Ok(revert) => format!("contract failed with: [{}]", revert.reason),
            Err(err) => format!(
                "failed to decode revert reason from response [{}]: [{err}]",
                hex::encode_prefixed(data)
            ),
        };
    }

    if selector == Panic::SELECTOR {
        return match Panic::abi_decode(data) {
            Ok(panic) => match panic.kind() {
                Some(kind) => format!("contract panicked with code [{}]: [{kind}]", panic.code),
                None => format!("contract panicked with code [{}]", panic.code),
            },
            Err(err) => format!(
                "failed to decode panic code from response [{}]: [{err}]",
                hex::encode_prefixed(data)
            ),
        };
    }

    format!(
        "no method with id [{}] in response [{}]",
        hex::encode_prefixed(selector),
        hex::encode_prefixed(data)
    )
}
