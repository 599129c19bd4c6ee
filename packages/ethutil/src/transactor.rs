//! Signing and submitting transactions for a single account.

use std::sync::Arc;

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::{eip2718::Encodable2718, eip2930::AccessList},
    network::TxSignerSync,
    primitives::{Address, Bytes, TxHash, TxKind, U256},
    rpc::types::{TransactionInput, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    backend::SharedBackend, error::Result, metrics, mining::MiningWaiter, nonce::NonceManager,
};

/// Per-call overrides of the transaction parameters. Unset values are
/// estimated from the chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Gas limit. When set it is also kept on resubmission.
    pub gas_limit: Option<u64>,
    /// Maximum fee per gas (EIP-1559 fee cap), in wei.
    pub gas_fee_cap: Option<u128>,
    /// Maximum priority fee per gas (EIP-1559 tip), in wei.
    pub gas_tip_cap: Option<u128>,
    /// Ether sent with the transaction, in wei.
    pub value: Option<U256>,
}

impl TransactionOptions {
    /// Sets the gas limit.
    #[must_use]
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Sets the fee cap.
    #[must_use]
    pub const fn with_gas_fee_cap(mut self, gas_fee_cap: u128) -> Self {
        self.gas_fee_cap = Some(gas_fee_cap);
        self
    }

    /// Sets the tip.
    #[must_use]
    pub const fn with_gas_tip_cap(mut self, gas_tip_cap: u128) -> Self {
        self.gas_tip_cap = Some(gas_tip_cap);
        self
    }

    /// Sets the value.
    #[must_use]
    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
}

/// Fully resolved parameters of an EIP-1559 contract call transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxParams {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl TxParams {
    /// The call request used for gas estimation.
    #[must_use]
    pub fn call_request(&self, from: Address) -> TransactionRequest {
        call_request(from, self.to, self.value, self.input.clone())
    }
}

/// Builds an `eth_call` / `eth_estimateGas` request.
#[must_use]
pub fn call_request(from: Address, to: Address, value: U256, input: Bytes) -> TransactionRequest {
    TransactionRequest::default()
        .from(from)
        .to(to)
        .value(value)
        .input(TransactionInput::new(input))
}

/// A transaction accepted by the node.
#[derive(Debug)]
pub struct SubmittedTransaction {
    /// Hash of the first submitted version of the transaction.
    pub hash: TxHash,
    /// The nonce the transaction was submitted with.
    pub nonce: u64,
    /// The background task waiting for the transaction to be mined.
    /// Dropping the handle detaches the task; aborting it stops resubmissions.
    pub mining: JoinHandle<()>,
}

/// Submits transactions on behalf of one account.
///
/// Nonce allocation is serialized by the account's transaction lock, which
/// guards the [`NonceManager`] and is held from reading the nonce until the
/// transaction was accepted by the node.
pub struct Transactor {
    backend: SharedBackend,
    signer: PrivateKeySigner,
    chain_id: u64,
    nonce_manager: Mutex<NonceManager>,
    mining_waiter: MiningWaiter,
}

impl Transactor {
    /// Creates a transactor for the signer's account.
    #[must_use]
    pub fn new(
        backend: SharedBackend,
        signer: PrivateKeySigner,
        chain_id: u64,
        mining_waiter: MiningWaiter,
    ) -> Self {
        let nonce_manager = NonceManager::new(Arc::clone(&backend), signer.address());
        Self {
            backend,
            signer,
            chain_id,
            nonce_manager: Mutex::new(nonce_manager),
            mining_waiter,
        }
    }

    /// The account transactions are sent from.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs and submits a call to `to` with the given calldata, then spawns
    /// the mining waiter for it.
    pub async fn submit(
        self: &Arc<Self>,
        label: &str,
        to: Address,
        input: Bytes,
        options: &TransactionOptions,
    ) -> Result<SubmittedTransaction> {
        let mut nonce_manager = self.nonce_manager.lock().await;

        let nonce = nonce_manager.current_nonce().await?;
        let params = self.prepare(to, input, options, nonce).await?;
        let hash = self.sign_and_send(&params).await?;

        tracing::info!("submitted transaction {label} with id [{hash}] and nonce [{nonce}]");

        let mining = self.spawn_mining_waiter(label, params, hash, options.gas_limit.is_some());
        nonce_manager.increment_nonce();

        let (contract, method) = label.split_once('.').unwrap_or((label, ""));
        metrics::TRANSACTIONS_SUBMITTED
            .with_label_values(&[contract, method])
            .inc();

        Ok(SubmittedTransaction {
            hash,
            nonce,
            mining,
        })
    }

    async fn prepare(
        &self,
        to: Address,
        input: Bytes,
        options: &TransactionOptions,
        nonce: u64,
    ) -> Result<TxParams> {
        let (max_fee_per_gas, max_priority_fee_per_gas) =
            match (options.gas_fee_cap, options.gas_tip_cap) {
                (Some(fee_cap), Some(tip_cap)) => (fee_cap, tip_cap),
                (fee_cap, tip_cap) => {
                    let estimate = self.backend.fee_estimate().await?;
                    (
                        fee_cap.unwrap_or(estimate.max_fee_per_gas),
                        tip_cap.unwrap_or(estimate.max_priority_fee_per_gas),
                    )
                }
            };

        let mut params = TxParams {
            to,
            input,
            value: options.value.unwrap_or_default(),
            nonce,
            gas_limit: 0,
            max_fee_per_gas,
            max_priority_fee_per_gas: max_priority_fee_per_gas.min(max_fee_per_gas),
        };

        params.gas_limit = match options.gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                self.backend
                    .estimate_gas(params.call_request(self.address()))
                    .await?
            }
        };

        Ok(params)
    }

    fn spawn_mining_waiter(
        self: &Arc<Self>,
        label: &str,
        params: TxParams,
        hash: TxHash,
        gas_limit_fixed: bool,
    ) -> JoinHandle<()> {
        let transactor = Arc::clone(self);
        let waiter = self.mining_waiter.clone();
        let label = label.to_string();

        tokio::spawn(async move {
            waiter
                .force_mining(&label, params, hash, |next| {
                    let transactor = Arc::clone(&transactor);
                    async move { transactor.resubmit(next, gas_limit_fixed).await }
                })
                .await;
        })
    }

    async fn resubmit(&self, mut params: TxParams, gas_limit_fixed: bool) -> Result<(TxParams, TxHash)> {
        if !gas_limit_fixed {
            params.gas_limit = self
                .backend
                .estimate_gas(params.call_request(self.address()))
                .await?;
        }

        let hash = self.sign_and_send(&params).await?;
        Ok((params, hash))
    }

    fn sign(&self, params: &TxParams) -> Result<TxEnvelope> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: params.nonce,
            gas_limit: params.gas_limit,
            max_fee_per_gas: params.max_fee_per_gas,
            max_priority_fee_per_gas: params.max_priority_fee_per_gas,
            to: TxKind::Call(params.to),
            value: params.value,
            access_list: AccessList::default(),
            input: params.input.clone(),
        };

        let signature = self.signer.sign_transaction_sync(&mut tx)?;
        Ok(tx.into_signed(signature).into())
    }

    async fn sign_and_send(&self, params: &TxParams) -> Result<TxHash> {
        let envelope = self.sign(params)?;
        self.backend
            .send_raw_transaction(envelope.encoded_2718().into())
            .await
    }
}
