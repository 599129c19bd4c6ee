use std::{future::Future, time::Instant};

use alloy::{
    eips::{eip1559::Eip1559Estimation, BlockId},
    primitives::{Address, BlockNumber, Bytes, TxHash, U256},
    rpc::types::{Filter, Log, TransactionRequest},
};
use futures::stream::BoxStream;

use crate::{
    backend::{ChainBackend, ReceiptSummary, SharedBackend},
    error::Result,
    metrics,
};

/// Logs every client call at trace level and records it in the RPC metrics.
pub struct LoggingBackend {
    inner: SharedBackend,
}

impl LoggingBackend {
    /// Wraps the backend.
    #[must_use]
    pub fn new(inner: SharedBackend) -> Self {
        Self { inner }
    }

    async fn observe<T, F>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        metrics::RPC_REQUESTS.with_label_values(&[method]).inc();

        let result = call.await;
        let elapsed = started.elapsed();
        metrics::RPC_DURATION
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());

        match &result {
            Ok(_) => tracing::trace!(method, ?elapsed, "ethereum client call completed"),
            Err(err) => {
                metrics::RPC_FAILURES.with_label_values(&[method]).inc();
                tracing::trace!(method, ?elapsed, %err, "ethereum client call failed");
            }
        }

        result
    }
}

#[async_trait::async_trait]
impl ChainBackend for LoggingBackend {
    async fn chain_id(&self) -> Result<u64> {
        self.observe("eth_chainId", self.inner.chain_id()).await
    }

    async fn block_number(&self) -> Result<BlockNumber> {
        self.observe("eth_blockNumber", self.inner.block_number())
            .await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.observe("eth_getTransactionCount", self.inner.pending_nonce(address))
            .await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.observe("eth_getBalance", self.inner.balance(address))
            .await
    }

    async fn call(&self, request: TransactionRequest, block: BlockId) -> Result<Bytes> {
        self.observe("eth_call", self.inner.call(request, block))
            .await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        self.observe("eth_estimateGas", self.inner.estimate_gas(request))
            .await
    }

    async fn fee_estimate(&self) -> Result<Eip1559Estimation> {
        self.observe("eth_feeHistory", self.inner.fee_estimate())
            .await
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<TxHash> {
        self.observe(
            "eth_sendRawTransaction",
            self.inner.send_raw_transaction(encoded),
        )
        .await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        self.observe(
            "eth_getTransactionReceipt",
            self.inner.transaction_receipt(hash),
        )
        .await
    }

    async fn logs(&self, filter: Filter) -> Result<Vec<Log>> {
        self.observe("eth_getLogs", self.inner.logs(filter)).await
    }

    async fn watch_logs(&self, filter: Filter) -> Result<BoxStream<'static, Vec<Log>>> {
        self.observe("eth_newFilter", self.inner.watch_logs(filter))
            .await
    }
}
