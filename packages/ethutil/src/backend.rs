//! The JSON-RPC seam of the toolkit.
//!
//! Everything above this module talks to the chain through [`ChainBackend`],
//! so that client wrappers (logging, rate limiting) can be stacked and tests
//! can run against an in-memory chain.

use std::{fmt, sync::Arc};

use alloy::{
    eips::{eip1559::Eip1559Estimation, BlockId},
    network::{Ethereum, ReceiptResponse},
    primitives::{Address, BlockNumber, Bytes, TxHash, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::{Filter, Log, TransactionRequest},
};
use futures::{stream::BoxStream, StreamExt};
use url::Url;

use crate::{
    client::{LoggingBackend, RateLimitedBackend, RateLimiterConfig},
    config::EthereumConfig,
    error::Result,
};

/// A backend shared between contracts, transactors and background tasks.
pub type SharedBackend = Arc<dyn ChainBackend>;

/// The part of a transaction receipt the toolkit cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptSummary {
    /// The hash of the mined transaction.
    pub transaction_hash: TxHash,
    /// The block the transaction was included in.
    pub block_number: Option<BlockNumber>,
    /// Whether the transaction executed successfully.
    pub success: bool,
}

/// Abstraction over the Ethereum JSON-RPC methods used by the bindings.
#[async_trait::async_trait]
pub trait ChainBackend: Send + Sync + 'static {
    /// Returns the chain id.
    async fn chain_id(&self) -> Result<u64>;
    /// Returns the latest block number.
    async fn block_number(&self) -> Result<BlockNumber>;
    /// Returns the nonce of the account including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;
    /// Returns the balance of the account at the latest block.
    async fn balance(&self, address: Address) -> Result<U256>;
    /// Executes a call without creating a transaction.
    async fn call(&self, request: TransactionRequest, block: BlockId) -> Result<Bytes>;
    /// Estimates the gas required by the transaction.
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;
    /// Estimates EIP-1559 fees for the next block.
    async fn fee_estimate(&self) -> Result<Eip1559Estimation>;
    /// Broadcasts a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<TxHash>;
    /// Returns the receipt of a mined transaction.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>>;
    /// Returns the logs matching the filter.
    async fn logs(&self, filter: Filter) -> Result<Vec<Log>>;
    /// Streams new logs matching the filter. The stream ends when the
    /// underlying filter is lost.
    async fn watch_logs(&self, filter: Filter) -> Result<BoxStream<'static, Vec<Log>>>;
}

/// A [`ChainBackend`] backed by an alloy [`Provider`].
#[derive(Clone)]
pub struct ProviderBackend<P> {
    provider: P,
    pubsub: bool,
}

impl<P> ProviderBackend<P> {
    /// Wraps a provider over a request-response transport. New logs are
    /// watched through polled filters.
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            pubsub: false,
        }
    }

    /// Wraps a provider over a websocket or IPC transport. New logs are
    /// watched through `eth_subscribe`.
    pub const fn with_pubsub(provider: P) -> Self {
        Self {
            provider,
            pubsub: true,
        }
    }
}

impl<P> fmt::Debug for ProviderBackend<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBackend").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<P> ChainBackend for ProviderBackend<P>
where
    P: Provider<Ethereum> + Clone + 'static,
{
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<BlockNumber> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn call(&self, request: TransactionRequest, block: BlockId) -> Result<Bytes> {
        Ok(self.provider.call(request).block(block).await?)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(request).await?)
    }

    async fn fee_estimate(&self) -> Result<Eip1559Estimation> {
        Ok(self.provider.estimate_eip1559_fees().await?)
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<TxHash> {
        let pending = self.provider.send_raw_transaction(&encoded).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|receipt| ReceiptSummary {
            transaction_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
        }))
    }

    async fn logs(&self, filter: Filter) -> Result<Vec<Log>> {
        Ok(self.provider.get_logs(&filter).await?)
    }

    async fn watch_logs(&self, filter: Filter) -> Result<BoxStream<'static, Vec<Log>>> {
        if self.pubsub {
            let subscription = self.provider.subscribe_logs(&filter).await?;
            return Ok(subscription.into_stream().map(|log| vec![log]).boxed());
        }

        let poller = self.provider.watch_logs(&filter).await?;
        Ok(poller.into_stream().boxed())
    }
}

/// Connects to the configured JSON-RPC endpoint and stacks the client
/// wrappers on top of it: call logging always, rate limiting when any limit
/// is configured.
pub async fn connect(config: &EthereumConfig) -> Result<SharedBackend> {
    connect_url(
        &config.url,
        RateLimiterConfig {
            requests_per_second_limit: config.requests_per_second_limit,
            concurrency_limit: config.concurrency_limit,
        },
    )
    .await
}

/// Same as [`connect`] for an explicit URL and limiter configuration.
///
/// `http(s)` endpoints are connected lazily; `ws(s)` and IPC endpoints are
/// dialed before returning.
pub async fn connect_url(url: &Url, limits: RateLimiterConfig) -> Result<SharedBackend> {
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .network::<Ethereum>()
        .connect(url.as_str())
        .await?;

    let backend: SharedBackend = if is_pubsub(url) {
        Arc::new(ProviderBackend::with_pubsub(provider))
    } else {
        Arc::new(ProviderBackend::new(provider))
    };
    Ok(wrap_backend(backend, limits))
}

/// Whether the endpoint supports subscriptions.
fn is_pubsub(url: &Url) -> bool {
    !matches!(url.scheme(), "http" | "https")
}

/// Adds the client wrappers to an existing backend.
#[must_use]
pub fn wrap_backend(backend: SharedBackend, limits: RateLimiterConfig) -> SharedBackend {
    let logging: SharedBackend = Arc::new(LoggingBackend::new(backend));

    if limits.is_enabled() {
        tracing::info!(
            rps_limit = limits.requests_per_second_limit,
            concurrency_limit = limits.concurrency_limit,
            "enabled ethereum client request rate limiter"
        );
        return Arc::new(RateLimitedBackend::new(logging, limits));
    }

    logging
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use tokio::net::TcpListener;

    use super::*;

    #[rstest]
    #[case::http("http://localhost:8545", false)]
    #[case::https("https://node.example.com/rpc", false)]
    #[case::websocket("ws://node:8546", true)]
    #[case::secure_websocket("wss://node.example.com/ws", true)]
    #[case::ipc("file:///var/run/geth.ipc", true)]
    fn subscriptions_need_a_pubsub_endpoint(#[case] url: &str, #[case] pubsub: bool) {
        assert_eq!(is_pubsub(&Url::parse(url).unwrap()), pubsub);
    }

    #[tokio::test]
    async fn websocket_endpoints_are_dialed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();

        let connecting = tokio::spawn(async move {
            connect_url(&url, RateLimiterConfig::default()).await.map(|_| ())
        });

        let accepted = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
        assert!(accepted.is_ok_and(|connection| connection.is_ok()));
        connecting.abort();
    }

    #[tokio::test]
    async fn http_endpoints_connect_lazily() {
        let url = Url::parse("http://127.0.0.1:1").unwrap();
        assert!(connect_url(&url, RateLimiterConfig::default()).await.is_ok());
    }
}
