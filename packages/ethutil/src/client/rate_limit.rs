use std::{future::Future, sync::Arc, time::Duration};

use alloy::{
    eips::{eip1559::Eip1559Estimation, BlockId},
    primitives::{Address, BlockNumber, Bytes, TxHash, U256},
    rpc::types::{Filter, Log, TransactionRequest},
};
use futures::stream::BoxStream;
use tokio::{
    sync::{Mutex, OwnedSemaphorePermit, Semaphore},
    time::Instant,
};

use crate::{
    backend::{ChainBackend, ReceiptSummary, SharedBackend},
    error::{Error, Result},
};

/// How long a request may wait for a free concurrency slot.
const ACQUIRE_PERMIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Limits applied to the ethereum client. Zero disables a limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum number of requests started per second.
    pub requests_per_second_limit: u32,
    /// Maximum number of requests in flight.
    pub concurrency_limit: usize,
}

impl RateLimiterConfig {
    /// Whether any limit is set.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.requests_per_second_limit > 0 || self.concurrency_limit > 0
    }
}

/// Bounds the request rate and the number of concurrent requests.
pub struct RateLimitedBackend {
    inner: SharedBackend,
    semaphore: Option<Arc<Semaphore>>,
    pacing: Option<Pacing>,
}

struct Pacing {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimitedBackend {
    /// Wraps the backend with the given limits.
    #[must_use]
    pub fn new(inner: SharedBackend, config: RateLimiterConfig) -> Self {
        let semaphore =
            (config.concurrency_limit > 0).then(|| Arc::new(Semaphore::new(config.concurrency_limit)));
        let pacing = (config.requests_per_second_limit > 0).then(|| Pacing {
            interval: Duration::from_secs(1) / config.requests_per_second_limit,
            next_slot: Mutex::new(Instant::now()),
        });

        Self {
            inner,
            semaphore,
            pacing,
        }
    }

    async fn acquire(&self) -> Result<Option<OwnedSemaphorePermit>> {
        let permit = match &self.semaphore {
            Some(semaphore) => {
                let permit = tokio::time::timeout(
                    ACQUIRE_PERMIT_TIMEOUT,
                    Arc::clone(semaphore).acquire_owned(),
                )
                .await
                .map_err(|_| Error::rpc("timed out waiting for a rate limiter permit"))?
                .map_err(|_| Error::Closed("rate limiter"))?;
                Some(permit)
            }
            None => None,
        };

        if let Some(pacing) = &self.pacing {
            let slot = {
                let mut next_slot = pacing.next_slot.lock().await;
                let slot = (*next_slot).max(Instant::now());
                *next_slot = slot + pacing.interval;
                slot
            };
            tokio::time::sleep_until(slot).await;
        }

        Ok(permit)
    }

    async fn limited<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.acquire().await?;
        call.await
    }
}

#[async_trait::async_trait]
impl ChainBackend for RateLimitedBackend {
    async fn chain_id(&self) -> Result<u64> {
        self.limited(self.inner.chain_id()).await
    }

    async fn block_number(&self) -> Result<BlockNumber> {
        self.limited(self.inner.block_number()).await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.limited(self.inner.pending_nonce(address)).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.limited(self.inner.balance(address)).await
    }

    async fn call(&self, request: TransactionRequest, block: BlockId) -> Result<Bytes> {
        self.limited(self.inner.call(request, block)).await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        self.limited(self.inner.estimate_gas(request)).await
    }

    async fn fee_estimate(&self) -> Result<Eip1559Estimation> {
        self.limited(self.inner.fee_estimate()).await
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<TxHash> {
        self.limited(self.inner.send_raw_transaction(encoded)).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        self.limited(self.inner.transaction_receipt(hash)).await
    }

    async fn logs(&self, filter: Filter) -> Result<Vec<Log>> {
        self.limited(self.inner.logs(filter)).await
    }

    // Only installing the filter is limited; the poller paces itself.
    async fn watch_logs(&self, filter: Filter) -> Result<BoxStream<'static, Vec<Log>>> {
        self.limited(self.inner.watch_logs(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::MockBackend;

    #[tokio::test(start_paused = true)]
    async fn requests_are_spaced_by_rps_limit() {
        let mock = Arc::new(MockBackend::new());
        let limited = RateLimitedBackend::new(
            mock,
            RateLimiterConfig {
                requests_per_second_limit: 4,
                concurrency_limit: 0,
            },
        );

        let started = Instant::now();
        for _ in 0..5 {
            limited.block_number().await.unwrap();
        }

        // First request goes out immediately, the following four wait 250ms each.
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_limit_bounds_in_flight_requests() {
        let mock = Arc::new(MockBackend::new());
        mock.set_call_delay(Duration::from_millis(100));
        let limited = Arc::new(RateLimitedBackend::new(
            mock.clone(),
            RateLimiterConfig {
                requests_per_second_limit: 0,
                concurrency_limit: 2,
            },
        ));

        let finished = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limited = Arc::clone(&limited);
            let finished = Arc::clone(&finished);
            handles.push(tokio::spawn(async move {
                limited.block_number().await.unwrap();
                finished.fetch_add(1, Ordering::SeqCst);
            }));
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(mock.max_in_flight(), 2);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_limits_are_disabled() {
        assert!(!RateLimiterConfig::default().is_enabled());
        assert!(RateLimiterConfig {
            requests_per_second_limit: 0,
            concurrency_limit: 1
        }
        .is_enabled());
    }
}
