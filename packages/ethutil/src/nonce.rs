//! Local nonce tracking for a single account.

use std::time::Duration;

use alloy::primitives::Address;
use tokio::time::Instant;

use crate::{backend::SharedBackend, error::Result};

/// How long a locally incremented nonce is trusted over the chain's pending
/// nonce. Past this the local value is considered stale, e.g. because a
/// transaction was dropped from the mempool.
pub const LOCAL_NONCE_TRUST_DURATION: Duration = Duration::from_secs(5);

/// Tracks the nonce of an account between submissions.
///
/// The manager must only be used while holding the account's transaction
/// lock; the [`Transactor`](crate::transactor::Transactor) keeps it behind
/// that lock.
pub struct NonceManager {
    backend: SharedBackend,
    account: Address,
    local_nonce: u64,
    expiration: Instant,
}

impl NonceManager {
    /// Creates a nonce manager for the account.
    #[must_use]
    pub fn new(backend: SharedBackend, account: Address) -> Self {
        Self {
            backend,
            account,
            local_nonce: 0,
            expiration: Instant::now(),
        }
    }

    /// Returns the nonce to use for the next transaction.
    ///
    /// The chain's pending nonce is preferred when it is ahead. A local nonce
    /// ahead of the chain is kept until it expires and reset afterwards.
    pub async fn current_nonce(&mut self) -> Result<u64> {
        let pending_nonce = self.backend.pending_nonce(self.account).await?;
        let now = Instant::now();

        if pending_nonce < self.local_nonce {
            if now < self.expiration {
                tracing::info!(
                    local_nonce = self.local_nonce,
                    pending_nonce,
                    "local nonce is higher than pending nonce; using local nonce"
                );
            } else {
                tracing::info!(
                    local_nonce = self.local_nonce,
                    pending_nonce,
                    "local nonce is higher than pending nonce but it expired; resetting local nonce to pending nonce"
                );
                self.local_nonce = pending_nonce;
            }
        }

        if pending_nonce > self.local_nonce {
            tracing::info!(
                local_nonce = self.local_nonce,
                pending_nonce,
                "local nonce is lower than pending nonce; setting local nonce to pending nonce"
            );
            self.local_nonce = pending_nonce;
        }

        Ok(self.local_nonce)
    }

    /// Moves to the next nonce after a successful submission and refreshes
    /// the trust period of the local value.
    pub fn increment_nonce(&mut self) -> u64 {
        self.local_nonce += 1;
        self.expiration = Instant::now() + LOCAL_NONCE_TRUST_DURATION;
        self.local_nonce
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::MockBackend;

    fn manager(mock: &Arc<MockBackend>) -> NonceManager {
        NonceManager::new(mock.clone(), Address::repeat_byte(0x11))
    }

    #[tokio::test(start_paused = true)]
    async fn adopts_pending_nonce_when_chain_is_ahead() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.pending_nonce = 7);

        let mut nonce_manager = manager(&mock);
        assert_eq!(nonce_manager.current_nonce().await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_local_nonce_within_trust_period() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.pending_nonce = 3);

        let mut nonce_manager = manager(&mock);
        assert_eq!(nonce_manager.current_nonce().await.unwrap(), 3);
        assert_eq!(nonce_manager.increment_nonce(), 4);
        assert_eq!(nonce_manager.increment_nonce(), 5);

        // The node has not seen the transactions yet.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(nonce_manager.current_nonce().await.unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn resets_expired_local_nonce() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.pending_nonce = 3);

        let mut nonce_manager = manager(&mock);
        nonce_manager.current_nonce().await.unwrap();
        nonce_manager.increment_nonce();
        nonce_manager.increment_nonce();

        tokio::time::advance(LOCAL_NONCE_TRUST_DURATION + Duration::from_millis(1)).await;
        assert_eq!(nonce_manager.current_nonce().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn increment_refreshes_trust_period() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.pending_nonce = 0);

        let mut nonce_manager = manager(&mock);
        nonce_manager.current_nonce().await.unwrap();
        nonce_manager.increment_nonce();

        tokio::time::advance(Duration::from_secs(4)).await;
        nonce_manager.increment_nonce();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(nonce_manager.current_nonce().await.unwrap(), 2);
    }
}
