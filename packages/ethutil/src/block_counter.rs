//! Tracking the chain head.

use std::time::Duration;

use alloy::primitives::BlockNumber;
use tokio::sync::{oneshot, watch};

use crate::{
    backend::SharedBackend,
    error::{Error, Result},
};

/// Default interval between block number polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Follows the latest block number by polling the chain.
///
/// Clones share the same poller, which stops once every clone is dropped.
#[derive(Clone, Debug)]
pub struct BlockCounter {
    latest: watch::Receiver<BlockNumber>,
}

impl BlockCounter {
    /// Reads the current block and starts polling for new ones.
    pub async fn new(backend: SharedBackend, poll_interval: Duration) -> Result<Self> {
        let current = backend.block_number().await?;
        let (sender, latest) = watch::channel(current);

        tokio::spawn(poll_blocks(backend, sender, poll_interval));

        Ok(Self { latest })
    }

    /// The latest block seen.
    #[must_use]
    pub fn current_block(&self) -> BlockNumber {
        *self.latest.borrow()
    }

    /// Waits until the chain reaches `height` and returns the block seen.
    pub async fn wait_for_block_height(&self, height: BlockNumber) -> Result<BlockNumber> {
        let mut latest = self.latest.clone();
        let block = latest
            .wait_for(|block| *block >= height)
            .await
            .map_err(|_| Error::Closed("block counter"))?;
        Ok(*block)
    }

    /// Returns a receiver that resolves once the chain reaches `height`.
    #[must_use]
    pub fn block_height_waiter(&self, height: BlockNumber) -> oneshot::Receiver<BlockNumber> {
        let (sender, receiver) = oneshot::channel();
        let counter = self.clone();

        tokio::spawn(async move {
            if let Ok(block) = counter.wait_for_block_height(height).await {
                let _ = sender.send(block);
            }
        });

        receiver
    }

    /// Returns a receiver notified about every new block height.
    #[must_use]
    pub fn watch_blocks(&self) -> watch::Receiver<BlockNumber> {
        let mut receiver = self.latest.clone();
        receiver.mark_unchanged();
        receiver
    }
}

async fn poll_blocks(
    backend: SharedBackend,
    sender: watch::Sender<BlockNumber>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = sender.closed() => return,
            _ = ticker.tick() => {}
        }

        match backend.block_number().await {
            Ok(block) => {
                sender.send_if_modified(|latest| {
                    if block > *latest {
                        *latest = block;
                        true
                    } else {
                        false
                    }
                });
            }
            Err(err) => tracing::warn!("failed to get current block number: [{err}]"),
        }
    }
}
