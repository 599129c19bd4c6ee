//! Waiting for submitted transactions to be mined and resubmitting them with
//! higher fees when they are not.

use std::{future::Future, time::Duration};

use alloy::primitives::TxHash;

use crate::{
    backend::{ReceiptSummary, SharedBackend},
    error::Result,
    metrics,
    transactor::TxParams,
};

/// Default time between receipt checks of a pending transaction.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default upper bound of the gas fee cap, 500 gwei.
pub const DEFAULT_MAX_GAS_FEE_CAP: u128 = 500_000_000_000;

/// Percentage by which fees are raised on every resubmission.
const FEE_BUMP_PERCENT: u128 = 20;

/// Monitors pending transactions and resubmits them with bumped fees.
#[derive(Clone)]
pub struct MiningWaiter {
    backend: SharedBackend,
    check_interval: Duration,
    max_gas_fee_cap: u128,
}

impl MiningWaiter {
    /// Creates a mining waiter.
    #[must_use]
    pub fn new(backend: SharedBackend, check_interval: Duration, max_gas_fee_cap: u128) -> Self {
        Self {
            backend,
            check_interval,
            max_gas_fee_cap,
        }
    }

    /// Returns the configured check interval.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Waits for the transaction to be mined, resubmitting it through
    /// `resubmit` with 20% higher fees every time a check finds it pending.
    ///
    /// Resubmissions keep the nonce, so any of the submitted versions may end
    /// up mined; all of them are checked. Gives up once a transaction with
    /// the maximum fee cap was sent.
    pub async fn force_mining<F, Fut>(
        &self,
        label: &str,
        mut params: TxParams,
        mut hash: TxHash,
        mut resubmit: F,
    ) where
        F: FnMut(TxParams) -> Fut + Send,
        Fut: Future<Output = Result<(TxParams, TxHash)>> + Send,
    {
        let mut submitted = vec![hash];

        loop {
            tokio::time::sleep(self.check_interval).await;

            if let Some(receipt) = self.find_receipt(&submitted).await {
                log_mined(label, &receipt);
                return;
            }

            tracing::info!("transaction {label} [{hash}] not yet mined");

            let Some((max_fee_per_gas, max_priority_fee_per_gas)) = bump_fees(
                params.max_fee_per_gas,
                params.max_priority_fee_per_gas,
                self.max_gas_fee_cap,
            ) else {
                tracing::info!(
                    "transaction {label} [{hash}] reached the maximum allowed gas fee cap [{}]; will not resubmit",
                    self.max_gas_fee_cap
                );
                return;
            };

            // `params` keeps the fees last sent; a failed attempt is retried
            // from them.
            let mut next = params.clone();
            next.max_fee_per_gas = max_fee_per_gas;
            next.max_priority_fee_per_gas = max_priority_fee_per_gas;

            match resubmit(next).await {
                Ok((resubmitted, new_hash)) => {
                    tracing::info!(
                        gas_fee_cap = resubmitted.max_fee_per_gas,
                        gas_tip_cap = resubmitted.max_priority_fee_per_gas,
                        gas_limit = resubmitted.gas_limit,
                        nonce = resubmitted.nonce,
                        "transaction {label} [{hash}] resubmitted as [{new_hash}]"
                    );
                    metrics::TRANSACTIONS_RESUBMITTED.inc();
                    params = resubmitted;
                    hash = new_hash;
                    submitted.push(new_hash);
                }
                Err(err) => {
                    tracing::warn!("could not resubmit transaction {label} [{hash}]: [{err}]");
                }
            }
        }
    }

    async fn find_receipt(&self, hashes: &[TxHash]) -> Option<ReceiptSummary> {
        for hash in hashes.iter().rev() {
            match self.backend.transaction_receipt(*hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("could not get receipt of transaction [{hash}]: [{err}]");
                }
            }
        }
        None
    }
}

fn log_mined(label: &str, receipt: &ReceiptSummary) {
    let block = receipt
        .block_number
        .map_or_else(|| "unknown".to_string(), |block| block.to_string());
    if receipt.success {
        tracing::info!(
            "transaction {label} [{}] mined with status [1] at block [{block}]",
            receipt.transaction_hash
        );
    } else {
        tracing::warn!(
            "transaction {label} [{}] mined with status [0] at block [{block}]",
            receipt.transaction_hash
        );
    }
}

/// Raises the fee cap and the tip by [`FEE_BUMP_PERCENT`]. The fee cap is
/// clamped to `max_fee_cap` once; `None` means it already is at the maximum.
fn bump_fees(fee_cap: u128, tip_cap: u128, max_fee_cap: u128) -> Option<(u128, u128)> {
    if fee_cap >= max_fee_cap {
        return None;
    }

    let bumped_fee_cap = fee_cap
        .saturating_add(fee_cap.saturating_mul(FEE_BUMP_PERCENT) / 100)
        .min(max_fee_cap);
    let bumped_tip_cap = tip_cap
        .saturating_add(tip_cap.saturating_mul(FEE_BUMP_PERCENT) / 100)
        .min(bumped_fee_cap);

    Some((bumped_fee_cap, bumped_tip_cap))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use alloy::primitives::{Address, Bytes, B256, U256};
    use rstest::rstest;

    use super::*;
    use crate::test_utils::MockBackend;

    const GWEI: u128 = 1_000_000_000;

    #[rstest]
    #[case::regular_bump(100 * GWEI, 2 * GWEI, Some((120 * GWEI, 2_400_000_000)))]
    #[case::clamped_to_max(450 * GWEI, 2 * GWEI, Some((500 * GWEI, 2_400_000_000)))]
    #[case::at_max(500 * GWEI, 2 * GWEI, None)]
    #[case::tip_not_above_fee_cap(10, 10, Some((12, 12)))]
    fn fee_bumps(
        #[case] fee_cap: u128,
        #[case] tip_cap: u128,
        #[case] expected: Option<(u128, u128)>,
    ) {
        assert_eq!(bump_fees(fee_cap, tip_cap, DEFAULT_MAX_GAS_FEE_CAP), expected);
    }

    fn params() -> TxParams {
        TxParams {
            to: Address::repeat_byte(0xaa),
            input: Bytes::from_static(&[1, 2, 3, 4]),
            value: U256::ZERO,
            nonce: 9,
            gas_limit: 100_000,
            max_fee_per_gas: 400 * GWEI,
            max_priority_fee_per_gas: GWEI,
        }
    }

    fn receipt(hash: TxHash) -> ReceiptSummary {
        ReceiptSummary {
            transaction_hash: hash,
            block_number: Some(10),
            success: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_transaction_is_mined() {
        let mock = Arc::new(MockBackend::new());
        let hash = B256::repeat_byte(1);
        mock.update(|state| {
            state.receipts.insert(hash, receipt(hash));
        });

        let waiter = MiningWaiter::new(mock, Duration::from_secs(1), DEFAULT_MAX_GAS_FEE_CAP);
        let resubmissions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&resubmissions);
        waiter
            .force_mining("Test.method", params(), hash, move |next: TxParams| {
                recorded.lock().unwrap().push(next.clone());
                async move { Ok((next, B256::repeat_byte(2))) }
            })
            .await;

        assert!(resubmissions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resubmits_until_fee_cap_reaches_maximum() {
        let mock = Arc::new(MockBackend::new());
        let waiter = MiningWaiter::new(mock, Duration::from_secs(1), DEFAULT_MAX_GAS_FEE_CAP);

        let resubmissions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&resubmissions);
        waiter
            .force_mining("Test.method", params(), B256::repeat_byte(1), move |next: TxParams| {
                let mut recorded = recorded.lock().unwrap();
                recorded.push(next.clone());
                let hash = B256::repeat_byte(u8::try_from(recorded.len() + 1).unwrap());
                async move { Ok((next, hash)) }
            })
            .await;

        let resubmissions = resubmissions.lock().unwrap();
        // 400 -> 480 -> 500 (clamped), then the cap is reached.
        let fee_caps: Vec<u128> = resubmissions.iter().map(|p| p.max_fee_per_gas).collect();
        assert_eq!(fee_caps, vec![480 * GWEI, 500 * GWEI]);
        assert!(resubmissions.iter().all(|p| p.nonce == 9));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_submission_counts_as_mined() {
        let mock = Arc::new(MockBackend::new());
        let original = B256::repeat_byte(1);
        let replacement = B256::repeat_byte(2);

        let waiter = MiningWaiter::new(
            Arc::clone(&mock) as SharedBackend,
            Duration::from_secs(1),
            DEFAULT_MAX_GAS_FEE_CAP,
        );
        let calls = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&calls);
        let mined = Arc::clone(&mock);
        waiter
            .force_mining("Test.method", params(), original, move |next: TxParams| {
                *counter.lock().unwrap() += 1;
                // The original transaction gets mined right after the replacement went out.
                mined.update(|state| {
                    state.receipts.insert(original, receipt(original));
                });
                async move { Ok((next, replacement)) }
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_resubmission_is_retried_at_the_same_fees() {
        let mock = Arc::new(MockBackend::new());
        let waiter = MiningWaiter::new(mock, Duration::from_secs(1), DEFAULT_MAX_GAS_FEE_CAP);
        let mut start = params();
        start.max_fee_per_gas = 450 * GWEI;

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&attempts);
        waiter
            .force_mining("Test.method", start, B256::repeat_byte(1), move |next: TxParams| {
                let mut recorded = recorded.lock().unwrap();
                recorded.push(next.max_fee_per_gas);
                let result = if recorded.len() == 1 {
                    Err(crate::error::Error::rpc("replacement transaction underpriced"))
                } else {
                    Ok((next, B256::repeat_byte(2)))
                };
                async move { result }
            })
            .await;

        // The clamped fee cap is sent before the waiter gives up.
        assert_eq!(*attempts.lock().unwrap(), vec![500 * GWEI, 500 * GWEI]);
    }
}
