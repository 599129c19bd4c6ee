//! Periodic monitoring of an account balance.

use std::time::Duration;

use alloy::primitives::{utils::format_ether, Address, U256};
use tokio_util::sync::CancellationToken;

use crate::{backend::SharedBackend, error::Error, metrics};

/// Default interval between balance checks.
pub const DEFAULT_BALANCE_CHECK_TICK: Duration = Duration::from_secs(10 * 60);

/// Default time a failing balance check is retried before it is reported.
pub const DEFAULT_BALANCE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Watches account balances and alerts when they drop below a threshold.
#[derive(Clone)]
pub struct BalanceMonitor {
    backend: SharedBackend,
}

impl BalanceMonitor {
    /// Creates a monitor reading balances from `backend`.
    #[must_use]
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Checks the balance of `address` every `tick` until the returned token
    /// is cancelled. Balances below `alert_threshold` are logged as errors.
    pub fn observe(
        &self,
        address: Address,
        alert_threshold: U256,
        tick: Duration,
        retry_timeout: Duration,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let backend = self.backend.clone();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => {
                        tracing::info!(%address, "balance monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                match fetch_balance(&backend, address, retry_timeout).await {
                    Ok(balance) => check_balance(address, balance, alert_threshold),
                    Err(err) => {
                        tracing::error!(%address, "balance monitor error: [{err}]");
                    }
                }
            }
        });

        token
    }
}

async fn fetch_balance(
    backend: &SharedBackend,
    address: Address,
    retry_timeout: Duration,
) -> Result<U256, Error> {
    let policy = backoff::ExponentialBackoff {
        max_elapsed_time: Some(retry_timeout),
        ..Default::default()
    };

    backoff::future::retry(policy, move || async move {
        backend
            .balance(address)
            .await
            .map_err(backoff::Error::transient)
    })
    .await
}

fn check_balance(address: Address, balance: U256, alert_threshold: U256) {
    let ether = format_ether(balance);
    if let Ok(value) = ether.parse::<f64>() {
        metrics::ACCOUNT_BALANCE
            .with_label_values(&[address.to_string().as_str()])
            .set(value);
    }

    if balance < alert_threshold {
        tracing::error!(
            %address,
            balance = %ether,
            threshold = %format_ether(alert_threshold),
            "balance is below the alert threshold"
        );
    } else {
        tracing::debug!(%address, balance = %ether, "balance checked");
    }
}
