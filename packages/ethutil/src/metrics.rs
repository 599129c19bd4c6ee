//! Prometheus metrics for chain interactions.

#![allow(missing_docs)]

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::LazyLock;

/// Total number of JSON-RPC requests, by method.
pub static RPC_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "tbtc_ethereum_rpc_requests_total",
        "Total number of ethereum client requests",
        &["method"]
    )
    .expect("rpc request counter can be registered")
});

/// Failed JSON-RPC requests, by method.
pub static RPC_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "tbtc_ethereum_rpc_failures_total",
        "Total number of failed ethereum client requests",
        &["method"]
    )
    .expect("rpc failure counter can be registered")
});

/// JSON-RPC response time in seconds, by method.
pub static RPC_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "tbtc_ethereum_rpc_duration_seconds",
        "Ethereum client request duration in seconds",
        &["method"]
    )
    .expect("rpc duration histogram can be registered")
});

/// Submitted transactions, by contract and method.
pub static TRANSACTIONS_SUBMITTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "tbtc_ethereum_transactions_submitted_total",
        "Total number of submitted transactions",
        &["contract", "method"]
    )
    .expect("transaction counter can be registered")
});

/// Transactions resubmitted with bumped fees.
pub static TRANSACTIONS_RESUBMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "tbtc_ethereum_transactions_resubmitted_total",
        "Total number of transactions resubmitted with a higher fee"
    )
    .expect("resubmission counter can be registered")
});

/// Delivered contract events, by event name.
pub static EVENTS_DELIVERED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "tbtc_ethereum_events_delivered_total",
        "Total number of contract events delivered to subscribers",
        &["event"]
    )
    .expect("event counter can be registered")
});

/// Failed event subscriptions, by event name.
pub static SUBSCRIPTION_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "tbtc_ethereum_subscription_failures_total",
        "Total number of event subscription failures",
        &["event"]
    )
    .expect("subscription failure counter can be registered")
});

/// Account balance in ether, by account address.
pub static ACCOUNT_BALANCE: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec!(
        "tbtc_ethereum_account_balance_ether",
        "Balance of the operator account in ether",
        &["address"]
    )
    .expect("balance gauge can be registered")
});
