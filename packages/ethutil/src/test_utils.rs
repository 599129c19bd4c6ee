//! In-memory chain used by the unit tests of this and dependent crates.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use alloy::{
    consensus::TxEnvelope,
    eips::{eip1559::Eip1559Estimation, eip2718::Decodable2718, BlockId},
    primitives::{keccak256, Address, BlockNumber, Bytes, TxHash, B256, U256},
    rpc::types::{Filter, Log, TransactionRequest},
    sol_types::SolEvent,
};
use futures::{stream::BoxStream, StreamExt};

use crate::{
    backend::{ChainBackend, ReceiptSummary},
    error::{Error, Result},
};

/// Answers `eth_call` requests.
pub type CallHandler = Arc<dyn Fn(&TransactionRequest, BlockId) -> Result<Bytes> + Send + Sync>;

/// Mutable state of the [`MockBackend`]. Tests set up responses and inspect
/// recorded requests through it.
pub struct MockState {
    pub chain_id: u64,
    pub block_number: BlockNumber,
    pub fail_block_number: bool,
    pub pending_nonce: u64,
    pub balance: U256,
    /// Number of upcoming balance requests that fail.
    pub balance_failures: usize,
    pub balance_requests: usize,
    pub gas_estimate: u64,
    pub estimate_error: Option<(String, Option<Bytes>)>,
    pub estimate_requests: Vec<TransactionRequest>,
    pub fee_estimate: Eip1559Estimation,
    pub fee_estimates: usize,
    pub call_delay: Duration,
    pub call_handler: Option<CallHandler>,
    pub calls: Vec<(TransactionRequest, BlockId)>,
    pub sent: Vec<Bytes>,
    pub send_error: Option<String>,
    pub receipts: HashMap<TxHash, ReceiptSummary>,
    pub logs: Vec<Log>,
    pub log_queries: Vec<Filter>,
    /// Responses for consecutive `watch_logs` calls: the batches a stream
    /// yields before it ends, or an error installing the filter. Once
    /// exhausted, watches return a stream that never yields.
    pub watch_streams: VecDeque<std::result::Result<Vec<Vec<Log>>, String>>,
    pub watch_calls: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            block_number: 0,
            fail_block_number: false,
            pending_nonce: 0,
            balance: U256::ZERO,
            balance_failures: 0,
            balance_requests: 0,
            gas_estimate: 21_000,
            estimate_error: None,
            estimate_requests: Vec::new(),
            fee_estimate: Eip1559Estimation {
                max_fee_per_gas: 20_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
            },
            fee_estimates: 0,
            call_delay: Duration::ZERO,
            call_handler: None,
            calls: Vec::new(),
            sent: Vec::new(),
            send_error: None,
            receipts: HashMap::new(),
            logs: Vec::new(),
            log_queries: Vec::new(),
            watch_streams: VecDeque::new(),
            watch_calls: 0,
        }
    }
}

/// A [`ChainBackend`] answering from [`MockState`].
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBackend {
    /// Creates a backend with default state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state for inspection.
    ///
    /// # Panics
    /// If the state lock is poisoned.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }

    /// Modifies the state.
    pub fn update<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state())
    }

    /// Delays every request by `delay`.
    pub fn set_call_delay(&self, delay: Duration) {
        self.update(|state| state.call_delay = delay);
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Decodes every transaction sent so far.
    ///
    /// # Panics
    /// If a sent transaction is not a valid EIP-2718 envelope.
    pub fn sent_transactions(&self) -> Vec<TxEnvelope> {
        self.state()
            .sent
            .iter()
            .map(|raw| TxEnvelope::decode_2718(&mut raw.as_ref()).expect("valid transaction"))
            .collect()
    }

    async fn request<T>(&self, f: impl FnOnce(&mut MockState) -> Result<T>) -> Result<T> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.state().call_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = f(&mut self.state());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait::async_trait]
impl ChainBackend for MockBackend {
    async fn chain_id(&self) -> Result<u64> {
        self.request(|state| Ok(state.chain_id)).await
    }

    async fn block_number(&self) -> Result<BlockNumber> {
        self.request(|state| {
            if state.fail_block_number {
                return Err(Error::rpc("block number unavailable"));
            }
            Ok(state.block_number)
        })
        .await
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64> {
        self.request(|state| Ok(state.pending_nonce)).await
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        self.request(|state| {
            state.balance_requests += 1;
            if state.balance_failures > 0 {
                state.balance_failures -= 1;
                return Err(Error::rpc("balance unavailable"));
            }
            Ok(state.balance)
        })
        .await
    }

    async fn call(&self, request: TransactionRequest, block: BlockId) -> Result<Bytes> {
        let handler = self.request(|state| {
            state.calls.push((request.clone(), block));
            Ok(state.call_handler.clone())
        });
        match handler.await? {
            Some(handler) => handler(&request, block),
            None => Ok(Bytes::new()),
        }
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        self.request(|state| {
            state.estimate_requests.push(request);
            match &state.estimate_error {
                Some((message, revert_data)) => Err(Error::Rpc {
                    message: message.clone(),
                    revert_data: revert_data.clone(),
                }),
                None => Ok(state.gas_estimate),
            }
        })
        .await
    }

    async fn fee_estimate(&self) -> Result<Eip1559Estimation> {
        self.request(|state| {
            state.fee_estimates += 1;
            Ok(state.fee_estimate)
        })
        .await
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> Result<TxHash> {
        self.request(|state| {
            if let Some(message) = &state.send_error {
                return Err(Error::rpc(message.clone()));
            }
            let hash = keccak256(&encoded);
            state.sent.push(encoded);
            Ok(hash)
        })
        .await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        self.request(|state| Ok(state.receipts.get(&hash).copied()))
            .await
    }

    async fn logs(&self, filter: Filter) -> Result<Vec<Log>> {
        self.request(|state| {
            let from = filter.get_from_block().unwrap_or(0);
            let to = filter.get_to_block().unwrap_or(state.block_number);
            let logs = state
                .logs
                .iter()
                .filter(|log| {
                    log.block_number
                        .is_some_and(|block| (from..=to).contains(&block))
                        && matches_filter(&filter, log)
                })
                .cloned()
                .collect();
            state.log_queries.push(filter);
            Ok(logs)
        })
        .await
    }

    async fn watch_logs(&self, _filter: Filter) -> Result<BoxStream<'static, Vec<Log>>> {
        self.request(|state| {
            state.watch_calls += 1;
            match state.watch_streams.pop_front() {
                Some(Ok(batches)) => Ok(futures::stream::iter(batches).boxed()),
                Some(Err(message)) => Err(Error::rpc(message)),
                None => Ok(futures::stream::pending().boxed()),
            }
        })
        .await
    }
}

fn matches_filter(filter: &Filter, log: &Log) -> bool {
    if !filter.address.matches(&log.address()) {
        return false;
    }
    filter
        .topics
        .iter()
        .enumerate()
        .all(|(index, topic)| match log.topics().get(index) {
            Some(value) => topic.matches(value),
            None => topic.is_empty(),
        })
}

/// Builds an RPC log carrying the event, as emitted by the contract at
/// `address` in block `block`.
pub fn log_for<E: SolEvent>(address: Address, event: &E, block: BlockNumber, index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address,
            data: event.encode_log_data(),
        },
        block_hash: Some(B256::with_last_byte(1)),
        block_number: Some(block),
        block_timestamp: None,
        transaction_hash: Some(keccak256(block.to_be_bytes())),
        transaction_index: Some(0),
        log_index: Some(index),
        removed: false,
    }
}
