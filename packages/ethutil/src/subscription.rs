//! Contract event subscriptions.
//!
//! A subscription runs two loops feeding the same receiver: a watch loop
//! streaming new logs through a log filter, resubscribing with backoff when
//! the stream fails, and a polling loop periodically fetching the events of
//! the last few blocks, which covers events the watch loop missed while it
//! was down. Events may therefore be delivered more than once.

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{BlockNumber, TxHash},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use backoff::{backoff::Backoff, ExponentialBackoff};
use futures::StreamExt;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::SharedBackend,
    error::{Error, Result},
    metrics,
};

/// Default interval of the polling loop.
pub const DEFAULT_SUBSCRIPTION_TICK: Duration = Duration::from_secs(15 * 60);

/// Default number of past blocks fetched by the polling loop.
pub const DEFAULT_PAST_BLOCKS: u64 = 100;

/// Resubscriptions closer to each other than this are reported as a
/// connectivity problem.
pub const RESUBSCRIPTION_ALERT_THRESHOLD: Duration = Duration::from_secs(15 * 60);

const RESUBSCRIPTION_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const RESUBSCRIPTION_MAX_BACKOFF: Duration = Duration::from_secs(2 * 60);

const DELIVERY_BUFFER: usize = 128;

/// Options of an event subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeOpts {
    /// Interval of the polling loop.
    pub tick: Duration,
    /// How many blocks back the polling loop looks.
    pub past_blocks: u64,
}

impl Default for SubscribeOpts {
    fn default() -> Self {
        Self {
            tick: DEFAULT_SUBSCRIPTION_TICK,
            past_blocks: DEFAULT_PAST_BLOCKS,
        }
    }
}

impl SubscribeOpts {
    /// Replaces zero values with the defaults.
    #[must_use]
    pub fn or_defaults(self) -> Self {
        Self {
            tick: if self.tick.is_zero() {
                DEFAULT_SUBSCRIPTION_TICK
            } else {
                self.tick
            },
            past_blocks: if self.past_blocks == 0 {
                DEFAULT_PAST_BLOCKS
            } else {
                self.past_blocks
            },
        }
    }
}

/// A decoded contract event with the metadata of its log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractEvent<E> {
    pub event: E,
    pub block_number: BlockNumber,
    pub transaction_hash: TxHash,
    pub log_index: u64,
}

impl<E: SolEvent> ContractEvent<E> {
    /// Decodes the event carried by the log.
    pub fn from_log(log: &Log) -> Result<Self> {
        Ok(Self {
            event: E::decode_log_data(log.data())?,
            block_number: log.block_number.unwrap_or_default(),
            transaction_hash: log.transaction_hash.unwrap_or_default(),
            log_index: log.log_index.unwrap_or_default(),
        })
    }
}

/// Name of the event, without parameter types.
pub fn event_name<E: SolEvent>() -> &'static str {
    E::SIGNATURE.split('(').next().unwrap_or(E::SIGNATURE)
}

/// Fetches and decodes the events matching the filter between `start` and
/// `end`, both inclusive.
pub(crate) async fn fetch_events<E: SolEvent>(
    backend: &SharedBackend,
    filter: &Filter,
    start: BlockNumber,
    end: Option<BlockNumber>,
) -> Result<Vec<ContractEvent<E>>> {
    let mut filter = filter.clone().from_block(start);
    if let Some(end) = end {
        filter = filter.to_block(end);
    }

    backend
        .logs(filter)
        .await?
        .iter()
        .map(ContractEvent::from_log)
        .collect()
}

/// Keeps a subscription alive. Dropping the handle cancels it.
#[derive(Debug)]
#[must_use = "dropping the handle cancels the subscription"]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Stops delivering events.
    pub fn unsubscribe(self) {}

    /// Whether the subscription is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Decodes a delivered log.
pub type LogDecoder<T> = fn(&Log) -> Result<T>;

/// A not yet started event subscription delivering `T`, usually a
/// [`ContractEvent`].
pub struct EventSubscription<T> {
    backend: SharedBackend,
    filter: Filter,
    opts: SubscribeOpts,
    name: String,
    decode: LogDecoder<T>,
}

impl<T: Send + 'static> EventSubscription<T> {
    pub(crate) fn new(
        backend: SharedBackend,
        filter: Filter,
        opts: SubscribeOpts,
        name: impl Into<String>,
        decode: LogDecoder<T>,
    ) -> Self {
        Self {
            backend,
            filter,
            opts: opts.or_defaults(),
            name: name.into(),
            decode,
        }
    }

    /// Calls `handler` for every delivered event.
    pub fn on_event<F>(self, handler: F) -> SubscriptionHandle
    where
        F: Fn(T) + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel(DELIVERY_BUFFER);
        let handle = self.pipe(sender);
        let token = handle.token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    event = receiver.recv() => match event {
                        Some(event) => handler(event),
                        None => return,
                    },
                }
            }
        });

        handle
    }

    /// Sends every delivered event to `sender`. The subscription ends when the
    /// receiver is dropped.
    pub fn pipe(self, sender: mpsc::Sender<T>) -> SubscriptionHandle {
        let token = CancellationToken::new();
        let source = Arc::new(Source {
            backend: self.backend,
            filter: self.filter,
            name: self.name,
            decode: self.decode,
        });

        tokio::spawn(watch_events(Arc::clone(&source), sender.clone(), token.clone()));
        tokio::spawn(poll_events(source, self.opts, sender, token.clone()));

        SubscriptionHandle { token }
    }
}

struct Source<T> {
    backend: SharedBackend,
    filter: Filter,
    name: String,
    decode: LogDecoder<T>,
}

impl<T> Source<T> {
    async fn deliver(&self, sender: &mpsc::Sender<T>, log: &Log) -> bool {
        let event = match (self.decode)(log) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("could not decode {} log: [{err}]", self.name);
                return true;
            }
        };
        if sender.send(event).await.is_err() {
            return false;
        }
        metrics::EVENTS_DELIVERED
            .with_label_values(&[self.name.as_str()])
            .inc();
        true
    }
}

async fn poll_events<T: Send + 'static>(
    source: Arc<Source<T>>,
    opts: SubscribeOpts,
    sender: mpsc::Sender<T>,
    token: CancellationToken,
) {
    let name = &source.name;
    let mut ticker = tokio::time::interval_at(Instant::now() + opts.tick, opts.tick);

    loop {
        tokio::select! {
            () = token.cancelled() => return,
            () = sender.closed() => return,
            _ = ticker.tick() => {}
        }

        let current_block = match source.backend.block_number().await {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!("subscription monitoring failed to get the current block: [{err}]");
                continue;
            }
        };
        let from_block = current_block.saturating_sub(opts.past_blocks);

        tracing::info!(
            "subscription monitoring fetching past {name} events starting from block [{from_block}]"
        );

        let filter = source
            .filter
            .clone()
            .from_block(from_block)
            .to_block(current_block);
        let logs = match source.backend.logs(filter).await {
            Ok(logs) => logs,
            Err(err) => {
                tracing::warn!("subscription monitoring failed to pull {name} events: [{err}]");
                continue;
            }
        };

        tracing::info!(
            "subscription monitoring fetched [{}] past {name} events",
            logs.len()
        );

        for log in &logs {
            if !source.deliver(&sender, log).await {
                return;
            }
        }
    }
}

async fn watch_events<T: Send + 'static>(
    source: Arc<Source<T>>,
    sender: mpsc::Sender<T>,
    token: CancellationToken,
) {
    let name = &source.name;
    let mut backoff = ExponentialBackoff {
        initial_interval: RESUBSCRIPTION_INITIAL_BACKOFF,
        max_interval: RESUBSCRIPTION_MAX_BACKOFF,
        max_elapsed_time: None,
        ..Default::default()
    };
    let mut last_attempt: Option<Instant> = None;

    loop {
        let attempt = Instant::now();
        if let Some(last_attempt) = last_attempt {
            let elapsed = attempt - last_attempt;
            if elapsed < RESUBSCRIPTION_ALERT_THRESHOLD {
                tracing::error!(
                    "subscription to event {name} had to be retried [{elapsed:?}] since the last attempt; please inspect host chain connectivity"
                );
            } else {
                backoff.reset();
            }
        }
        last_attempt = Some(attempt);

        let result = tokio::select! {
            () = token.cancelled() => return,
            () = sender.closed() => return,
            result = stream_events(&source, &sender) => result,
        };

        match result {
            Ok(()) => return,
            Err(err) => {
                metrics::SUBSCRIPTION_FAILURES
                    .with_label_values(&[name.as_str()])
                    .inc();
                tracing::error!(
                    "subscription to event {name} failed with error: [{err}]; resubscription attempt will be performed"
                );
            }
        }

        let delay = backoff.next_backoff().unwrap_or(RESUBSCRIPTION_MAX_BACKOFF);
        tokio::select! {
            () = token.cancelled() => return,
            () = sender.closed() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Streams events until the stream fails. Returns `Ok` once the receiver is
/// gone.
async fn stream_events<T>(source: &Source<T>, sender: &mpsc::Sender<T>) -> Result<()> {
    let mut stream = source.backend.watch_logs(source.filter.clone()).await?;

    while let Some(logs) = stream.next().await {
        for log in &logs {
            if !source.deliver(sender, log).await {
                return Ok(());
            }
        }
    }

    Err(Error::Closed("log stream"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy::{primitives::Address, sol};

    use super::*;
    use crate::test_utils::{log_for, MockBackend};

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event Ping(uint256 indexed id, bytes20 walletPubKeyHash);
    }

    const CONTRACT: Address = Address::repeat_byte(0xee);

    fn ping(id: u64) -> Ping {
        Ping {
            id: alloy::primitives::U256::from(id),
            walletPubKeyHash: alloy::primitives::FixedBytes::repeat_byte(0x11),
        }
    }

    fn subscription(
        mock: &Arc<MockBackend>,
        opts: SubscribeOpts,
    ) -> EventSubscription<ContractEvent<Ping>> {
        let filter = Filter::new()
            .address(CONTRACT)
            .event_signature(Ping::SIGNATURE_HASH);
        EventSubscription::new(mock.clone(), filter, opts, "Ping", ContractEvent::from_log)
    }

    fn opts() -> SubscribeOpts {
        SubscribeOpts {
            tick: Duration::from_secs(60),
            past_blocks: 100,
        }
    }

    #[test]
    fn event_name_strips_parameters() {
        assert_eq!(event_name::<Ping>(), "Ping");
    }

    #[tokio::test(start_paused = true)]
    async fn polling_loop_delivers_recent_events() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.block_number = 150;
            state.logs = vec![
                log_for(CONTRACT, &ping(1), 40, 0),
                log_for(CONTRACT, &ping(2), 120, 0),
            ];
        });

        let (sender, mut receiver) = mpsc::channel(8);
        let _handle = subscription(&mock, opts()).pipe(sender);

        // Nothing is polled before the first tick.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(mock.state().log_queries.is_empty());

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event, ping(2));
        assert_eq!(event.block_number, 120);

        let state = mock.state();
        assert_eq!(state.log_queries[0].get_from_block(), Some(50));
        assert_eq!(state.log_queries[0].get_to_block(), Some(150));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_window_starts_at_genesis_on_young_chains() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.block_number = 20);

        let (sender, _receiver) = mpsc::channel(8);
        let _handle = subscription(&mock, opts()).pipe(sender);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(mock.state().log_queries[0].get_from_block(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_loop_delivers_and_resubscribes() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state
                .watch_streams
                .push_back(Ok(vec![vec![log_for(CONTRACT, &ping(7), 5, 1)]]));
            state.watch_streams.push_back(Err("filter not found".to_string()));
        });

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&delivered);
        let _handle = subscription(&mock, opts()).on_event(move |event| {
            recorded.lock().unwrap().push(event.event);
        });

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*delivered.lock().unwrap(), vec![ping(7)]);
        // The first stream ended, the second watch failed to install, the
        // third one is still running.
        assert_eq!(mock.state().watch_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_stops_delivery() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.block_number = 10);

        let (sender, mut receiver) = mpsc::channel(8);
        let handle = subscription(&mock, opts()).pipe(sender);
        assert!(handle.is_active());
        handle.unsubscribe();

        assert!(receiver.recv().await.is_none());
        assert!(mock.state().log_queries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_options_fall_back_to_defaults() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| state.block_number = 500);
        let zero = SubscribeOpts {
            tick: Duration::ZERO,
            past_blocks: 0,
        };
        assert_eq!(zero.or_defaults(), SubscribeOpts::default());

        let (sender, _receiver) = mpsc::channel(8);
        let handle = subscription(&mock, zero).pipe(sender);

        tokio::time::sleep(DEFAULT_SUBSCRIPTION_TICK - Duration::from_secs(1)).await;
        assert!(mock.state().log_queries.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_active());
        let state = mock.state();
        assert_eq!(state.log_queries.len(), 1);
        assert_eq!(state.log_queries[0].get_from_block(), Some(500 - DEFAULT_PAST_BLOCKS));
    }

    #[tokio::test(start_paused = true)]
    async fn pipe_ends_when_the_receiver_is_dropped() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.block_number = 150;
            state
                .watch_streams
                .push_back(Ok(vec![vec![log_for(CONTRACT, &ping(7), 5, 1)]]));
        });

        let (sender, mut receiver) = mpsc::channel(8);
        let _handle = subscription(&mock, opts()).pipe(sender);
        assert_eq!(receiver.recv().await.unwrap().event, ping(7));
        drop(receiver);

        // The first stream has ended; neither loop goes on without a receiver.
        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        let state = mock.state();
        assert_eq!(state.watch_calls, 1);
        assert!(state.log_queries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handler_is_not_called_after_unsubscribe() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.block_number = 150;
            state.logs = vec![log_for(CONTRACT, &ping(2), 120, 0)];
            state
                .watch_streams
                .push_back(Ok(vec![vec![log_for(CONTRACT, &ping(7), 5, 1)]]));
        });

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&delivered);
        let handle = subscription(&mock, opts()).on_event(move |event| {
            recorded.lock().unwrap().push(event.event);
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*delivered.lock().unwrap(), vec![ping(7)]);

        handle.unsubscribe();
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;

        assert_eq!(*delivered.lock().unwrap(), vec![ping(7)]);
        assert!(mock.state().log_queries.is_empty());
    }

    /// Records the level and message of every event.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(tracing::Level, String)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Recorder {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Message(String);
            impl tracing::field::Visit for Message {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.0 = format!("{value:?}");
                    }
                }
            }

            let mut message = Message(String::new());
            event.record(&mut message);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), message.0));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_subscriptions_are_reported_as_errors() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = Recorder::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(recorder.clone()),
        );

        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.watch_streams.push_back(Err("filter not found".to_string()));
            state.watch_streams.push_back(Err("filter not found".to_string()));
        });
        let (sender, _receiver) = mpsc::channel(8);
        let _handle = subscription(&mock, opts()).pipe(sender);

        tokio::time::sleep(Duration::from_secs(10)).await;

        let records = recorder.0.lock().unwrap();
        let errors = |needle: &str| {
            records
                .iter()
                .filter(|(level, message)| {
                    *level == tracing::Level::ERROR && message.contains(needle)
                })
                .count()
        };
        assert_eq!(errors("subscription to event Ping failed with error"), 2);
        assert!(errors("subscription to event Ping had to be retried") >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_logs_are_skipped() {
        let mock = Arc::new(MockBackend::new());
        let mut broken = log_for(CONTRACT, &ping(1), 5, 0);
        broken.inner.data = alloy::primitives::LogData::new_unchecked(
            vec![Ping::SIGNATURE_HASH],
            alloy::primitives::Bytes::new(),
        );
        let valid = log_for(CONTRACT, &ping(2), 5, 1);
        mock.update(|state| {
            state.watch_streams.push_back(Ok(vec![vec![broken, valid]]));
        });

        let (sender, mut receiver) = mpsc::channel(8);
        let _handle = subscription(&mock, opts()).pipe(sender);

        assert_eq!(receiver.recv().await.unwrap().event, ping(2));
    }
}
