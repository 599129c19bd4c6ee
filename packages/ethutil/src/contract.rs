//! A contract bound to an address, with generic call, transaction and event
//! operations over `sol!` generated types.

use std::sync::Arc;

use alloy::{
    eips::BlockId,
    primitives::{Address, BlockNumber, Bytes, B256, U256},
    rpc::types::{Filter, Log},
    sol_types::{EventTopic, SolCall, SolEvent},
};

use crate::{
    backend::SharedBackend,
    error::{Error, Result},
    error_resolver::ErrorResolver,
    subscription::{event_name, fetch_events, ContractEvent, EventSubscription, SubscribeOpts},
    transactor::{call_request, SubmittedTransaction, TransactionOptions, Transactor},
};

/// Values accepted for the indexed parameters of an event, by position of
/// the parameter among the indexed ones. An empty position matches any value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicFilter {
    topics: [Vec<B256>; 3],
    next: usize,
}

impl TopicFilter {
    /// A filter matching every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the indexed parameter at `position` to `values`, encoded as
    /// the Solidity type `T`.
    ///
    /// # Panics
    /// If `position` is not 0, 1 or 2; events have at most three indexed
    /// parameters.
    #[must_use]
    pub fn with<T: EventTopic>(mut self, position: usize, values: &[T::RustType]) -> Self {
        self.topics[position] = values.iter().map(|value| T::encode_topic(value).0).collect();
        self.next = position + 1;
        self
    }

    /// Restricts the indexed parameter following the last restricted one.
    ///
    /// # Panics
    /// If three positions are already restricted.
    #[must_use]
    pub fn push<T: EventTopic>(self, values: &[T::RustType]) -> Self {
        let position = self.next;
        self.with::<T>(position, values)
    }

    fn apply(&self, filter: Filter) -> Filter {
        let [topic1, topic2, topic3] = self.topics.clone();
        filter.topic1(topic1).topic2(topic2).topic3(topic3)
    }
}

/// A contract deployed at an address.
///
/// Contracts bound without a [`Transactor`] are read-only: calls, gas
/// estimates and events work, transactions fail with [`Error::ReadOnly`].
#[derive(Clone)]
pub struct BoundContract {
    name: String,
    address: Address,
    backend: SharedBackend,
    from: Address,
    transactor: Option<Arc<Transactor>>,
    error_resolver: ErrorResolver,
}

impl BoundContract {
    /// Binds the contract for transacting through `transactor`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: Address,
        backend: SharedBackend,
        transactor: Arc<Transactor>,
    ) -> Self {
        let from = transactor.address();
        Self {
            error_resolver: ErrorResolver::new(Arc::clone(&backend), address),
            name: name.into(),
            address,
            backend,
            from,
            transactor: Some(transactor),
        }
    }

    /// Binds the contract read-only. Calls are made from `from`.
    #[must_use]
    pub fn read_only(
        name: impl Into<String>,
        address: Address,
        backend: SharedBackend,
        from: Address,
    ) -> Self {
        Self {
            error_resolver: ErrorResolver::new(Arc::clone(&backend), address),
            name: name.into(),
            address,
            backend,
            from,
            transactor: None,
        }
    }

    /// The contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The account calls and transactions are made from.
    #[must_use]
    pub const fn from(&self) -> Address {
        self.from
    }

    /// Submits `call` as a transaction.
    pub async fn transact<C: SolCall>(
        &self,
        call: &C,
        options: &TransactionOptions,
    ) -> Result<SubmittedTransaction> {
        self.transact_raw(method_name::<C>(), call.abi_encode().into(), options)
            .await
    }

    /// Submits a transaction with raw calldata; `method` labels it in logs.
    pub async fn transact_raw(
        &self,
        method: &str,
        input: Bytes,
        options: &TransactionOptions,
    ) -> Result<SubmittedTransaction> {
        let transactor = self
            .transactor
            .as_ref()
            .ok_or_else(|| Error::ReadOnly(self.name.clone()))?;

        let label = format!("{}.{method}", self.name);
        match transactor
            .submit(&label, self.address, input.clone(), options)
            .await
        {
            Ok(submitted) => Ok(submitted),
            Err(err) => Err(self.resolve(err, options.value, input).await),
        }
    }

    /// Executes `call` at `block` without creating a transaction and decodes
    /// the returned values.
    pub async fn call<C: SolCall>(&self, call: &C, value: U256, block: BlockId) -> Result<C::Return> {
        let output = self.call_raw(call.abi_encode().into(), value, block).await?;
        Ok(C::abi_decode_returns(&output)?)
    }

    /// Executes raw calldata at `block` and returns the raw output.
    pub async fn call_raw(&self, input: Bytes, value: U256, block: BlockId) -> Result<Bytes> {
        let request = call_request(self.from, self.address, value, input.clone());
        match self.backend.call(request, block).await {
            Ok(output) => Ok(output),
            Err(err) => Err(self.resolve(err, Some(value), input).await),
        }
    }

    /// Estimates the gas `call` would use as a transaction.
    pub async fn estimate_gas<C: SolCall>(&self, call: &C, value: U256) -> Result<u64> {
        self.estimate_gas_raw(call.abi_encode().into(), value).await
    }

    /// Estimates the gas of raw calldata.
    pub async fn estimate_gas_raw(&self, input: Bytes, value: U256) -> Result<u64> {
        let request = call_request(self.from, self.address, value, input.clone());
        match self.backend.estimate_gas(request).await {
            Ok(gas) => Ok(gas),
            Err(err) => Err(self.resolve(err, Some(value), input).await),
        }
    }

    /// Prepares a subscription to event `E` emitted by this contract.
    #[must_use]
    pub fn event<E>(
        &self,
        opts: SubscribeOpts,
        topics: &TopicFilter,
    ) -> EventSubscription<ContractEvent<E>>
    where
        E: SolEvent + Send + 'static,
    {
        EventSubscription::new(
            Arc::clone(&self.backend),
            self.event_filter::<E>(topics),
            opts,
            event_name::<E>(),
            ContractEvent::from_log,
        )
    }

    /// Prepares a subscription to every log emitted by this contract, left
    /// for the caller to decode.
    #[must_use]
    pub fn logs(&self, opts: SubscribeOpts) -> EventSubscription<Log> {
        EventSubscription::new(
            Arc::clone(&self.backend),
            Filter::new().address(self.address),
            opts,
            self.name.clone(),
            |log| Ok(log.clone()),
        )
    }

    /// Fetches the `E` events emitted between `start` and `end` inclusive.
    /// Without `end` the range reaches the latest block.
    pub async fn past_events<E: SolEvent>(
        &self,
        start: BlockNumber,
        end: Option<BlockNumber>,
        topics: &TopicFilter,
    ) -> Result<Vec<ContractEvent<E>>> {
        fetch_events(&self.backend, &self.event_filter::<E>(topics), start, end).await
    }

    /// The log filter matching event `E` of this contract.
    #[must_use]
    pub fn event_filter<E: SolEvent>(&self, topics: &TopicFilter) -> Filter {
        topics.apply(
            Filter::new()
                .address(self.address)
                .event_signature(E::SIGNATURE_HASH),
        )
    }

    async fn resolve(&self, err: Error, value: Option<U256>, input: Bytes) -> Error {
        self.error_resolver
            .resolve(err, self.from, value.unwrap_or_default(), input)
            .await
    }
}

/// Name of the called method, without parameter types.
fn method_name<C: SolCall>() -> &'static str {
    C::SIGNATURE.split('(').next().unwrap_or(C::SIGNATURE)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::{
        consensus::Transaction as _,
        rpc::types::TransactionRequest,
        signers::local::PrivateKeySigner,
        sol,
        sol_types::{sol_data, Revert, SolError, SolValue},
    };

    use super::*;
    use crate::{
        mining::{MiningWaiter, DEFAULT_MAX_GAS_FEE_CAP},
        test_utils::{log_for, MockBackend},
    };

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        function depositParameters() external view returns (uint64 dustThreshold, uint64 treasuryFee);
        function requestRedemption(bytes20 walletPubKeyHash, uint64 amount) external;
        #[derive(Debug, PartialEq, Eq)]
        event RedemptionRequested(bytes20 indexed walletPubKeyHash, address indexed redeemer, uint64 amount);
    }

    const CONTRACT: Address = Address::repeat_byte(0xb1);

    fn bound(mock: &Arc<MockBackend>) -> BoundContract {
        let waiter = MiningWaiter::new(mock.clone(), Duration::from_secs(60), DEFAULT_MAX_GAS_FEE_CAP);
        let transactor = Arc::new(Transactor::new(
            mock.clone(),
            PrivateKeySigner::random(),
            31337,
            waiter,
        ));
        BoundContract::new("Bridge", CONTRACT, mock.clone(), transactor)
    }

    #[tokio::test]
    async fn call_decodes_returns() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.call_handler = Some(Arc::new(|_: &TransactionRequest, _: BlockId| -> Result<Bytes> {
                Ok((1000_u64, 5_u64).abi_encode_params().into())
            }));
        });
        let contract = bound(&mock);

        let params = contract
            .call(&depositParametersCall {}, U256::ZERO, BlockId::number(42))
            .await
            .unwrap();

        assert_eq!(params.dustThreshold, 1000);
        assert_eq!(params.treasuryFee, 5);
        let state = mock.state();
        assert_eq!(state.calls[0].1, BlockId::number(42));
        assert_eq!(state.calls[0].0.from, Some(contract.from()));
    }

    #[tokio::test(start_paused = true)]
    async fn transact_sends_encoded_call() {
        let mock = Arc::new(MockBackend::new());
        let contract = bound(&mock);
        let call = requestRedemptionCall {
            walletPubKeyHash: [0x22; 20].into(),
            amount: 10_000,
        };

        let submitted = contract
            .transact(&call, &TransactionOptions::default())
            .await
            .unwrap();
        submitted.mining.abort();

        let sent = mock.sent_transactions();
        assert_eq!(sent[0].to(), Some(CONTRACT));
        assert_eq!(sent[0].input(), &Bytes::from(call.abi_encode()));
    }

    #[tokio::test]
    async fn failed_transaction_is_resolved() {
        let mock = Arc::new(MockBackend::new());
        let revert = Revert {
            reason: "Wallet must be in Live state".to_string(),
        };
        mock.update(|state| {
            state.estimate_error = Some((
                "execution reverted".to_string(),
                Some(revert.abi_encode().into()),
            ));
        });
        let contract = bound(&mock);

        let err = contract
            .transact(
                &requestRedemptionCall {
                    walletPubKeyHash: [0x22; 20].into(),
                    amount: 1,
                },
                &TransactionOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("contract failed with: [Wallet must be in Live state]"));
        assert!(mock.state().sent.is_empty());
    }

    #[tokio::test]
    async fn read_only_binding_rejects_transactions() {
        let mock = Arc::new(MockBackend::new());
        let contract = BoundContract::read_only("Bridge", CONTRACT, mock.clone(), Address::ZERO);

        let err = contract
            .transact_raw("requestRedemption", Bytes::new(), &TransactionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnly(name) if name == "Bridge"));

        mock.update(|state| state.gas_estimate = 77_000);
        assert_eq!(
            contract.estimate_gas_raw(Bytes::new(), U256::ZERO).await.unwrap(),
            77_000
        );
    }

    #[tokio::test]
    async fn past_events_apply_topic_filter() {
        let mock = Arc::new(MockBackend::new());
        let wallet = [0x22; 20].into();
        let other_wallet = [0x33; 20].into();
        let redeemer = Address::repeat_byte(0x44);
        let event = |wallet_pub_key_hash| RedemptionRequested {
            walletPubKeyHash: wallet_pub_key_hash,
            redeemer,
            amount: 5,
        };
        mock.update(|state| {
            state.block_number = 30;
            state.logs = vec![
                log_for(CONTRACT, &event(wallet), 10, 0),
                log_for(CONTRACT, &event(other_wallet), 11, 0),
                log_for(Address::ZERO, &event(wallet), 12, 0),
            ];
        });
        let contract = bound(&mock);

        let topics = TopicFilter::new()
            .push::<sol_data::FixedBytes<20>>(&[wallet])
            .push::<sol_data::Address>(&[]);
        let events = contract
            .past_events::<RedemptionRequested>(0, None, &topics)
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, event(wallet));
        assert_eq!(events[0].block_number, 10);
        assert_eq!(mock.state().log_queries[0].get_to_block(), None);
    }

    #[test]
    fn method_name_strips_parameters() {
        assert_eq!(method_name::<requestRedemptionCall>(), "requestRedemption");
        assert_eq!(method_name::<depositParametersCall>(), "depositParameters");
    }
}
