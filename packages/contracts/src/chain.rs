//! Connection to the host chain and construction of the contract bindings.

use std::sync::Arc;

use alloy::primitives::Address;
use tbtc_ethutil::{
    backend::connect,
    balance::{BalanceMonitor, DEFAULT_BALANCE_CHECK_TICK, DEFAULT_BALANCE_RETRY_TIMEOUT},
    block_counter::{BlockCounter, DEFAULT_POLL_INTERVAL},
    mining::MiningWaiter,
    BoundContract, EthereumConfig, Result, SharedBackend, Transactor,
};
use tbtc_solidity_types::names;
use tokio_util::sync::CancellationToken;

use crate::{Bridge, LightRelay, LightRelayMaintainerProxy, WalletProposalValidator};

/// A connected host chain: the backend stack, the operator account and the
/// addresses of the deployed contracts.
///
/// Without an account key the chain is read-only and every binding it hands
/// out rejects transactions.
pub struct Chain {
    config: EthereumConfig,
    backend: SharedBackend,
    chain_id: u64,
    transactor: Option<Arc<Transactor>>,
    block_counter: BlockCounter,
    balance_monitoring: Option<CancellationToken>,
}

impl Chain {
    /// Connects to the configured endpoint.
    pub async fn connect(config: EthereumConfig) -> Result<Self> {
        tracing::info!(url = %config.url, "connecting to ethereum chain");
        let backend = connect(&config).await?;
        Self::with_backend(config, backend).await
    }

    /// Builds the chain handle over an already connected backend.
    pub async fn with_backend(config: EthereumConfig, backend: SharedBackend) -> Result<Self> {
        let chain_id = backend.chain_id().await?;
        tracing::info!(chain_id, "connected to ethereum chain");

        let transactor = match config.account.signer()? {
            Some(signer) => {
                let mining_waiter = MiningWaiter::new(
                    Arc::clone(&backend),
                    config.mining.check_interval(),
                    config.mining.max_gas_fee_cap(),
                );
                let transactor = Transactor::new(Arc::clone(&backend), signer, chain_id, mining_waiter);
                tracing::info!(operator = %transactor.address(), "loaded operator account");
                Some(Arc::new(transactor))
            }
            None => {
                tracing::warn!("no account key configured; contracts are bound read-only");
                None
            }
        };

        let block_counter = BlockCounter::new(Arc::clone(&backend), DEFAULT_POLL_INTERVAL).await?;

        let balance_monitoring = match (&transactor, config.balance_alert_threshold()) {
            (Some(transactor), Some(threshold)) => {
                let token = BalanceMonitor::new(Arc::clone(&backend)).observe(
                    transactor.address(),
                    threshold,
                    DEFAULT_BALANCE_CHECK_TICK,
                    DEFAULT_BALANCE_RETRY_TIMEOUT,
                );
                Some(token)
            }
            _ => {
                tracing::info!("balance monitoring disabled");
                None
            }
        };

        Ok(Self {
            config,
            backend,
            chain_id,
            transactor,
            block_counter,
            balance_monitoring,
        })
    }

    /// The chain id reported by the node.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The backend stack all bindings share.
    #[must_use]
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }

    #[must_use]
    pub const fn block_counter(&self) -> &BlockCounter {
        &self.block_counter
    }

    /// The operator account, if a key is configured.
    #[must_use]
    pub fn operator_address(&self) -> Option<Address> {
        self.transactor.as_ref().map(|transactor| transactor.address())
    }

    /// Binds the contract registered under `name` in `contract_addresses`.
    pub fn bound_contract(&self, name: &str) -> Result<BoundContract> {
        let address = self.config.contract_address(name)?;
        let backend = Arc::clone(&self.backend);

        Ok(match &self.transactor {
            Some(transactor) => BoundContract::new(name, address, backend, Arc::clone(transactor)),
            None => BoundContract::read_only(name, address, backend, Address::ZERO),
        })
    }

    pub fn bridge(&self) -> Result<Bridge> {
        self.bound_contract(names::BRIDGE).map(Bridge::new)
    }

    pub fn light_relay(&self) -> Result<LightRelay> {
        self.bound_contract(names::LIGHT_RELAY).map(LightRelay::new)
    }

    pub fn light_relay_maintainer_proxy(&self) -> Result<LightRelayMaintainerProxy> {
        self.bound_contract(names::LIGHT_RELAY_MAINTAINER_PROXY)
            .map(LightRelayMaintainerProxy::new)
    }

    pub fn wallet_proposal_validator(&self) -> Result<WalletProposalValidator> {
        self.bound_contract(names::WALLET_PROPOSAL_VALIDATOR)
            .map(WalletProposalValidator::new)
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        if let Some(token) = self.balance_monitoring.take() {
            token.cancel();
        }
    }
}
