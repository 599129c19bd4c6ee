//! Generators of typed contract methods over the `sol!` call and event types.
//!
//! Each macro expands to methods of a wrapper holding a `contract:
//! BoundContract` field, and expects the `sol!` contract module to be in scope
//! as `abi`.

use alloy::sol_types::{SolCall, SolType};

/// Rust value of an indexed event parameter of Solidity type `T`.
pub type Indexed<T> = <T as SolType>::RustType;

/// Decoded return values of call `C`.
pub type Returns<C> = <C as SolCall>::Return;

/// Non-payable state changing methods. Every entry generates the transaction
/// submission, a call simulating it at a block, and a gas estimate.
macro_rules! transactions {
    ($(
        fn $name:ident, $call_name:ident, $estimate_name:ident = $call:ident(
            $($arg:ident => $field:tt: $ty:ty),* $(,)?
        );
    )*) => {
        $(
            #[doc = concat!("Submits a `", stringify!($call), "` transaction.")]
            pub async fn $name(
                &self,
                $($arg: $ty,)*
                options: &::tbtc_ethutil::TransactionOptions,
            ) -> ::tbtc_ethutil::Result<::tbtc_ethutil::SubmittedTransaction> {
                self.contract
                    .transact(&abi::$call { $($field: $arg),* }, options)
                    .await
            }

            #[doc = concat!("Simulates `", stringify!($call), "` at `block`.")]
            pub async fn $call_name(
                &self,
                $($arg: $ty,)*
                block: ::alloy::eips::BlockId,
            ) -> ::tbtc_ethutil::Result<$crate::macros::Returns<abi::$call>> {
                self.contract
                    .call(
                        &abi::$call { $($field: $arg),* },
                        ::alloy::primitives::U256::ZERO,
                        block,
                    )
                    .await
            }

            #[doc = concat!("Estimates the gas used by `", stringify!($call), "`.")]
            pub async fn $estimate_name(
                &self,
                $($arg: $ty),*
            ) -> ::tbtc_ethutil::Result<u64> {
                self.contract
                    .estimate_gas(
                        &abi::$call { $($field: $arg),* },
                        ::alloy::primitives::U256::ZERO,
                    )
                    .await
            }
        )*
    };
}

/// Payable state changing methods. Like [`transactions!`], with the call and
/// the estimate taking the transferred `value`; submissions read it from the
/// transaction options.
macro_rules! payable_transactions {
    ($(
        fn $name:ident, $call_name:ident, $estimate_name:ident = $call:ident(
            $($arg:ident => $field:tt: $ty:ty),* $(,)?
        );
    )*) => {
        $(
            #[doc = concat!("Submits a payable `", stringify!($call), "` transaction.")]
            pub async fn $name(
                &self,
                $($arg: $ty,)*
                options: &::tbtc_ethutil::TransactionOptions,
            ) -> ::tbtc_ethutil::Result<::tbtc_ethutil::SubmittedTransaction> {
                self.contract
                    .transact(&abi::$call { $($field: $arg),* }, options)
                    .await
            }

            #[doc = concat!("Simulates `", stringify!($call), "` transferring `value` at `block`.")]
            pub async fn $call_name(
                &self,
                $($arg: $ty,)*
                value: ::alloy::primitives::U256,
                block: ::alloy::eips::BlockId,
            ) -> ::tbtc_ethutil::Result<$crate::macros::Returns<abi::$call>> {
                self.contract
                    .call(&abi::$call { $($field: $arg),* }, value, block)
                    .await
            }

            #[doc = concat!(
                "Estimates the gas used by `", stringify!($call), "` transferring `value`."
            )]
            pub async fn $estimate_name(
                &self,
                $($arg: $ty,)*
                value: ::alloy::primitives::U256,
            ) -> ::tbtc_ethutil::Result<u64> {
                self.contract
                    .estimate_gas(&abi::$call { $($field: $arg),* }, value)
                    .await
            }
        )*
    };
}

/// Constant methods, read at the latest block or at a given one.
macro_rules! views {
    ($(
        fn $name:ident, $at_block:ident = $call:ident(
            $($arg:ident => $field:tt: $ty:ty),* $(,)?
        );
    )*) => {
        $(
            #[doc = concat!("Reads `", stringify!($call), "` at the latest block.")]
            pub async fn $name(
                &self,
                $($arg: $ty),*
            ) -> ::tbtc_ethutil::Result<$crate::macros::Returns<abi::$call>> {
                self.$at_block($($arg,)* ::alloy::eips::BlockId::latest()).await
            }

            #[doc = concat!("Reads `", stringify!($call), "` at `block`.")]
            pub async fn $at_block(
                &self,
                $($arg: $ty,)*
                block: ::alloy::eips::BlockId,
            ) -> ::tbtc_ethutil::Result<$crate::macros::Returns<abi::$call>> {
                self.contract
                    .call(
                        &abi::$call { $($field: $arg),* },
                        ::alloy::primitives::U256::ZERO,
                        block,
                    )
                    .await
            }
        )*
    };
}

/// Events. Every entry generates a subscription and a past events query, both
/// filtering on the indexed parameters in declaration order. An empty slice
/// matches any value.
macro_rules! events {
    ($(
        event $event:ident => $subscribe:ident, $past:ident(
            $($filter:ident: $sol:ty),* $(,)?
        );
    )*) => {
        $(
            #[doc = concat!("Prepares a subscription to `", stringify!($event), "` events.")]
            pub fn $subscribe(
                &self,
                opts: ::tbtc_ethutil::SubscribeOpts,
                $($filter: &[$crate::macros::Indexed<$sol>]),*
            ) -> ::tbtc_ethutil::EventSubscription<::tbtc_ethutil::ContractEvent<abi::$event>> {
                let topics = ::tbtc_ethutil::TopicFilter::new()$(.push::<$sol>($filter))*;
                self.contract.event::<abi::$event>(opts, &topics)
            }

            #[doc = concat!(
                "Fetches `", stringify!($event),
                "` events emitted between `start` and `end` inclusive."
            )]
            pub async fn $past(
                &self,
                start: ::alloy::primitives::BlockNumber,
                end: Option<::alloy::primitives::BlockNumber>,
                $($filter: &[$crate::macros::Indexed<$sol>]),*
            ) -> ::tbtc_ethutil::Result<Vec<::tbtc_ethutil::ContractEvent<abi::$event>>> {
                let topics = ::tbtc_ethutil::TopicFilter::new()$(.push::<$sol>($filter))*;
                self.contract.past_events::<abi::$event>(start, end, &topics).await
            }
        )*
    };
}

/// The wrapper type around a [`tbtc_ethutil::BoundContract`].
macro_rules! contract_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            contract: ::tbtc_ethutil::BoundContract,
        }

        impl $name {
            /// Wraps a contract bound to the deployed address.
            #[must_use]
            pub const fn new(contract: ::tbtc_ethutil::BoundContract) -> Self {
                Self { contract }
            }

            /// The underlying contract binding.
            #[must_use]
            pub const fn contract(&self) -> &::tbtc_ethutil::BoundContract {
                &self.contract
            }

            /// The deployed address.
            #[must_use]
            pub const fn address(&self) -> ::alloy::primitives::Address {
                self.contract.address()
            }
        }
    };
}
