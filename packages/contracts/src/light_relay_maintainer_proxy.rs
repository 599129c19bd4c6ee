//! Bindings of the proxy through which authorized maintainers retarget the `LightRelay`.

use alloy::{primitives::{Address, Bytes, U256}, sol_types::sol_data};
use tbtc_solidity_types::light_relay_maintainer_proxy::LightRelayMaintainerProxy as abi;

contract_wrapper! {
    /// Typed binding of the `LightRelayMaintainerProxy` contract.
    LightRelayMaintainerProxy
}

impl LightRelayMaintainerProxy {
    transactions! {
        fn authorize, call_authorize, authorize_gas_estimate = authorizeCall(
            maintainer => maintainer: Address,
        );
        fn deauthorize, call_deauthorize, deauthorize_gas_estimate = deauthorizeCall(
            maintainer => maintainer: Address,
        );
        fn renounce_ownership,
            call_renounce_ownership,
            renounce_ownership_gas_estimate = renounceOwnershipCall();
        fn retarget, call_retarget, retarget_gas_estimate = retargetCall(headers => headers: Bytes);
        fn transfer_ownership,
            call_transfer_ownership,
            transfer_ownership_gas_estimate = transferOwnershipCall(
                new_owner => newOwner: Address,
            );
        fn update_light_relay,
            call_update_light_relay,
            update_light_relay_gas_estimate = updateLightRelayCall(
                light_relay => _lightRelay: Address,
            );
        fn update_reimbursement_pool,
            call_update_reimbursement_pool,
            update_reimbursement_pool_gas_estimate = updateReimbursementPoolCall(
                reimbursement_pool => _reimbursementPool: Address,
            );
        fn update_retarget_gas_offset,
            call_update_retarget_gas_offset,
            update_retarget_gas_offset_gas_estimate = updateRetargetGasOffsetCall(
                new_retarget_gas_offset => newRetargetGasOffset: U256,
            );
    }
}

impl LightRelayMaintainerProxy {
    views! {
        fn is_authorized, is_authorized_at_block = isAuthorizedCall(account => 0: Address);
        fn light_relay, light_relay_at_block = lightRelayCall();
        fn owner, owner_at_block = ownerCall();
        fn reimbursement_pool, reimbursement_pool_at_block = reimbursementPoolCall();
        fn retarget_gas_offset, retarget_gas_offset_at_block = retargetGasOffsetCall();
    }
}

impl LightRelayMaintainerProxy {
    events! {
        event LightRelayUpdated => light_relay_updated_event, past_light_relay_updated_events();
        event MaintainerAuthorized => maintainer_authorized_event, past_maintainer_authorized_events(
            maintainer: sol_data::Address,
        );
        event MaintainerDeauthorized => maintainer_deauthorized_event, past_maintainer_deauthorized_events(
            maintainer: sol_data::Address,
        );
        event OwnershipTransferred => ownership_transferred_event, past_ownership_transferred_events(
            previous_owner: sol_data::Address,
            new_owner: sol_data::Address,
        );
        event ReimbursementPoolUpdated =>
            reimbursement_pool_updated_event, past_reimbursement_pool_updated_events();
        event RetargetGasOffsetUpdated =>
            retarget_gas_offset_updated_event, past_retarget_gas_offset_updated_events();
    }
}
