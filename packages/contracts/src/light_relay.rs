//! Bindings of the `LightRelay` Bitcoin difficulty relay.

use alloy::{primitives::{Address, Bytes, U256}, sol_types::sol_data};
use tbtc_solidity_types::light_relay::LightRelay as abi;

contract_wrapper! {
    /// Typed binding of the `LightRelay` contract.
    LightRelay
}

impl LightRelay {
    transactions! {
        fn authorize, call_authorize, authorize_gas_estimate = authorizeCall(
            submitter => submitter: Address,
        );
        fn deauthorize, call_deauthorize, deauthorize_gas_estimate = deauthorizeCall(
            submitter => submitter: Address,
        );
        fn genesis, call_genesis, genesis_gas_estimate = genesisCall(
            genesis_header => genesisHeader: Bytes,
            genesis_height => genesisHeight: U256,
            genesis_proof_length => genesisProofLength: u64,
        );
        fn renounce_ownership,
            call_renounce_ownership,
            renounce_ownership_gas_estimate = renounceOwnershipCall();
        fn retarget, call_retarget, retarget_gas_estimate = retargetCall(headers => headers: Bytes);
        fn set_authorization_status,
            call_set_authorization_status,
            set_authorization_status_gas_estimate = setAuthorizationStatusCall(
                status => status: bool,
            );
        fn set_difficulty_from_headers,
            call_set_difficulty_from_headers,
            set_difficulty_from_headers_gas_estimate = setDifficultyFromHeadersCall(
                bitcoin_headers => bitcoinHeaders: Bytes,
            );
        fn set_proof_length,
            call_set_proof_length,
            set_proof_length_gas_estimate = setProofLengthCall(
                new_length => newLength: u64,
            );
        fn transfer_ownership,
            call_transfer_ownership,
            transfer_ownership_gas_estimate = transferOwnershipCall(
                new_owner => newOwner: Address,
            );
    }
}

impl LightRelay {
    views! {
        fn authorization_required, authorization_required_at_block = authorizationRequiredCall();
        fn current_epoch, current_epoch_at_block = currentEpochCall();
        fn genesis_epoch, genesis_epoch_at_block = genesisEpochCall();
        fn get_block_difficulty, get_block_difficulty_at_block = getBlockDifficultyCall(
            block_number => blockNumber: U256,
        );
        fn get_current_and_prev_epoch_difficulty,
            get_current_and_prev_epoch_difficulty_at_block = getCurrentAndPrevEpochDifficultyCall();
        fn get_current_epoch_difficulty,
            get_current_epoch_difficulty_at_block = getCurrentEpochDifficultyCall();
        fn get_epoch_difficulty, get_epoch_difficulty_at_block = getEpochDifficultyCall(
            epoch_number => epochNumber: U256,
        );
        fn get_prev_epoch_difficulty,
            get_prev_epoch_difficulty_at_block = getPrevEpochDifficultyCall();
        fn get_relay_range, get_relay_range_at_block = getRelayRangeCall();
        fn is_authorized, is_authorized_at_block = isAuthorizedCall(account => 0: Address);
        fn owner, owner_at_block = ownerCall();
        fn proof_length, proof_length_at_block = proofLengthCall();
        fn ready, ready_at_block = readyCall();
        fn validate_chain, validate_chain_at_block = validateChainCall(headers => headers: Bytes);
    }
}

impl LightRelay {
    events! {
        event AuthorizationRequirementChanged =>
            authorization_requirement_changed_event, past_authorization_requirement_changed_events();
        event Genesis => genesis_event, past_genesis_events();
        event OwnershipTransferred => ownership_transferred_event, past_ownership_transferred_events(
            previous_owner: sol_data::Address,
            new_owner: sol_data::Address,
        );
        event ProofLengthChanged => proof_length_changed_event, past_proof_length_changed_events();
        event Retarget => retarget_event, past_retarget_events();
        event SubmitterAuthorized => submitter_authorized_event, past_submitter_authorized_events();
        event SubmitterDeauthorized =>
            submitter_deauthorized_event, past_submitter_deauthorized_events();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::{eips::BlockId, rpc::types::TransactionRequest, sol_types::SolCall};
    use tbtc_ethutil::{test_utils::MockBackend, BoundContract};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn authorization_is_read_for_the_maintainer() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.call_handler = Some(Arc::new(
                |_: &TransactionRequest, _: BlockId| -> tbtc_ethutil::Result<Bytes> {
                    Ok(abi::isAuthorizedCall::abi_encode_returns(&true).into())
                },
            ));
        });
        let relay = LightRelay::new(BoundContract::read_only(
            "LightRelay",
            Address::repeat_byte(0x1e),
            mock.clone(),
            Address::ZERO,
        ));
        let maintainer = Address::repeat_byte(0x4d);

        assert!(relay.is_authorized_at_block(maintainer, BlockId::number(9)).await.unwrap());

        let (request, block) = mock.state().calls[0].clone();
        assert_eq!(block, BlockId::number(9));
        assert_eq!(
            request.input.input().unwrap().as_ref(),
            abi::isAuthorizedCall(maintainer).abi_encode().as_slice()
        );
    }
}
