//! Bindings of the tBTC `Bridge`, the contract that tracks deposits, redemptions and wallets.

use alloy::{
    primitives::{aliases::U96, Address, Bytes, FixedBytes, U256},
    sol_types::sol_data,
};
use tbtc_solidity_types::bridge::{BitcoinTx, Bridge as abi, Deposit};

contract_wrapper! {
    /// Typed binding of the `Bridge` contract.
    Bridge
}

impl Bridge {
    transactions! {
        fn ecdsa_wallet_created_callback,
            call_ecdsa_wallet_created_callback,
            ecdsa_wallet_created_callback_gas_estimate = __ecdsaWalletCreatedCallbackCall(
                ecdsa_wallet_id => ecdsaWalletID: FixedBytes<32>,
                public_key_x => publicKeyX: FixedBytes<32>,
                public_key_y => publicKeyY: FixedBytes<32>,
            );
        fn ecdsa_wallet_heartbeat_failed_callback,
            call_ecdsa_wallet_heartbeat_failed_callback,
            ecdsa_wallet_heartbeat_failed_callback_gas_estimate = __ecdsaWalletHeartbeatFailedCallbackCall(
                ecdsa_wallet_id => _0: FixedBytes<32>,
                public_key_x => publicKeyX: FixedBytes<32>,
                public_key_y => publicKeyY: FixedBytes<32>,
            );
        fn defeat_fraud_challenge,
            call_defeat_fraud_challenge,
            defeat_fraud_challenge_gas_estimate = defeatFraudChallengeCall(
                wallet_public_key => walletPublicKey: Bytes,
                preimage => preimage: Bytes,
                witness => witness: bool,
            );
        fn defeat_fraud_challenge_with_heartbeat,
            call_defeat_fraud_challenge_with_heartbeat,
            defeat_fraud_challenge_with_heartbeat_gas_estimate = defeatFraudChallengeWithHeartbeatCall(
                wallet_public_key => walletPublicKey: Bytes,
                heartbeat_message => heartbeatMessage: Bytes,
            );
        fn initialize, call_initialize, initialize_gas_estimate = initializeCall(
            bank => _bank: Address,
            relay => _relay: Address,
            treasury => _treasury: Address,
            ecdsa_wallet_registry => _ecdsaWalletRegistry: Address,
            tx_proof_difficulty_factor => _txProofDifficultyFactor: U96,
        );
        fn notify_fraud_challenge_defeat_timeout,
            call_notify_fraud_challenge_defeat_timeout,
            notify_fraud_challenge_defeat_timeout_gas_estimate = notifyFraudChallengeDefeatTimeoutCall(
                wallet_public_key => walletPublicKey: Bytes,
                wallet_members_ids => walletMembersIDs: Vec<u32>,
                preimage_sha256 => preimageSha256: Bytes,
            );
        fn notify_moved_funds_sweep_timeout,
            call_notify_moved_funds_sweep_timeout,
            notify_moved_funds_sweep_timeout_gas_estimate = notifyMovedFundsSweepTimeoutCall(
                moving_funds_tx_hash => movingFundsTxHash: FixedBytes<32>,
                moving_funds_tx_output_index => movingFundsTxOutputIndex: u32,
                wallet_members_ids => walletMembersIDs: Vec<u32>,
            );
        fn notify_moving_funds_below_dust,
            call_notify_moving_funds_below_dust,
            notify_moving_funds_below_dust_gas_estimate = notifyMovingFundsBelowDustCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
            );
        fn notify_moving_funds_timeout,
            call_notify_moving_funds_timeout,
            notify_moving_funds_timeout_gas_estimate = notifyMovingFundsTimeoutCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                wallet_members_ids => walletMembersIDs: Vec<u32>,
            );
        fn notify_redemption_timeout,
            call_notify_redemption_timeout,
            notify_redemption_timeout_gas_estimate = notifyRedemptionTimeoutCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                wallet_members_ids => walletMembersIDs: Vec<u32>,
                redeemer_output_script => redeemerOutputScript: Bytes,
            );
        fn notify_wallet_closeable,
            call_notify_wallet_closeable,
            notify_wallet_closeable_gas_estimate = notifyWalletCloseableCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                wallet_main_utxo => walletMainUtxo: BitcoinTx::UTXO,
            );
        fn notify_wallet_closing_period_elapsed,
            call_notify_wallet_closing_period_elapsed,
            notify_wallet_closing_period_elapsed_gas_estimate = notifyWalletClosingPeriodElapsedCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
            );
        fn receive_balance_approval,
            call_receive_balance_approval,
            receive_balance_approval_gas_estimate = receiveBalanceApprovalCall(
                balance_owner => balanceOwner: Address,
                amount => amount: U256,
                redemption_data => redemptionData: Bytes,
            );
        fn request_new_wallet,
            call_request_new_wallet,
            request_new_wallet_gas_estimate = requestNewWalletCall(
                active_wallet_main_utxo => activeWalletMainUtxo: BitcoinTx::UTXO,
            );
        fn request_redemption,
            call_request_redemption,
            request_redemption_gas_estimate = requestRedemptionCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
                redeemer_output_script => redeemerOutputScript: Bytes,
                amount => amount: u64,
            );
        fn reset_moving_funds_timeout,
            call_reset_moving_funds_timeout,
            reset_moving_funds_timeout_gas_estimate = resetMovingFundsTimeoutCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
            );
        fn reveal_deposit, call_reveal_deposit, reveal_deposit_gas_estimate = revealDepositCall(
            funding_tx => fundingTx: BitcoinTx::Info,
            reveal => reveal: Deposit::DepositRevealInfo,
        );
        fn set_vault_status,
            call_set_vault_status,
            set_vault_status_gas_estimate = setVaultStatusCall(
                vault => vault: Address,
                is_trusted => isTrusted: bool,
            );
        fn submit_deposit_sweep_proof,
            call_submit_deposit_sweep_proof,
            submit_deposit_sweep_proof_gas_estimate = submitDepositSweepProofCall(
                sweep_tx => sweepTx: BitcoinTx::Info,
                sweep_proof => sweepProof: BitcoinTx::Proof,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
                vault => vault: Address,
            );
        fn submit_moved_funds_sweep_proof,
            call_submit_moved_funds_sweep_proof,
            submit_moved_funds_sweep_proof_gas_estimate = submitMovedFundsSweepProofCall(
                sweep_tx => sweepTx: BitcoinTx::Info,
                sweep_proof => sweepProof: BitcoinTx::Proof,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
            );
        fn submit_moving_funds_commitment,
            call_submit_moving_funds_commitment,
            submit_moving_funds_commitment_gas_estimate = submitMovingFundsCommitmentCall(
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
                wallet_main_utxo => walletMainUtxo: BitcoinTx::UTXO,
                wallet_members_ids => walletMembersIDs: Vec<u32>,
                wallet_member_index => walletMemberIndex: U256,
                target_wallets => targetWallets: Vec<FixedBytes<20>>,
            );
        fn submit_moving_funds_proof,
            call_submit_moving_funds_proof,
            submit_moving_funds_proof_gas_estimate = submitMovingFundsProofCall(
                moving_funds_tx => movingFundsTx: BitcoinTx::Info,
                moving_funds_proof => movingFundsProof: BitcoinTx::Proof,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
            );
        fn submit_redemption_proof,
            call_submit_redemption_proof,
            submit_redemption_proof_gas_estimate = submitRedemptionProofCall(
                redemption_tx => redemptionTx: BitcoinTx::Info,
                redemption_proof => redemptionProof: BitcoinTx::Proof,
                main_utxo => mainUtxo: BitcoinTx::UTXO,
                wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
            );
        fn transfer_governance,
            call_transfer_governance,
            transfer_governance_gas_estimate = transferGovernanceCall(
                new_governance => newGovernance: Address,
            );
        fn update_deposit_parameters,
            call_update_deposit_parameters,
            update_deposit_parameters_gas_estimate = updateDepositParametersCall(
                deposit_dust_threshold => depositDustThreshold: u64,
                deposit_treasury_fee_divisor => depositTreasuryFeeDivisor: u64,
                deposit_tx_max_fee => depositTxMaxFee: u64,
            );
        fn update_fraud_parameters,
            call_update_fraud_parameters,
            update_fraud_parameters_gas_estimate = updateFraudParametersCall(
                fraud_challenge_deposit_amount => fraudChallengeDepositAmount: U96,
                fraud_challenge_defeat_timeout => fraudChallengeDefeatTimeout: u32,
                fraud_slashing_amount => fraudSlashingAmount: U96,
                fraud_notifier_reward_multiplier => fraudNotifierRewardMultiplier: u32,
            );
        fn update_moving_funds_parameters,
            call_update_moving_funds_parameters,
            update_moving_funds_parameters_gas_estimate = updateMovingFundsParametersCall(
                moving_funds_tx_max_total_fee => movingFundsTxMaxTotalFee: u64,
                moving_funds_dust_threshold => movingFundsDustThreshold: u64,
                moving_funds_timeout_reset_delay => movingFundsTimeoutResetDelay: u32,
                moving_funds_timeout => movingFundsTimeout: u32,
                moving_funds_timeout_slashing_amount => movingFundsTimeoutSlashingAmount: U96,
                moving_funds_timeout_notifier_reward_multiplier => movingFundsTimeoutNotifierRewardMultiplier: u32,
                moved_funds_sweep_tx_max_total_fee => movedFundsSweepTxMaxTotalFee: u64,
                moved_funds_sweep_timeout => movedFundsSweepTimeout: u32,
                moved_funds_sweep_timeout_slashing_amount => movedFundsSweepTimeoutSlashingAmount: U96,
                moved_funds_sweep_timeout_notifier_reward_multiplier => movedFundsSweepTimeoutNotifierRewardMultiplier: u32,
            );
        fn update_redemption_parameters,
            call_update_redemption_parameters,
            update_redemption_parameters_gas_estimate = updateRedemptionParametersCall(
                redemption_dust_threshold => redemptionDustThreshold: u64,
                redemption_treasury_fee_divisor => redemptionTreasuryFeeDivisor: u64,
                redemption_tx_max_fee => redemptionTxMaxFee: u64,
                redemption_timeout => redemptionTimeout: u32,
                redemption_timeout_slashing_amount => redemptionTimeoutSlashingAmount: U96,
                redemption_timeout_notifier_reward_multiplier => redemptionTimeoutNotifierRewardMultiplier: u32,
            );
        fn update_wallet_parameters,
            call_update_wallet_parameters,
            update_wallet_parameters_gas_estimate = updateWalletParametersCall(
                wallet_creation_period => walletCreationPeriod: u32,
                wallet_creation_min_btc_balance => walletCreationMinBtcBalance: u64,
                wallet_creation_max_btc_balance => walletCreationMaxBtcBalance: u64,
                wallet_closure_min_btc_balance => walletClosureMinBtcBalance: u64,
                wallet_max_age => walletMaxAge: u32,
                wallet_max_btc_transfer => walletMaxBtcTransfer: u64,
                wallet_closing_period => walletClosingPeriod: u32,
            );
    }
}

impl Bridge {
    payable_transactions! {
        fn submit_fraud_challenge,
            call_submit_fraud_challenge,
            submit_fraud_challenge_gas_estimate = submitFraudChallengeCall(
                wallet_public_key => walletPublicKey: Bytes,
                preimage_sha256 => preimageSha256: Bytes,
                signature => signature: BitcoinTx::RSVSignature,
            );
    }
}

impl Bridge {
    views! {
        fn active_wallet_pub_key_hash,
            active_wallet_pub_key_hash_at_block = activeWalletPubKeyHashCall();
        fn contract_references, contract_references_at_block = contractReferencesCall();
        fn deposit_parameters, deposit_parameters_at_block = depositParametersCall();
        fn deposits, deposits_at_block = depositsCall(deposit_key => depositKey: U256);
        fn fraud_challenges, fraud_challenges_at_block = fraudChallengesCall(
            challenge_key => challengeKey: U256,
        );
        fn fraud_parameters, fraud_parameters_at_block = fraudParametersCall();
        fn governance, governance_at_block = governanceCall();
        fn is_vault_trusted, is_vault_trusted_at_block = isVaultTrustedCall(
            vault => vault: Address,
        );
        fn live_wallets_count, live_wallets_count_at_block = liveWalletsCountCall();
        fn moved_funds_sweep_requests,
            moved_funds_sweep_requests_at_block = movedFundsSweepRequestsCall(
                request_key => requestKey: U256,
            );
        fn moving_funds_parameters, moving_funds_parameters_at_block = movingFundsParametersCall();
        fn pending_redemptions, pending_redemptions_at_block = pendingRedemptionsCall(
            redemption_key => redemptionKey: U256,
        );
        fn redemption_parameters, redemption_parameters_at_block = redemptionParametersCall();
        fn spent_main_utxos, spent_main_utxos_at_block = spentMainUTXOsCall(
            utxo_key => utxoKey: U256,
        );
        fn timed_out_redemptions, timed_out_redemptions_at_block = timedOutRedemptionsCall(
            redemption_key => redemptionKey: U256,
        );
        fn treasury, treasury_at_block = treasuryCall();
        fn tx_proof_difficulty_factor,
            tx_proof_difficulty_factor_at_block = txProofDifficultyFactorCall();
        fn wallet_parameters, wallet_parameters_at_block = walletParametersCall();
        fn wallets, wallets_at_block = walletsCall(
            wallet_pub_key_hash => walletPubKeyHash: FixedBytes<20>,
        );
    }
}

impl Bridge {
    events! {
        event DepositParametersUpdated =>
            deposit_parameters_updated_event, past_deposit_parameters_updated_events();
        event DepositRevealed => deposit_revealed_event, past_deposit_revealed_events(
            depositor: sol_data::Address,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event DepositsSwept => deposits_swept_event, past_deposits_swept_events();
        event FraudChallengeDefeatTimedOut => fraud_challenge_defeat_timed_out_event, past_fraud_challenge_defeat_timed_out_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event FraudChallengeDefeated => fraud_challenge_defeated_event, past_fraud_challenge_defeated_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event FraudChallengeSubmitted => fraud_challenge_submitted_event, past_fraud_challenge_submitted_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event FraudParametersUpdated =>
            fraud_parameters_updated_event, past_fraud_parameters_updated_events();
        event GovernanceTransferred =>
            governance_transferred_event, past_governance_transferred_events();
        event Initialized => initialized_event, past_initialized_events();
        event MovedFundsSweepTimedOut => moved_funds_sweep_timed_out_event, past_moved_funds_sweep_timed_out_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovedFundsSwept => moved_funds_swept_event, past_moved_funds_swept_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovingFundsBelowDustReported => moving_funds_below_dust_reported_event, past_moving_funds_below_dust_reported_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovingFundsCommitmentSubmitted => moving_funds_commitment_submitted_event, past_moving_funds_commitment_submitted_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovingFundsCompleted => moving_funds_completed_event, past_moving_funds_completed_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovingFundsParametersUpdated =>
            moving_funds_parameters_updated_event, past_moving_funds_parameters_updated_events();
        event MovingFundsTimedOut => moving_funds_timed_out_event, past_moving_funds_timed_out_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event MovingFundsTimeoutReset => moving_funds_timeout_reset_event, past_moving_funds_timeout_reset_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event NewWalletRegistered => new_wallet_registered_event, past_new_wallet_registered_events(
            ecdsa_wallet_id: sol_data::FixedBytes<32>,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event NewWalletRequested => new_wallet_requested_event, past_new_wallet_requested_events();
        event RedemptionParametersUpdated =>
            redemption_parameters_updated_event, past_redemption_parameters_updated_events();
        event RedemptionRequested => redemption_requested_event, past_redemption_requested_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
            redeemer: sol_data::Address,
        );
        event RedemptionTimedOut => redemption_timed_out_event, past_redemption_timed_out_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event RedemptionsCompleted => redemptions_completed_event, past_redemptions_completed_events(
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event VaultStatusUpdated => vault_status_updated_event, past_vault_status_updated_events(
            vault: sol_data::Address,
        );
        event WalletClosed => wallet_closed_event, past_wallet_closed_events(
            ecdsa_wallet_id: sol_data::FixedBytes<32>,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event WalletClosing => wallet_closing_event, past_wallet_closing_events(
            ecdsa_wallet_id: sol_data::FixedBytes<32>,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event WalletMovingFunds => wallet_moving_funds_event, past_wallet_moving_funds_events(
            ecdsa_wallet_id: sol_data::FixedBytes<32>,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
        event WalletParametersUpdated =>
            wallet_parameters_updated_event, past_wallet_parameters_updated_events();
        event WalletTerminated => wallet_terminated_event, past_wallet_terminated_events(
            ecdsa_wallet_id: sol_data::FixedBytes<32>,
            wallet_pub_key_hash: sol_data::FixedBytes<20>,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::{
        eips::BlockId,
        primitives::{FixedBytes, U256},
        rpc::types::TransactionRequest,
        sol_types::SolCall,
    };
    use tbtc_ethutil::{test_utils::{log_for, MockBackend}, BoundContract};

    use super::*;

    const BRIDGE: Address = Address::repeat_byte(0xb1);

    fn deposit_revealed(depositor: Address, wallet: FixedBytes<20>) -> abi::DepositRevealed {
        abi::DepositRevealed {
            fundingTxHash: FixedBytes::repeat_byte(0xf0),
            fundingOutputIndex: 1,
            depositor,
            amount: 100_000,
            blindingFactor: FixedBytes::repeat_byte(2),
            walletPubKeyHash: wallet,
            refundPubKeyHash: FixedBytes::repeat_byte(3),
            refundLocktime: FixedBytes::repeat_byte(4),
            vault: Address::ZERO,
        }
    }

    fn bridge(mock: &Arc<MockBackend>) -> Bridge {
        Bridge::new(BoundContract::read_only("Bridge", BRIDGE, mock.clone(), Address::ZERO))
    }

    #[tokio::test(start_paused = true)]
    async fn past_events_filter_on_indexed_parameters() {
        let mock = Arc::new(MockBackend::new());
        let wallet = FixedBytes::repeat_byte(0xaa);
        let alice = Address::repeat_byte(0x0a);
        let bob = Address::repeat_byte(0x0b);
        mock.update(|state| {
            state.block_number = 50;
            state.logs = vec![
                log_for(BRIDGE, &deposit_revealed(alice, wallet), 10, 0),
                log_for(BRIDGE, &deposit_revealed(bob, wallet), 11, 0),
                log_for(BRIDGE, &deposit_revealed(alice, FixedBytes::repeat_byte(0xbb)), 12, 0),
            ];
        });
        let bridge = bridge(&mock);

        let by_wallet = bridge
            .past_deposit_revealed_events(0, None, &[], &[wallet])
            .await
            .unwrap();
        assert_eq!(
            by_wallet.iter().map(|e| e.event.depositor).collect::<Vec<_>>(),
            vec![alice, bob]
        );

        let by_both = bridge
            .past_deposit_revealed_events(0, Some(11), &[alice], &[wallet])
            .await
            .unwrap();
        assert_eq!(by_both.len(), 1);
        assert_eq!(by_both[0].block_number, 10);
        assert_eq!(by_both[0].event.amount, 100_000);
    }

    #[tokio::test(start_paused = true)]
    async fn slashing_amounts_are_encoded_as_uint96() {
        let mock = Arc::new(MockBackend::new());
        let deposit_amount = U96::from(2_000_000_000_000_000_000u128);
        let slashing_amount = U96::MAX;

        bridge(&mock)
            .call_update_fraud_parameters(
                deposit_amount,
                604_800,
                slashing_amount,
                100,
                BlockId::latest(),
            )
            .await
            .unwrap();

        let expected = abi::updateFraudParametersCall {
            fraudChallengeDepositAmount: deposit_amount,
            fraudChallengeDefeatTimeout: 604_800,
            fraudSlashingAmount: slashing_amount,
            fraudNotifierRewardMultiplier: 100,
        };
        let (request, _) = mock.state().calls[0].clone();
        assert_eq!(request.input.input().unwrap().as_ref(), expected.abi_encode().as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn payable_simulation_carries_value() {
        let mock = Arc::new(MockBackend::new());
        mock.update(|state| {
            state.call_handler = Some(Arc::new(
                |_: &TransactionRequest, _: BlockId| -> tbtc_ethutil::Result<Bytes> {
                    Ok(Bytes::new())
                },
            ));
        });
        let signature = BitcoinTx::RSVSignature {
            r: FixedBytes::repeat_byte(1),
            s: FixedBytes::repeat_byte(2),
            v: 27,
        };

        bridge(&mock)
            .call_submit_fraud_challenge(
                Bytes::from_static(&[4; 64]),
                Bytes::from_static(&[5; 32]),
                signature,
                U256::from(10_000_000u64),
                BlockId::number(42),
            )
            .await
            .unwrap();

        let (request, block) = mock.state().calls[0].clone();
        assert_eq!(block, BlockId::number(42));
        assert_eq!(request.value, Some(U256::from(10_000_000u64)));
        assert_eq!(
            &request.input.input().unwrap()[..4],
            abi::submitFraudChallengeCall::SELECTOR.as_slice()
        );
    }
}
