//! Bindings of the `WalletProposalValidator`, which checks wallet coordination
//! proposals against the `Bridge` state.

use tbtc_solidity_types::wallet_proposal_validator::{BitcoinTx, WalletProposalValidator as abi};

contract_wrapper! {
    /// Typed binding of the `WalletProposalValidator` contract.
    WalletProposalValidator
}

impl WalletProposalValidator {
    views! {
        fn bridge, bridge_at_block = bridgeCall();
        fn deposit_min_age, deposit_min_age_at_block = DEPOSIT_MIN_AGECall();
        fn deposit_refund_safety_margin,
            deposit_refund_safety_margin_at_block = DEPOSIT_REFUND_SAFETY_MARGINCall();
        fn deposit_sweep_max_size, deposit_sweep_max_size_at_block = DEPOSIT_SWEEP_MAX_SIZECall();
        fn redemption_max_size, redemption_max_size_at_block = REDEMPTION_MAX_SIZECall();
        fn redemption_request_min_age,
            redemption_request_min_age_at_block = REDEMPTION_REQUEST_MIN_AGECall();
        fn redemption_request_timeout_safety_margin,
            redemption_request_timeout_safety_margin_at_block = REDEMPTION_REQUEST_TIMEOUT_SAFETY_MARGINCall();
        fn validate_deposit_sweep_proposal,
            validate_deposit_sweep_proposal_at_block = validateDepositSweepProposalCall(
                proposal => proposal: abi::DepositSweepProposal,
                deposits_extra_info => depositsExtraInfo: Vec<abi::DepositExtraInfo>,
            );
        fn validate_heartbeat_proposal,
            validate_heartbeat_proposal_at_block = validateHeartbeatProposalCall(
                proposal => proposal: abi::HeartbeatProposal,
            );
        fn validate_moved_funds_sweep_proposal,
            validate_moved_funds_sweep_proposal_at_block = validateMovedFundsSweepProposalCall(
                proposal => proposal: abi::MovedFundsSweepProposal,
            );
        fn validate_moving_funds_proposal,
            validate_moving_funds_proposal_at_block = validateMovingFundsProposalCall(
                proposal => proposal: abi::MovingFundsProposal,
                wallet_main_utxo => walletMainUtxo: BitcoinTx::UTXO,
            );
        fn validate_redemption_proposal,
            validate_redemption_proposal_at_block = validateRedemptionProposalCall(
                proposal => proposal: abi::RedemptionProposal,
            );
    }
}
