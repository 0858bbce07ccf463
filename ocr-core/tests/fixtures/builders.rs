#![allow(dead_code)]

use crate::fixtures::{
    oracle_keys, peer_id, TestNetwork, TEST_DELTA_PROGRESS_MS, TEST_DELTA_RESEND_MS, TEST_DELTA_ROUND_MS, TEST_DELTA_STAGE_MS,
    TEST_MAX_EPOCH_JUMP, TEST_ORACLES, TEST_R_MAX, TEST_THRESHOLD,
};
use ocr_core::domain::{ContractConfig, OffchainConfig, OffchainSigner, OnchainSigner, SharedConfig};
use ocr_core::foundation::OFFCHAIN_CONFIG_VERSION;

pub struct NetworkBuilder {
    oracles: usize,
    threshold: u8,
    config_count: u64,
    delta_progress_ms: u64,
    delta_resend_ms: u64,
    delta_round_ms: u64,
    delta_stage_ms: u64,
    r_max: u8,
    max_epoch_jump: u32,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self {
            oracles: TEST_ORACLES,
            threshold: TEST_THRESHOLD,
            config_count: 1,
            delta_progress_ms: TEST_DELTA_PROGRESS_MS,
            delta_resend_ms: TEST_DELTA_RESEND_MS,
            delta_round_ms: TEST_DELTA_ROUND_MS,
            delta_stage_ms: TEST_DELTA_STAGE_MS,
            r_max: TEST_R_MAX,
            max_epoch_jump: TEST_MAX_EPOCH_JUMP,
        }
    }
}

impl NetworkBuilder {
    pub fn oracles(mut self, oracles: usize) -> Self {
        self.oracles = oracles;
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// A different count yields a different digest for the same members.
    pub fn config_count(mut self, config_count: u64) -> Self {
        self.config_count = config_count;
        self
    }

    pub fn max_epoch_jump(mut self, max_epoch_jump: u32) -> Self {
        self.max_epoch_jump = max_epoch_jump;
        self
    }

    pub fn offchain_config(&self) -> OffchainConfig {
        OffchainConfig {
            offchain_public_keys: (0..self.oracles).map(|i| oracle_keys(i).offchain.public_key()).collect(),
            peer_ids: (0..self.oracles).map(peer_id).collect(),
            delta_progress_ms: self.delta_progress_ms,
            delta_resend_ms: self.delta_resend_ms,
            delta_round_ms: self.delta_round_ms,
            delta_stage_ms: self.delta_stage_ms,
            r_max: self.r_max,
            max_epoch_jump: self.max_epoch_jump,
        }
    }

    /// The contract config as the chain would carry it, without checking it is usable.
    pub fn contract(&self) -> ContractConfig {
        let encoded = self.offchain_config().encode().expect("encode offchain config");
        ContractConfig::new(
            self.config_count,
            (0..self.oracles).map(|i| oracle_keys(i).onchain.public_key()).collect(),
            (0..self.oracles).map(|i| format!("transmitter-{i}")).collect(),
            self.threshold,
            OFFCHAIN_CONFIG_VERSION,
            encoded,
        )
    }

    pub fn build(self) -> TestNetwork {
        let keys: Vec<_> = (0..self.oracles).map(oracle_keys).collect();
        let contract = self.contract();
        let shared = SharedConfig::from_contract(contract.clone()).expect("valid test config");
        TestNetwork { keys, contract, shared }
    }
}
