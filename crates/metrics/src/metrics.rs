use crate::instrument::{Counter, Gauge, Histogram};
use crate::registry::{Registry, RegistryError};
use crate::sample::{SampleParams, DEFAULT_ALPHA, DEFAULT_RESERVOIR_SIZE};

// ═══════════════════════════════════════════════════════════════════════════
// DRIVER METRICS
// ═══════════════════════════════════════════════════════════════════════════

pub const DRIVER_L1_HEAD_HEIGHT: &str = "driver/l1Head/height";
pub const DRIVER_L2_HEAD_HEIGHT: &str = "driver/l2Head/height";
pub const DRIVER_L1_CURRENT_HEIGHT: &str = "driver/l1Current/height";
pub const DRIVER_L2_HEAD_ID: &str = "driver/l2Head/id";
pub const DRIVER_L2_VERIFIED_ID: &str = "driver/l2Verified/id";

// ═══════════════════════════════════════════════════════════════════════════
// PROPOSER METRICS
// ═══════════════════════════════════════════════════════════════════════════

pub const PROPOSER_EPOCH: &str = "proposer/epoch";
pub const PROPOSER_PROPOSED_TX_LISTS: &str = "proposer/proposed/txLists";
pub const PROPOSER_PROPOSED_TXS: &str = "proposer/proposed/txs";
pub const PROPOSER_BLOCK_FEE: &str = "proposer/blockFee";

// ═══════════════════════════════════════════════════════════════════════════
// PROVER METRICS
// ═══════════════════════════════════════════════════════════════════════════

pub const PROVER_LATEST_VERIFIED_ID: &str = "prover/latestVerified/id";
pub const PROVER_LATEST_PROVEN_ID: &str = "prover/latestProven/id";
pub const PROVER_QUEUED_PROOFS: &str = "prover/proof/all/queued";
pub const PROVER_RECEIVED_PROOFS: &str = "prover/proof/all/received";
pub const PROVER_SENT_PROOFS: &str = "prover/proof/all/sent";
pub const PROVER_PROOFS_ASSIGNED: &str = "prover/proof/assigned";
pub const PROVER_RECEIVED_PROPOSED_BLOCK: &str = "prover/proposed/received";
pub const PROVER_RECEIVED_PROVEN_BLOCK: &str = "prover/proven/received";
pub const PROVER_PSE_PROOF_GENERATION_TIME: &str = "prover/proof/pse/generation/time";
pub const PROVER_PROOF_SUBMISSION_ACCEPTED: &str = "prover/proof/submission/accepted";
pub const PROVER_PROOF_SUBMISSION_ERROR: &str = "prover/proof/submission/error";

/// Every instrument name registered by [`ClientMetrics::register`].
pub const ALL_INSTRUMENT_NAMES: [&str; 20] = [
    DRIVER_L1_HEAD_HEIGHT,
    DRIVER_L2_HEAD_HEIGHT,
    DRIVER_L1_CURRENT_HEIGHT,
    DRIVER_L2_HEAD_ID,
    DRIVER_L2_VERIFIED_ID,
    PROPOSER_EPOCH,
    PROPOSER_PROPOSED_TX_LISTS,
    PROPOSER_PROPOSED_TXS,
    PROPOSER_BLOCK_FEE,
    PROVER_LATEST_VERIFIED_ID,
    PROVER_LATEST_PROVEN_ID,
    PROVER_QUEUED_PROOFS,
    PROVER_RECEIVED_PROOFS,
    PROVER_SENT_PROOFS,
    PROVER_PROOFS_ASSIGNED,
    PROVER_RECEIVED_PROPOSED_BLOCK,
    PROVER_RECEIVED_PROVEN_BLOCK,
    PROVER_PSE_PROOF_GENERATION_TIME,
    PROVER_PROOF_SUBMISSION_ACCEPTED,
    PROVER_PROOF_SUBMISSION_ERROR,
];

/// Chain-sync progress reported by the driver
#[derive(Debug, Clone)]
pub struct DriverMetrics {
    pub l1_head_height: Gauge,
    pub l2_head_height: Gauge,
    pub l1_current_height: Gauge,
    pub l2_head_id: Gauge,
    pub l2_verified_id: Gauge,
}

impl DriverMetrics {
    fn register(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            l1_head_height: registry.register_gauge(DRIVER_L1_HEAD_HEIGHT)?,
            l2_head_height: registry.register_gauge(DRIVER_L2_HEAD_HEIGHT)?,
            l1_current_height: registry.register_gauge(DRIVER_L1_CURRENT_HEIGHT)?,
            l2_head_id: registry.register_gauge(DRIVER_L2_HEAD_ID)?,
            l2_verified_id: registry.register_gauge(DRIVER_L2_VERIFIED_ID)?,
        })
    }
}

/// Block proposal activity
#[derive(Debug, Clone)]
pub struct ProposerMetrics {
    pub epoch: Counter,
    pub proposed_tx_lists: Counter,
    pub proposed_txs: Counter,
    pub block_fee: Gauge,
}

impl ProposerMetrics {
    fn register(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            epoch: registry.register_counter(PROPOSER_EPOCH)?,
            proposed_tx_lists: registry.register_counter(PROPOSER_PROPOSED_TX_LISTS)?,
            proposed_txs: registry.register_counter(PROPOSER_PROPOSED_TXS)?,
            block_fee: registry.register_gauge(PROPOSER_BLOCK_FEE)?,
        })
    }
}

/// Proof pipeline activity
#[derive(Debug, Clone)]
pub struct ProverMetrics {
    pub latest_verified_id: Gauge,
    pub latest_proven_id: Gauge,
    pub queued_proofs: Counter,
    pub received_proofs: Counter,
    pub sent_proofs: Counter,
    pub proofs_assigned: Counter,
    pub received_proposed_block: Gauge,
    pub received_proven_block: Gauge,
    /// PSE proof generation time, decaying sample of 128 values.
    pub pse_proof_generation_time: Histogram,
    pub proof_submission_accepted: Counter,
    pub proof_submission_error: Counter,
}

impl ProverMetrics {
    fn register(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            latest_verified_id: registry.register_gauge(PROVER_LATEST_VERIFIED_ID)?,
            latest_proven_id: registry.register_gauge(PROVER_LATEST_PROVEN_ID)?,
            queued_proofs: registry.register_counter(PROVER_QUEUED_PROOFS)?,
            received_proofs: registry.register_counter(PROVER_RECEIVED_PROOFS)?,
            sent_proofs: registry.register_counter(PROVER_SENT_PROOFS)?,
            proofs_assigned: registry.register_counter(PROVER_PROOFS_ASSIGNED)?,
            received_proposed_block: registry.register_gauge(PROVER_RECEIVED_PROPOSED_BLOCK)?,
            received_proven_block: registry.register_gauge(PROVER_RECEIVED_PROVEN_BLOCK)?,
            pse_proof_generation_time: registry.register_histogram(
                PROVER_PSE_PROOF_GENERATION_TIME,
                SampleParams::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_ALPHA)?,
            )?,
            proof_submission_accepted: registry
                .register_counter(PROVER_PROOF_SUBMISSION_ACCEPTED)?,
            proof_submission_error: registry.register_counter(PROVER_PROOF_SUBMISSION_ERROR)?,
        })
    }
}

/// Instruments updated by the driver, proposer and prover.
///
/// Register once at start-up and hand clones to each subsystem; every field is
/// a cheap handle onto the shared value in the registry.
#[derive(Debug, Clone)]
pub struct ClientMetrics {
    pub driver: DriverMetrics,
    pub proposer: ProposerMetrics,
    pub prover: ProverMetrics,
}

impl ClientMetrics {
    pub fn register(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            driver: DriverMetrics::register(registry)?,
            proposer: ProposerMetrics::register(registry)?,
            prover: ProverMetrics::register(registry)?,
        })
    }
}
