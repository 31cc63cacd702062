//! Error types for the chain registry and the chain-scoped configuration.

use alloy::primitives::U256;
use std::fmt;
use thiserror::Error;

use crate::blockchain::ocr::OcrViolation;
use crate::blockchain::store::StoreError;
use crate::blockchain::types::ChainId;
use crate::lifecycle::ServiceError;

/// A single broken invariant found by `ChainScopedConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("ETH_FINALITY_DEPTH must be greater than or equal to 1")]
    FinalityDepthTooLow,

    #[error(
        "ETH_HEAD_TRACKER_HISTORY_DEPTH ({history_depth}) must be equal to or greater than ETH_FINALITY_DEPTH ({finality_depth})"
    )]
    HeadTrackerHistoryBelowFinality { history_depth: u32, finality_depth: u32 },

    #[error("MIN_INCOMING_CONFIRMATIONS must be greater than or equal to 1")]
    MinIncomingConfirmationsTooLow,

    #[error("ETH_MIN_GAS_PRICE_WEI ({min}) must be less than or equal to ETH_GAS_PRICE_DEFAULT ({default})")]
    MinGasPriceAboveDefault { min: U256, default: U256 },

    #[error("ETH_MAX_GAS_PRICE_WEI ({max}) must be greater than or equal to ETH_GAS_PRICE_DEFAULT ({default})")]
    MaxGasPriceBelowDefault { max: U256, default: U256 },

    #[error(
        "ETH_GAS_BUMP_TX_DEPTH ({depth}) must be less than or equal to ETH_MAX_IN_FLIGHT_TRANSACTIONS ({max_in_flight})"
    )]
    GasBumpTxDepthAboveMaxInFlight { depth: u16, max_in_flight: u32 },

    #[error("ETH_GAS_BUMP_PERCENT of {percent} may not be less than the replacement minimum of {minimum}")]
    GasBumpPercentTooLow { percent: u16, minimum: u16 },

    #[error(
        "BLOCK_HISTORY_ESTIMATOR_BLOCK_HISTORY_SIZE must be greater than or equal to 1 if block history estimator is enabled"
    )]
    BlockHistorySizeZero,

    #[error("OCR: {0}")]
    Ocr(#[from] OcrViolation),
}

/// Errors that can occur while building, looking up or configuring chains.
#[derive(Debug, Error)]
pub enum ChainError {
    /// One or more configuration invariants are violated.
    #[error("invalid configuration for chain {chain_id}: {}", join(violations))]
    ConfigurationInvalid {
        chain_id: ChainId,
        violations: Vec<Violation>,
    },

    /// No chain is registered under the id.
    #[error("chain not found with id {0}")]
    ChainNotFound(ChainId),

    /// The chain is registered but its readiness check failed.
    #[error("chain with ID {chain_id} is not ready: {source}")]
    ChainNotReady {
        chain_id: ChainId,
        #[source]
        source: ServiceError,
    },

    /// A runtime override fell outside the resolved bounds.
    #[error("cannot set default gas price to {value}, it must be between {min} and {max}")]
    ValueOutOfBounds { value: U256, min: U256, max: U256 },

    /// A chain could not be built while constructing the registry.
    #[error("failed to build chain {chain_id}: {source}")]
    ChainBuildFailed {
        chain_id: ChainId,
        #[source]
        source: Box<ChainError>,
    },

    /// More than one record carries the same chain id.
    #[error("duplicate chain record for id {0}")]
    DuplicateChain(ChainId),

    /// A lookup was made without a target chain id.
    #[error("a chain id is required but none was configured")]
    ChainIdRequired,

    /// A node record breaks its row constraints.
    #[error("invalid node '{node}': {reason}")]
    NodeInvalid { node: String, reason: String },

    /// The network client could not be constructed.
    #[error("client initialisation failed: {0}")]
    ClientInit(String),

    /// A lifecycle call on one of the chain's services failed.
    #[error("chain {chain_id}: {source}")]
    Service {
        chain_id: ChainId,
        #[source]
        source: ServiceError,
    },

    /// Reading or writing persisted records failed.
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Aggregate of independent errors, e.g. one per chain during fan-out.
#[derive(Debug, Default)]
pub struct ChainErrors(Vec<ChainError>);

impl ChainErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ChainError) {
        self.0.push(err);
    }

    /// Append every error of another aggregate.
    pub fn extend(&mut self, other: ChainErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChainError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ChainErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ChainErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", join(&self.0))
    }
}

impl std::error::Error for ChainErrors {}

impl From<ChainError> for ChainErrors {
    fn from(err: ChainError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for ChainErrors {
    type Item = ChainError;
    type IntoIter = std::vec::IntoIter<ChainError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
