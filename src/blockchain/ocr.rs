//! Local timing block of the off-chain reporting protocol.
//!
//! The resolver assembles an [`OcrLocalConfig`] from its resolved values and
//! folds every [`OcrViolation`] into its own validation result.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::blockchain::env::format_duration;
use crate::blockchain::types::duration_str;

/// Timing parameters a node applies locally while taking part in OCR rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OcrLocalConfig {
    #[serde(with = "duration_str")]
    pub blockchain_timeout: Duration,
    pub contract_config_confirmations: u16,
    #[serde(with = "duration_str")]
    pub contract_config_tracker_poll_interval: Duration,
    #[serde(with = "duration_str")]
    pub contract_config_tracker_subscribe_interval: Duration,
    #[serde(with = "duration_str")]
    pub contract_transmitter_transmit_timeout: Duration,
    #[serde(with = "duration_str")]
    pub database_timeout: Duration,
    #[serde(with = "duration_str")]
    pub data_source_timeout: Duration,
    #[serde(with = "duration_str")]
    pub data_source_grace_period: Duration,
}

/// A timing value outside its accepted range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} of {value} must be between {min} and {max}")]
pub struct OcrViolation {
    pub field: &'static str,
    pub value: String,
    pub min: String,
    pub max: String,
}

impl OcrLocalConfig {
    /// Check every field against its range and report all violations.
    pub fn sanity_check(&self) -> Vec<OcrViolation> {
        let mut violations = Vec::new();

        check_duration(
            &mut violations,
            "blockchain timeout",
            self.blockchain_timeout,
            Duration::from_secs(1),
            Duration::from_secs(20),
        );
        check_range(
            &mut violations,
            "contract config confirmations",
            self.contract_config_confirmations,
            1,
            100,
        );
        check_duration(
            &mut violations,
            "contract config tracker poll interval",
            self.contract_config_tracker_poll_interval,
            Duration::from_secs(15),
            Duration::from_secs(120),
        );
        check_duration(
            &mut violations,
            "contract config tracker subscribe interval",
            self.contract_config_tracker_subscribe_interval,
            Duration::ZERO,
            Duration::from_secs(5 * 60),
        );
        check_duration(
            &mut violations,
            "contract transmitter transmit timeout",
            self.contract_transmitter_transmit_timeout,
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        check_duration(
            &mut violations,
            "database timeout",
            self.database_timeout,
            Duration::from_millis(100),
            Duration::from_secs(10),
        );
        check_duration(
            &mut violations,
            "data source timeout",
            self.data_source_timeout,
            Duration::from_secs(1),
            Duration::from_secs(20),
        );
        check_duration(
            &mut violations,
            "data source grace period",
            self.data_source_grace_period,
            Duration::from_millis(1),
            Duration::from_secs(20),
        );

        violations
    }
}

fn check_range<T: PartialOrd + fmt::Display>(
    out: &mut Vec<OcrViolation>,
    field: &'static str,
    value: T,
    min: T,
    max: T,
) {
    if value < min || value > max {
        out.push(OcrViolation {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
}

fn check_duration(
    out: &mut Vec<OcrViolation>,
    field: &'static str,
    value: Duration,
    min: Duration,
    max: Duration,
) {
    if value < min || value > max {
        out.push(OcrViolation {
            field,
            value: format_duration(value),
            min: format_duration(min),
            max: format_duration(max),
        });
    }
}
