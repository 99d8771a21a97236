//! Configuration for the market core.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketError, Result, constants};

/// Tunables of the price validator and lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Old units per new unit after redenomination.
    pub redenomination_factor: Decimal,
    /// Integer-digit gap that classifies a price as redenominated.
    pub redenominated_digit_gap: u32,
    /// Advisory timer assigned to newly created phases.
    pub phase_time_limit_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            redenomination_factor: Decimal::from(constants::REDENOMINATION_FACTOR),
            redenominated_digit_gap: constants::REDENOMINATED_DIGIT_GAP,
            phase_time_limit_secs: constants::DEFAULT_PHASE_TIME_LIMIT_SECS,
        }
    }
}

impl MarketConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.redenomination_factor <= Decimal::ONE {
            return Err(MarketError::Configuration(format!(
                "redenomination_factor must be greater than 1, got {}",
                self.redenomination_factor
            )));
        }
        if self.redenominated_digit_gap == 0 {
            return Err(MarketError::Configuration(
                "redenominated_digit_gap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
