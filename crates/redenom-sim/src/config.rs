//! Scripted-run configuration.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use redenom_types::{MarketConfig, MarketMechanism};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One scripted session: who trades, what they value, how they quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub market: MarketConfig,
    pub mechanism: MarketMechanism,
    pub session_name: String,
    pub goods: String,
    /// Sellers' unit costs on the pre-redenomination scale.
    pub seller_costs: Vec<Decimal>,
    /// Buyers' unit values on the pre-redenomination scale.
    pub buyer_values: Vec<Decimal>,
    /// Fraction added to cost (sellers) or taken off value (buyers) when
    /// quoting.
    pub markup: Decimal,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            mechanism: MarketMechanism::PostedOffer,
            session_name: "scripted session".to_string(),
            goods: "Rice".to_string(),
            seller_costs: [11_000, 12_000, 13_000].map(Decimal::from).to_vec(),
            buyer_values: [18_000, 17_000, 16_000].map(Decimal::from).to_vec(),
            markup: Decimal::new(15, 2),
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw).context("parsing sim config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.market.validate()?;
        ensure!(!self.seller_costs.is_empty(), "at least one seller is required");
        ensure!(!self.buyer_values.is_empty(), "at least one buyer is required");
        ensure!(
            self.seller_costs
                .iter()
                .chain(&self.buyer_values)
                .all(|v| *v > Decimal::ZERO),
            "reservation values must be positive"
        );
        ensure!(
            self.markup >= Decimal::ZERO && self.markup < Decimal::ONE,
            "markup must lie in [0, 1)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = SimConfig::from_json_str(
            r#"{"mechanism": "doubleAuction", "market": {"phase_time_limit_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(cfg.mechanism, MarketMechanism::DoubleAuction);
        assert_eq!(cfg.market.phase_time_limit_secs, 30);
        assert_eq!(cfg.seller_costs.len(), 3);
    }

    #[test]
    fn rejects_empty_side() {
        let err = SimConfig::from_json_str(r#"{"buyer_values": []}"#).unwrap_err();
        assert!(err.to_string().contains("buyer"));
    }
}
