//! Events the core pushes to participants through the transport port.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Ask, AuctionSnapshot, PhaseId, PhaseType, Role, TradeStats, Transaction};

/// A server-to-client event. Serialises as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Posted-offer ask list changed.
    #[serde(rename_all = "camelCase")]
    OfferBookUpdated { phase_id: PhaseId, asks: Vec<Ask> },
    /// Decentralized listings changed.
    #[serde(rename_all = "camelCase")]
    ListingBookUpdated { phase_id: PhaseId, asks: Vec<Ask> },
    /// Double-auction book changed.
    AuctionBookUpdated(AuctionSnapshot),
    /// Opening stage closed; the main stage starts with this band.
    #[serde(rename_all = "camelCase")]
    AuctionStageCompleted {
        phase_id: PhaseId,
        carry_over_bid: Decimal,
        carry_over_offer: Decimal,
    },
    /// Sent individually to each side of a double-auction match.
    #[serde(rename_all = "camelCase")]
    Matched {
        transaction: Transaction,
        role: Role,
        profit: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    PhaseStarted {
        phase_id: PhaseId,
        phase_type: PhaseType,
        time_limit_secs: u64,
    },
    #[serde(rename_all = "camelCase")]
    PhaseFinished { phase_id: PhaseId, stats: TradeStats },
}

impl ServerEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OfferBookUpdated { .. } => "offerBookUpdated",
            Self::ListingBookUpdated { .. } => "listingBookUpdated",
            Self::AuctionBookUpdated(_) => "auctionBookUpdated",
            Self::AuctionStageCompleted { .. } => "auctionStageCompleted",
            Self::Matched { .. } => "matched",
            Self::PhaseStarted { .. } => "phaseStarted",
            Self::PhaseFinished { .. } => "phaseFinished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_serde_tag() {
        let event = ServerEvent::PhaseFinished {
            phase_id: PhaseId::new(),
            stats: TradeStats::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert!(json["data"].get("phaseId").is_some());
    }
}
