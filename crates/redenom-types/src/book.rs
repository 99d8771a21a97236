//! Ephemeral order-book records.
//!
//! These live only in memory, are scoped to one phase and are destroyed
//! when that phase starts or finishes. Each mechanism gets a plain record;
//! there is no shared base type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntryId, MarketMechanism, ParticipantId, PhaseId, Role};

/// A seller's ask in the posted-offer or decentralized market.
///
/// `mechanism` tags which book the ask belongs to. `sold` flips from
/// `false` to `true` exactly once, at which point `buyer_id` is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ask {
    pub id: EntryId,
    pub mechanism: MarketMechanism,
    pub phase_id: PhaseId,
    pub seller_id: ParticipantId,
    pub price: Decimal,
    pub sold: bool,
    pub buyer_id: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
}

impl Ask {
    #[must_use]
    pub fn new(
        mechanism: MarketMechanism,
        phase_id: PhaseId,
        seller_id: ParticipantId,
        price: Decimal,
    ) -> Self {
        Self {
            id: EntryId::new(),
            mechanism,
            phase_id,
            seller_id,
            price,
            sold: false,
            buyer_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A price point in the double-auction book. Sellers' entries are asks,
/// buyers' entries are bids; `role` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEntry {
    pub id: EntryId,
    pub phase_id: PhaseId,
    pub participant_id: ParticipantId,
    pub role: Role,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl AuctionEntry {
    #[must_use]
    pub fn new(phase_id: PhaseId, participant_id: ParticipantId, role: Role, price: Decimal) -> Self {
        Self {
            id: EntryId::new(),
            phase_id,
            participant_id,
            role,
            price,
            created_at: Utc::now(),
        }
    }
}

/// Stage of the two-stage double-auction protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum AuctionStage {
    /// Sealed opening stage: one price per participant.
    #[default]
    Opening,
    /// Continuous stage; prices must lie in `[carry_over_bid, carry_over_offer]`.
    #[serde(rename_all = "camelCase")]
    Main {
        carry_over_bid: Decimal,
        carry_over_offer: Decimal,
    },
}

impl AuctionStage {
    #[must_use]
    pub fn is_main(&self) -> bool {
        matches!(self, Self::Main { .. })
    }
}

/// Read-only view of a phase's double-auction book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSnapshot {
    pub phase_id: PhaseId,
    pub stage: AuctionStage,
    pub asks: Vec<AuctionEntry>,
    pub bids: Vec<AuctionEntry>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub matched_pairs: usize,
}
