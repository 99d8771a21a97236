//! Append-only audit records: bargains, transactions and profits.
//!
//! None of these are ever mutated after creation; the repository port only
//! exposes `create_*` for them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BargainId, ParticipantId, PhaseId, ProfitId, Role, TransactionId};

/// Every price a participant submitted in a phase, matched or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bargain {
    pub id: BargainId,
    pub phase_id: PhaseId,
    pub participant_id: ParticipantId,
    pub role: Role,
    /// Normalised (non-redenominated) price.
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Bargain {
    #[must_use]
    pub fn new(phase_id: PhaseId, participant_id: ParticipantId, role: Role, price: Decimal) -> Self {
        Self {
            id: BargainId::new(),
            phase_id,
            participant_id,
            role,
            price,
            created_at: Utc::now(),
        }
    }
}

/// A completed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub phase_id: PhaseId,
    pub buyer_id: ParticipantId,
    pub seller_id: ParticipantId,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[must_use]
    pub fn new(
        phase_id: PhaseId,
        buyer_id: ParticipantId,
        seller_id: ParticipantId,
        price: Decimal,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            phase_id,
            buyer_id,
            seller_id,
            price,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trx[{}] {} buys from {} @ {}",
            self.id, self.buyer_id, self.seller_id, self.price
        )
    }
}

/// Surplus one side of a double-auction trade earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profit {
    pub id: ProfitId,
    pub phase_id: PhaseId,
    pub transaction_id: TransactionId,
    pub participant_id: ParticipantId,
    pub role: Role,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Profit {
    #[must_use]
    pub fn new(trx: &Transaction, participant_id: ParticipantId, role: Role, amount: Decimal) -> Self {
        Self {
            id: ProfitId::new(),
            phase_id: trx.phase_id,
            transaction_id: trx.id,
            participant_id,
            role,
            amount,
            created_at: Utc::now(),
        }
    }
}
