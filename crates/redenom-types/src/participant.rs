//! Buyers and sellers.
//!
//! A participant is modelled as a tagged variant instead of two unrelated
//! records: matching and price validation only ever need the role and the
//! reservation value, both exposed on [`Participant`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConnectionId, ParticipantId, Role, SimulationId};

/// A buyer. `unit_value` is the most it is willing to pay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: ParticipantId,
    pub simulation_id: SimulationId,
    pub unit_value: Decimal,
    pub connection: Option<ConnectionId>,
    pub logged_in: bool,
    pub ready: bool,
}

/// A seller. `unit_cost` is the least it is willing to accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: ParticipantId,
    pub simulation_id: SimulationId,
    pub unit_cost: Decimal,
    pub connection: Option<ConnectionId>,
    pub logged_in: bool,
    pub ready: bool,
}

impl Buyer {
    #[must_use]
    pub fn new(simulation_id: SimulationId, unit_value: Decimal) -> Self {
        Self {
            id: ParticipantId::new(),
            simulation_id,
            unit_value,
            connection: None,
            logged_in: false,
            ready: false,
        }
    }
}

impl Seller {
    #[must_use]
    pub fn new(simulation_id: SimulationId, unit_cost: Decimal) -> Self {
        Self {
            id: ParticipantId::new(),
            simulation_id,
            unit_cost,
            connection: None,
            logged_in: false,
            ready: false,
        }
    }
}

/// Either side of the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum Participant {
    Buyer(Buyer),
    Seller(Seller),
}

impl Participant {
    #[must_use]
    pub fn id(&self) -> ParticipantId {
        match self {
            Self::Buyer(b) => b.id,
            Self::Seller(s) => s.id,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Buyer(_) => Role::Buyer,
            Self::Seller(_) => Role::Seller,
        }
    }

    /// Buyer: maximum willingness to pay. Seller: minimum willingness to accept.
    #[must_use]
    pub fn reservation_value(&self) -> Decimal {
        match self {
            Self::Buyer(b) => b.unit_value,
            Self::Seller(s) => s.unit_cost,
        }
    }

    #[must_use]
    pub fn simulation_id(&self) -> SimulationId {
        match self {
            Self::Buyer(b) => b.simulation_id,
            Self::Seller(s) => s.simulation_id,
        }
    }

    #[must_use]
    pub fn connection(&self) -> Option<&ConnectionId> {
        match self {
            Self::Buyer(b) => b.connection.as_ref(),
            Self::Seller(s) => s.connection.as_ref(),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Buyer(b) => b.ready,
            Self::Seller(s) => s.ready,
        }
    }

    /// Bind a live connection, replacing any previous one.
    pub fn bind_connection(&mut self, connection: ConnectionId) {
        let (slot, logged_in) = self.session_flags_mut();
        *slot = Some(connection);
        *logged_in = true;
    }

    /// Drop the live connection. The ready flag is kept.
    pub fn clear_connection(&mut self) {
        let (slot, logged_in) = self.session_flags_mut();
        *slot = None;
        *logged_in = false;
    }

    pub fn set_ready(&mut self, ready: bool) {
        match self {
            Self::Buyer(b) => b.ready = ready,
            Self::Seller(s) => s.ready = ready,
        }
    }

    /// Profit of a trade at `price` measured against the reservation value.
    #[must_use]
    pub fn profit_at(&self, price: Decimal) -> Decimal {
        match self {
            Self::Buyer(b) => b.unit_value - price,
            Self::Seller(s) => price - s.unit_cost,
        }
    }

    fn session_flags_mut(&mut self) -> (&mut Option<ConnectionId>, &mut bool) {
        match self {
            Self::Buyer(b) => (&mut b.connection, &mut b.logged_in),
            Self::Seller(s) => (&mut s.connection, &mut s.logged_in),
        }
    }
}

impl From<Buyer> for Participant {
    fn from(b: Buyer) -> Self {
        Self::Buyer(b)
    }
}

impl From<Seller> for Participant {
    fn from(s: Seller) -> Self {
        Self::Seller(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_and_reservation_value() {
        let sim = SimulationId::new();
        let buyer: Participant = Buyer::new(sim, Decimal::new(12_000, 0)).into();
        let seller: Participant = Seller::new(sim, Decimal::new(9_000, 0)).into();

        assert_eq!(buyer.role(), Role::Buyer);
        assert_eq!(buyer.reservation_value(), Decimal::new(12_000, 0));
        assert_eq!(seller.role(), Role::Seller);
        assert_eq!(seller.reservation_value(), Decimal::new(9_000, 0));
    }

    #[test]
    fn profit_sign_follows_role() {
        let sim = SimulationId::new();
        let buyer: Participant = Buyer::new(sim, Decimal::new(12_000, 0)).into();
        let seller: Participant = Seller::new(sim, Decimal::new(9_000, 0)).into();
        let price = Decimal::new(10_000, 0);

        assert_eq!(buyer.profit_at(price), Decimal::new(2_000, 0));
        assert_eq!(seller.profit_at(price), Decimal::new(1_000, 0));
    }

    #[test]
    fn connection_binding_replaces_previous() {
        let mut p: Participant = Buyer::new(SimulationId::new(), Decimal::ONE).into();
        p.bind_connection(ConnectionId::new("a"));
        p.bind_connection(ConnectionId::new("b"));
        assert_eq!(p.connection(), Some(&ConnectionId::new("b")));

        p.clear_connection();
        assert!(p.connection().is_none());
    }
}
