//! Decentralized bargaining market.
//!
//! Sellers list an ask each; any buyer may take any unsold listing priced
//! within its reservation value. Listings are independent of each other:
//! there is no best or worst price kept across them.

use redenom_types::{Ask, ConnectionId, EntryId, MarketMechanism, PhaseId, Result};
use rust_decimal::Decimal;

use crate::asks::{AskMarket, Purchase};
use crate::MarketContext;

/// Engine for [`MarketMechanism::Decentralized`] simulations.
#[derive(Clone)]
pub struct DecentralizedEngine {
    market: AskMarket,
}

impl DecentralizedEngine {
    #[must_use]
    pub fn new(ctx: MarketContext) -> Self {
        Self {
            market: AskMarket::new(ctx, MarketMechanism::Decentralized),
        }
    }

    #[must_use]
    pub fn context(&self) -> &MarketContext {
        self.market.context()
    }

    pub async fn post_listing(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<Vec<Ask>> {
        self.market.post(connection, phase_id, raw_price).await
    }

    pub async fn buy_listing(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        listing_id: EntryId,
    ) -> Result<Purchase> {
        self.market.buy(connection, phase_id, listing_id).await
    }

    #[must_use]
    pub fn listings(&self, phase_id: PhaseId) -> Vec<Ask> {
        self.market.snapshot(phase_id)
    }

    pub async fn is_phase_done(&self, phase_id: PhaseId) -> Result<bool> {
        self.market.phase_done(phase_id).await
    }
}
