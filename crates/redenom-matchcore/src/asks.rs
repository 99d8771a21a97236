//! Seller-ask market shared by the posted-offer and decentralized engines.
//!
//! Sellers post one ask per phase; any buyer may take any unsold ask priced
//! within its reservation value, at most once per phase. The two engines
//! differ only in mechanism tag, lease name and broadcast event.
//!
//! A purchase records the buyer's bargain before the transaction. If the
//! transaction write fails the ask stays unsold and the bargain remains as
//! the record of a price the buyer agreed to; only transactions count as
//! trades.

use redenom_types::{
    Ask, Bargain, ConnectionId, EntryId, MarketError, MarketMechanism, PhaseId, Result, Role,
    RoomId, ServerEvent, Transaction,
};
use rust_decimal::Decimal;

use crate::context::{MarketContext, log_rejection, require_member, require_role};
use crate::LeaseKey;

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub ask: Ask,
    pub transaction: Transaction,
}

#[derive(Clone)]
pub(crate) struct AskMarket {
    ctx: MarketContext,
    mechanism: MarketMechanism,
}

impl AskMarket {
    pub(crate) fn new(ctx: MarketContext, mechanism: MarketMechanism) -> Self {
        Self { ctx, mechanism }
    }

    pub(crate) fn context(&self) -> &MarketContext {
        &self.ctx
    }

    fn lease_key(&self, phase_id: PhaseId) -> LeaseKey {
        LeaseKey::for_mechanism(self.mechanism, phase_id)
    }

    pub(crate) fn snapshot(&self, phase_id: PhaseId) -> Vec<Ask> {
        self.ctx.store.asks(self.mechanism, phase_id)
    }

    /// Post the seller's ask. A second ask from the same seller in the same
    /// phase is accepted and ignored; the first one stands.
    pub(crate) async fn post(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<Vec<Ask>> {
        let result = self.try_post(connection, phase_id, raw_price).await;
        if let Err(err) = &result {
            log_rejection("post_ask", err);
        }
        result
    }

    async fn try_post(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<Vec<Ask>> {
        let seller = self.ctx.resolve(connection).await?;
        require_role(&seller, Role::Seller)?;
        let phase = self.ctx.running_phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        require_member(&seller, &simulation)?;
        let price = self
            .ctx
            .validator
            .validate_for(phase.phase_type, &seller, raw_price)?;

        let asks = {
            let _lease = self.ctx.leases.acquire(self.lease_key(phase_id)).await;
            // The phase may have finished while we waited for the lease.
            self.ctx.running_phase(phase_id).await?;
            self.ctx
                .repository
                .create_bargain(Bargain::new(phase_id, seller.id(), Role::Seller, price))
                .await?;

            let mut asks = self.ctx.store.asks(self.mechanism, phase_id);
            if asks.iter().any(|a| a.seller_id == seller.id()) {
                tracing::debug!(
                    mechanism = %self.mechanism,
                    phase = %phase_id,
                    seller = %seller.id(),
                    "seller already posted in this phase, keeping first ask"
                );
            } else {
                asks.push(Ask::new(self.mechanism, phase_id, seller.id(), price));
                self.ctx
                    .store
                    .replace_asks(self.mechanism, phase_id, asks.clone());
                tracing::info!(
                    mechanism = %self.mechanism,
                    phase = %phase_id,
                    seller = %seller.id(),
                    %price,
                    "ask posted"
                );
            }
            asks
        };

        self.publish(phase_id, asks.clone()).await;
        Ok(asks)
    }

    /// Buy ask `entry_id` for the buyer on `connection`.
    pub(crate) async fn buy(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        entry_id: EntryId,
    ) -> Result<Purchase> {
        let result = self.try_buy(connection, phase_id, entry_id).await;
        if let Err(err) = &result {
            log_rejection("buy_ask", err);
        }
        result
    }

    async fn try_buy(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        entry_id: EntryId,
    ) -> Result<Purchase> {
        let buyer = self.ctx.resolve(connection).await?;
        require_role(&buyer, Role::Buyer)?;
        let phase = self.ctx.running_phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        require_member(&buyer, &simulation)?;

        let (purchase, asks) = {
            let _lease = self.ctx.leases.acquire(self.lease_key(phase_id)).await;
            self.ctx.running_phase(phase_id).await?;
            let mut asks = self.ctx.store.asks(self.mechanism, phase_id);

            let idx = asks
                .iter()
                .position(|a| a.id == entry_id)
                .ok_or(MarketError::EntryNotFound(entry_id))?;
            if asks[idx].sold {
                return Err(MarketError::AlreadySold(entry_id));
            }
            if asks.iter().any(|a| a.buyer_id == Some(buyer.id())) {
                return Err(MarketError::AlreadyBought);
            }
            let price = asks[idx].price;
            let bound = buyer.reservation_value();
            if price > bound {
                return Err(MarketError::AboveReservation { price, bound });
            }
            let seller_id = asks[idx].seller_id;
            if self.ctx.repository.find_participant(seller_id).await?.is_none() {
                return Err(MarketError::missing("seller", seller_id));
            }

            let transaction = Transaction::new(phase_id, buyer.id(), seller_id, price);
            self.ctx
                .repository
                .create_bargain(Bargain::new(phase_id, buyer.id(), Role::Buyer, price))
                .await?;
            self.ctx
                .repository
                .create_transaction(transaction.clone())
                .await?;

            asks[idx].sold = true;
            asks[idx].buyer_id = Some(buyer.id());
            let ask = asks[idx].clone();
            self.ctx
                .store
                .replace_asks(self.mechanism, phase_id, asks.clone());

            tracing::info!(
                mechanism = %self.mechanism,
                phase = %phase_id,
                buyer = %buyer.id(),
                seller = %seller_id,
                %price,
                "ask sold"
            );
            (Purchase { ask, transaction }, asks)
        };

        self.publish(phase_id, asks).await;
        Ok(purchase)
    }

    /// Whether every seller of the simulation has posted.
    pub(crate) async fn phase_done(&self, phase_id: PhaseId) -> Result<bool> {
        let phase = self.ctx.phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        let sellers = self
            .ctx
            .repository
            .count_participants(simulation.id, Role::Seller)
            .await?;
        Ok(self.snapshot(phase_id).len() == sellers)
    }

    async fn publish(&self, phase_id: PhaseId, asks: Vec<Ask>) {
        let event = match self.mechanism {
            MarketMechanism::Decentralized => ServerEvent::ListingBookUpdated { phase_id, asks },
            MarketMechanism::PostedOffer | MarketMechanism::DoubleAuction => {
                ServerEvent::OfferBookUpdated { phase_id, asks }
            }
        };
        self.ctx
            .broadcaster
            .broadcast(&RoomId::phase(phase_id), event)
            .await;
    }
}
