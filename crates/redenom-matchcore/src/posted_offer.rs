//! Posted-offer market.
//!
//! Each seller posts a single ask per phase and cannot revise it. Buyers
//! browse the list and take one ask each. The phase is done once every
//! seller has posted.

use redenom_types::{Ask, ConnectionId, EntryId, MarketMechanism, PhaseId, Result};
use rust_decimal::Decimal;

use crate::asks::{AskMarket, Purchase};
use crate::MarketContext;

/// Engine for [`MarketMechanism::PostedOffer`] simulations.
#[derive(Clone)]
pub struct PostedOfferEngine {
    market: AskMarket,
}

impl PostedOfferEngine {
    #[must_use]
    pub fn new(ctx: MarketContext) -> Self {
        Self {
            market: AskMarket::new(ctx, MarketMechanism::PostedOffer),
        }
    }

    #[must_use]
    pub fn context(&self) -> &MarketContext {
        self.market.context()
    }

    /// Seller posts its ask. Returns the phase's ask list after the post.
    pub async fn post_offer(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<Vec<Ask>> {
        self.market.post(connection, phase_id, raw_price).await
    }

    /// Buyer takes ask `offer_id`.
    pub async fn buy_offer(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        offer_id: EntryId,
    ) -> Result<Purchase> {
        self.market.buy(connection, phase_id, offer_id).await
    }

    #[must_use]
    pub fn offers(&self, phase_id: PhaseId) -> Vec<Ask> {
        self.market.snapshot(phase_id)
    }

    /// Lowest unsold ask, if any.
    #[must_use]
    pub fn best_offer(&self, phase_id: PhaseId) -> Option<Decimal> {
        self.offers(phase_id)
            .iter()
            .filter(|a| !a.sold)
            .map(|a| a.price)
            .min()
    }

    /// Every seller has posted.
    pub async fn is_phase_done(&self, phase_id: PhaseId) -> Result<bool> {
        self.market.phase_done(phase_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use redenom_types::fixtures::MarketFixture;
    use redenom_types::{
        Buyer, ConnectionId, MarketConfig, MarketError, MarketRepository, Participant, PhaseType,
        Role, ServerEvent, SimulationId,
    };

    use crate::LeaseKey;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    async fn setup(sellers: &[i64], buyers: &[i64]) -> (MarketFixture, PostedOfferEngine, PhaseId) {
        let fx = MarketFixture::new(MarketMechanism::PostedOffer, sellers, buyers).await;
        let ctx = MarketContext::new(fx.repo.clone(), fx.broadcaster.clone(), &MarketConfig::default());
        let phase = fx.set_running(PhaseType::PreRedenomination, true).await;
        (fx, PostedOfferEngine::new(ctx), phase)
    }

    #[tokio::test]
    async fn seller_posts_and_room_is_notified() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].price, dec(13_000));
        assert_eq!(fx.repo.bargains().await.len(), 1);

        let deliveries = fx.broadcaster.deliveries().await;
        assert!(matches!(
            deliveries.last().unwrap().event(),
            ServerEvent::OfferBookUpdated { .. }
        ));
    }

    #[tokio::test]
    async fn repost_keeps_first_ask() {
        let (_fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let seller = MarketFixture::seller_conn(0);
        engine.post_offer(&seller, phase, dec(13_000)).await.unwrap();
        let asks = engine.post_offer(&seller, phase, dec(14_000)).await.unwrap();
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].price, dec(13_000));
    }

    #[tokio::test]
    async fn buyers_cannot_post_and_sellers_cannot_buy() {
        let (_fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let err = engine
            .post_offer(&MarketFixture::buyer_conn(0), phase, dec(13_000))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::WrongRole { .. }));

        let err = engine
            .buy_offer(&MarketFixture::seller_conn(0), phase, EntryId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::WrongRole { .. }));
    }

    #[tokio::test]
    async fn rejected_when_phase_not_running() {
        let (fx, engine, _) = setup(&[12_000], &[15_000]).await;
        let idle = fx.phase(PhaseType::Transition);
        let err = engine
            .post_offer(&MarketFixture::seller_conn(0), idle, dec(13_000))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::PhaseNotRunning(_)));
        assert!(fx.repo.bargains().await.is_empty());
    }

    #[tokio::test]
    async fn buy_marks_sold_and_records_transaction() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();

        let purchase = engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap();
        assert!(purchase.ask.sold);
        assert_eq!(purchase.ask.buyer_id, Some(fx.buyers[0].id()));
        assert_eq!(purchase.transaction.price, dec(13_000));
        assert_eq!(fx.repo.transactions().await.len(), 1);
        assert!(engine.offers(phase)[0].sold);
        assert_eq!(engine.best_offer(phase), None);
    }

    #[tokio::test]
    async fn buyer_buys_once_per_phase() {
        let (_fx, engine, phase) = setup(&[12_000, 12_500, 13_000], &[20_000]).await;
        let mut ids = Vec::new();
        for (i, p) in [13_000, 13_500, 14_000].into_iter().enumerate() {
            let asks = engine
                .post_offer(&MarketFixture::seller_conn(i), phase, dec(p))
                .await
                .unwrap();
            ids.push(asks.last().unwrap().id);
        }
        let buyer = MarketFixture::buyer_conn(0);
        engine.buy_offer(&buyer, phase, ids[0]).await.unwrap();
        for id in &ids[1..] {
            let err = engine.buy_offer(&buyer, phase, *id).await.unwrap_err();
            assert!(matches!(err, MarketError::AlreadyBought));
            assert!(err.to_string().contains("bought once"));
        }
    }

    #[tokio::test]
    async fn sold_ask_cannot_be_bought_again() {
        let (_fx, engine, phase) = setup(&[12_000], &[15_000, 16_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap();
        let err = engine
            .buy_offer(&MarketFixture::buyer_conn(1), phase, asks[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::AlreadySold(_)));
    }

    #[tokio::test]
    async fn price_above_buyer_value_rejected() {
        let (fx, engine, phase) = setup(&[12_000], &[12_500]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        let err = engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::AboveReservation { .. }));
        assert!(!engine.offers(phase)[0].sold);
        assert!(fx.repo.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn missing_seller_aborts_without_mutation() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        fx.repo.remove_participant(fx.sellers[0].id()).await;

        let err = engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(!engine.offers(phase)[0].sold);
    }

    #[tokio::test]
    async fn failed_transaction_write_leaves_ask_unsold() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        fx.repo.fail_record_writes(true);
        let err = engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Persistence(_)));
        assert!(!engine.offers(phase)[0].sold);
    }

    #[tokio::test]
    async fn phase_done_when_every_seller_posted() {
        let (_fx, engine, phase) = setup(&[12_000, 12_500], &[15_000]).await;
        engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        assert!(!engine.is_phase_done(phase).await.unwrap());
        engine
            .post_offer(&MarketFixture::seller_conn(1), phase, dec(13_000))
            .await
            .unwrap();
        assert!(engine.is_phase_done(phase).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_buyers_only_one_wins() {
        let buyers = [20_000; 8];
        let (fx, engine, phase) = setup(&[12_000], &buyers).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        let target = asks[0].id;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..buyers.len() {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .buy_offer(&MarketFixture::buyer_conn(i), phase, target)
                    .await
            }));
        }
        let mut wins = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(matches!(err, MarketError::AlreadySold(_))),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(fx.repo.transactions().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_buyer_racing_for_two_asks_buys_once() {
        let (fx, engine, phase) = setup(&[12_000, 12_000], &[20_000]).await;
        let a = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        let b = engine
            .post_offer(&MarketFixture::seller_conn(1), phase, dec(13_000))
            .await
            .unwrap();
        let ids = [a[0].id, b[1].id];
        let engine = Arc::new(engine);

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine.buy_offer(&MarketFixture::buyer_conn(0), phase, id).await
                })
            })
            .collect();
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(fx.repo.transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn buyer_from_another_simulation_rejected() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();

        let mut outsider = Participant::Buyer(Buyer::new(SimulationId::new(), dec(20_000)));
        outsider.bind_connection(ConnectionId::new("outsider"));
        fx.repo.save_participant(outsider).await.unwrap();

        let err = engine
            .buy_offer(&ConnectionId::new("outsider"), phase, asks[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::ForeignParticipant { .. }));
        assert_eq!(err.status_code(), 400);
        assert!(fx.repo.transactions().await.is_empty());
        assert!(!engine.offers(phase)[0].sold);
    }

    #[tokio::test]
    async fn buy_waiting_on_lease_fails_once_phase_stops() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        let target = asks[0].id;

        let held = engine.context().leases.acquire(LeaseKey::OfferBook(phase)).await;
        let buy = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .buy_offer(&MarketFixture::buyer_conn(0), phase, target)
                    .await
            })
        };
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        fx.set_running(PhaseType::PreRedenomination, false).await;
        drop(held);

        let err = buy.await.unwrap().unwrap_err();
        assert!(matches!(err, MarketError::PhaseNotRunning(_)));
        assert!(fx.repo.transactions().await.is_empty());
        assert!(!engine.offers(phase)[0].sold);
    }

    #[tokio::test]
    async fn failed_trade_write_keeps_only_the_buyer_bargain() {
        let (fx, engine, phase) = setup(&[12_000], &[15_000]).await;
        let asks = engine
            .post_offer(&MarketFixture::seller_conn(0), phase, dec(13_000))
            .await
            .unwrap();
        fx.repo.fail_transaction_writes(true);

        let err = engine
            .buy_offer(&MarketFixture::buyer_conn(0), phase, asks[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Persistence(_)));
        assert!(!engine.offers(phase)[0].sold);
        assert!(fx.repo.transactions().await.is_empty());
        let bargains = fx.repo.bargains().await;
        assert_eq!(bargains.len(), 2);
        assert!(bargains.iter().any(|b| b.role == Role::Buyer));
    }
}
