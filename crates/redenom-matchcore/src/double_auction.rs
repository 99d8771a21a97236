//! Two-stage continuous double auction.
//!
//! **Opening stage.** Every participant submits exactly one sealed price.
//! When asks + bids + 2 × recorded transactions equals the simulation's
//! participant count, the stage closes: the lowest ask and the lowest bid
//! become the carry-over band, the book is cleared and the main stage
//! begins.
//!
//! **Main stage.** Prices must lie inside the carry-over band. A submission
//! trades only against an opposite entry at exactly the same price; there
//! is no crossing match. A trade persists one transaction and two profit
//! records, notifies both parties individually and removes both entries.

use redenom_types::{
    AuctionEntry, AuctionSnapshot, AuctionStage, Bargain, ConnectionId, MarketError, Participant,
    PhaseId, Profit, Result, Role, RoomId, ServerEvent, Transaction,
};
use rust_decimal::Decimal;

use crate::context::{MarketContext, log_rejection, require_member};
use crate::store::AuctionBook;
use crate::LeaseKey;

/// What a submission did to the book.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionOutcome {
    /// Book after the submission.
    pub snapshot: AuctionSnapshot,
    /// Set when the submission matched.
    pub transaction: Option<Transaction>,
    /// Set when the submission closed the opening stage.
    pub stage_completed: bool,
}

struct Fill {
    transaction: Transaction,
    buyer_connection: Option<ConnectionId>,
    seller_connection: Option<ConnectionId>,
    buyer_profit: Decimal,
    seller_profit: Decimal,
}

/// Engine for double-auction simulations.
#[derive(Clone)]
pub struct DoubleAuctionEngine {
    ctx: MarketContext,
}

impl DoubleAuctionEngine {
    #[must_use]
    pub fn new(ctx: MarketContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &MarketContext {
        &self.ctx
    }

    #[must_use]
    pub fn snapshot(&self, phase_id: PhaseId) -> AuctionSnapshot {
        self.ctx.store.auction(phase_id).snapshot(phase_id)
    }

    /// Submit a bid (buyer) or ask (seller).
    pub async fn submit(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<AuctionOutcome> {
        let result = self.try_submit(connection, phase_id, raw_price).await;
        if let Err(err) = &result {
            log_rejection("auction_submit", err);
        }
        result
    }

    /// True once recorded transactions reach half the participant count.
    pub async fn all_sold(&self, phase_id: PhaseId) -> Result<bool> {
        let phase = self.ctx.phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        let recorded = self.ctx.repository.count_transactions(phase_id).await?;
        Ok(recorded * 2 >= simulation.participant_number)
    }

    async fn try_submit(
        &self,
        connection: &ConnectionId,
        phase_id: PhaseId,
        raw_price: Decimal,
    ) -> Result<AuctionOutcome> {
        let participant = self.ctx.resolve(connection).await?;
        let phase = self.ctx.running_phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        require_member(&participant, &simulation)?;
        let price = self
            .ctx
            .validator
            .validate_for(phase.phase_type, &participant, raw_price)?;

        let (outcome, fill) = {
            let _lease = self.ctx.leases.acquire(LeaseKey::AuctionBook(phase_id)).await;
            // The phase may have finished while we waited for the lease.
            self.ctx.running_phase(phase_id).await?;
            let mut book = self.ctx.store.auction(phase_id);

            let stage = book.stage;
            let (fill, stage_completed) = match stage {
                AuctionStage::Opening => {
                    let closed = self
                        .open(&mut book, &participant, phase_id, price, simulation.participant_number)
                        .await?;
                    (None, closed)
                }
                AuctionStage::Main {
                    carry_over_bid,
                    carry_over_offer,
                } => {
                    let fill = self
                        .continuous(
                            &mut book,
                            &participant,
                            phase_id,
                            price,
                            (carry_over_bid, carry_over_offer),
                        )
                        .await?;
                    (fill, false)
                }
            };

            let outcome = AuctionOutcome {
                snapshot: book.snapshot(phase_id),
                transaction: fill.as_ref().map(|f| f.transaction.clone()),
                stage_completed,
            };
            self.ctx.store.replace_auction(phase_id, book);
            (outcome, fill)
        };

        self.notify(phase_id, &outcome, fill).await;
        Ok(outcome)
    }

    async fn open(
        &self,
        book: &mut AuctionBook,
        participant: &Participant,
        phase_id: PhaseId,
        price: Decimal,
        participant_number: usize,
    ) -> Result<bool> {
        let id = participant.id();
        let role = participant.role();
        if book.submitted.contains(&id) {
            return Err(MarketError::AlreadySubmitted);
        }
        self.ctx
            .repository
            .create_bargain(Bargain::new(phase_id, id, role, price))
            .await?;

        book.side_mut(role)
            .push(AuctionEntry::new(phase_id, id, role, price));
        book.submitted.insert(id);
        book.refresh_best();
        tracing::debug!(phase = %phase_id, participant = %id, %role, %price, "opening price accepted");

        let recorded = self.ctx.repository.count_transactions(phase_id).await?;
        if book.opening_count(recorded) != participant_number {
            return Ok(false);
        }

        let lowest_ask = book.asks.iter().map(|e| e.price).min();
        let lowest_bid = book.bids.iter().map(|e| e.price).min();
        let (floor, ceiling) = match (lowest_bid, lowest_ask) {
            (Some(bid), Some(ask)) => (bid.min(ask), bid.max(ask)),
            (Some(p), None) | (None, Some(p)) => (p, p),
            (None, None) => return Ok(false),
        };

        book.asks.clear();
        book.bids.clear();
        book.submitted.clear();
        book.refresh_best();
        book.stage = AuctionStage::Main {
            carry_over_bid: floor,
            carry_over_offer: ceiling,
        };
        tracing::info!(
            phase = %phase_id,
            carry_over_bid = %floor,
            carry_over_offer = %ceiling,
            "opening stage closed"
        );
        Ok(true)
    }

    async fn continuous(
        &self,
        book: &mut AuctionBook,
        participant: &Participant,
        phase_id: PhaseId,
        price: Decimal,
        (floor, ceiling): (Decimal, Decimal),
    ) -> Result<Option<Fill>> {
        let id = participant.id();
        let role = participant.role();
        if book.traded.contains(&id) {
            return Err(MarketError::AlreadyTraded);
        }
        if price < floor || price > ceiling {
            return Err(MarketError::OutsideBand {
                price,
                floor,
                ceiling,
            });
        }
        self.ctx
            .repository
            .create_bargain(Bargain::new(phase_id, id, role, price))
            .await?;

        let Some(counter) = book.exact_counter(role, price).cloned() else {
            book.withdraw(id);
            book.side_mut(role)
                .push(AuctionEntry::new(phase_id, id, role, price));
            book.refresh_best();
            tracing::debug!(phase = %phase_id, participant = %id, %role, %price, "quote queued");
            return Ok(None);
        };

        let other = self
            .ctx
            .repository
            .find_participant(counter.participant_id)
            .await?
            .ok_or_else(|| MarketError::missing("participant", counter.participant_id))?;
        let (buyer, seller) = match role {
            Role::Buyer => (participant, &other),
            Role::Seller => (&other, participant),
        };

        let transaction = Transaction::new(phase_id, buyer.id(), seller.id(), price);
        let buyer_profit = buyer.profit_at(price);
        let seller_profit = seller.profit_at(price);
        self.ctx
            .repository
            .create_transaction(transaction.clone())
            .await?;
        self.ctx
            .repository
            .create_profit(Profit::new(&transaction, buyer.id(), Role::Buyer, buyer_profit))
            .await?;
        self.ctx
            .repository
            .create_profit(Profit::new(&transaction, seller.id(), Role::Seller, seller_profit))
            .await?;

        book.remove_entry(&counter);
        book.withdraw(id);
        book.matched_pairs += 1;
        book.traded.insert(buyer.id());
        book.traded.insert(seller.id());
        book.refresh_best();
        tracing::info!(
            phase = %phase_id,
            buyer = %buyer.id(),
            seller = %seller.id(),
            %price,
            "double auction match"
        );

        Ok(Some(Fill {
            transaction,
            buyer_connection: buyer.connection().cloned(),
            seller_connection: seller.connection().cloned(),
            buyer_profit,
            seller_profit,
        }))
    }

    async fn notify(&self, phase_id: PhaseId, outcome: &AuctionOutcome, fill: Option<Fill>) {
        let broadcaster = &self.ctx.broadcaster;
        if let Some(fill) = fill {
            let sides = [
                (fill.buyer_connection, Role::Buyer, fill.buyer_profit),
                (fill.seller_connection, Role::Seller, fill.seller_profit),
            ];
            for (connection, role, profit) in sides {
                if let Some(connection) = connection {
                    let event = ServerEvent::Matched {
                        transaction: fill.transaction.clone(),
                        role,
                        profit,
                    };
                    broadcaster.emit_to(&connection, event).await;
                }
            }
        }

        let room = RoomId::phase(phase_id);
        if let (
            true,
            AuctionStage::Main {
                carry_over_bid,
                carry_over_offer,
            },
        ) = (outcome.stage_completed, outcome.snapshot.stage)
        {
            let event = ServerEvent::AuctionStageCompleted {
                phase_id,
                carry_over_bid,
                carry_over_offer,
            };
            broadcaster.broadcast(&room, event).await;
        }
        broadcaster
            .broadcast(&room, ServerEvent::AuctionBookUpdated(outcome.snapshot.clone()))
            .await;
    }
}
