//! Routing participant actions to the engines.

use redenom_matchcore::{
    AuctionOutcome, DecentralizedEngine, DoubleAuctionEngine, MarketContext, PostedOfferEngine,
    Purchase,
};
use redenom_types::{
    ConnectionId, ErrorClass, MarketError, MarketMechanism, PhaseId, Response, Result,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{Action, Envelope, Identity};

/// Front door for every participant message.
pub struct Dispatcher {
    ctx: MarketContext,
    identity: Identity,
    posted_offer: PostedOfferEngine,
    double_auction: DoubleAuctionEngine,
    decentralized: DecentralizedEngine,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ctx: MarketContext) -> Self {
        Self {
            identity: Identity::new(ctx.repository.clone()),
            posted_offer: PostedOfferEngine::new(ctx.clone()),
            double_auction: DoubleAuctionEngine::new(ctx.clone()),
            decentralized: DecentralizedEngine::new(ctx.clone()),
            ctx,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Decode, route and wrap one transport message. Never fails: errors
    /// become error envelopes.
    pub async fn dispatch(&self, envelope: &Envelope) -> Response {
        let sender = &envelope.sender_connection_id;
        let result = match envelope.action() {
            Ok(action) => self.handle(sender, action).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(response) => response,
            Err(err) => {
                if err.class() == ErrorClass::Integrity {
                    tracing::error!(kind = %envelope.kind, %sender, error = %err, "action failed");
                } else {
                    tracing::debug!(kind = %envelope.kind, %sender, error = %err, "action rejected");
                }
                Response::from_error(&err)
            }
        }
    }

    /// Run a typed action on behalf of `sender`.
    pub async fn handle(&self, sender: &ConnectionId, action: Action) -> Result<Response> {
        if let (Some(mechanism), Some(phase_id)) = (action.mechanism(), action.phase_id()) {
            self.check_mechanism(phase_id, mechanism).await?;
        }
        tracing::trace!(kind = action.name(), %sender, "dispatching action");

        match action {
            Action::Join {
                participant_id,
                login_token,
            } => {
                let participant = self
                    .identity
                    .join(sender, participant_id, &login_token)
                    .await?;
                ok("Joined", &participant)
            }
            Action::Ready => {
                let ready = self.identity.set_ready(sender).await?;
                Ok(Response::ok("Ready", json!({ "readyCount": ready })))
            }
            Action::PostOffer { phase_id, price } => {
                let asks = self.posted_offer.post_offer(sender, phase_id, price).await?;
                ok("Offer posted", &asks)
            }
            Action::BuyOffer { phase_id, offer_id } => {
                let purchase = self.posted_offer.buy_offer(sender, phase_id, offer_id).await?;
                Ok(Response::ok("Offer bought", purchase_data(&purchase)?))
            }
            Action::SubmitAuctionPrice { phase_id, price } => {
                let outcome = self.double_auction.submit(sender, phase_id, price).await?;
                let message = if outcome.transaction.is_some() {
                    "Matched"
                } else {
                    "Price submitted"
                };
                Ok(Response::ok(message, outcome_data(&outcome)?))
            }
            Action::PostListing { phase_id, price } => {
                let asks = self
                    .decentralized
                    .post_listing(sender, phase_id, price)
                    .await?;
                ok("Listing posted", &asks)
            }
            Action::BuyListing {
                phase_id,
                listing_id,
            } => {
                let purchase = self
                    .decentralized
                    .buy_listing(sender, phase_id, listing_id)
                    .await?;
                Ok(Response::ok("Listing bought", purchase_data(&purchase)?))
            }
            Action::OfferBook { phase_id } => {
                let offers = self.posted_offer.offers(phase_id);
                let best = self.posted_offer.best_offer(phase_id);
                Ok(Response::ok(
                    "Offer book",
                    json!({ "offers": offers, "bestOffer": best }),
                ))
            }
            Action::AuctionBook { phase_id } => {
                ok("Auction book", &self.double_auction.snapshot(phase_id))
            }
            Action::ListingBook { phase_id } => {
                ok("Listing book", &self.decentralized.listings(phase_id))
            }
        }
    }

    async fn check_mechanism(&self, phase_id: PhaseId, requested: MarketMechanism) -> Result<()> {
        let phase = self.ctx.phase(phase_id).await?;
        let simulation = self.ctx.simulation_of(&phase).await?;
        if simulation.mechanism != requested {
            return Err(MarketError::WrongMechanism {
                requested,
                actual: simulation.mechanism,
            });
        }
        Ok(())
    }
}

fn ok<T: Serialize>(message: &str, data: &T) -> Result<Response> {
    Ok(Response::ok(message, serde_json::to_value(data)?))
}

fn purchase_data(purchase: &Purchase) -> Result<Value> {
    Ok(json!({
        "ask": serde_json::to_value(&purchase.ask)?,
        "transaction": serde_json::to_value(&purchase.transaction)?,
    }))
}

fn outcome_data(outcome: &AuctionOutcome) -> Result<Value> {
    Ok(json!({
        "snapshot": serde_json::to_value(&outcome.snapshot)?,
        "transaction": serde_json::to_value(&outcome.transaction)?,
        "stageCompleted": outcome.stage_completed,
    }))
}
