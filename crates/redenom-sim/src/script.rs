//! A scripted session driven through the same action path a transport
//! would use.
//!
//! Sellers quote cost plus markup, buyers quote value minus markup. In the
//! transition phase every other participant quotes on the redenominated
//! scale; after it everybody does.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use redenom_ingress::{Action, Dispatcher, Envelope};
use redenom_lifecycle::Lifecycle;
use redenom_matchcore::MarketContext;
use redenom_types::{
    Ask, AuctionSnapshot, AuctionStage, Buyer, ConnectionId, Goods, InMemoryRepository,
    MarketMechanism, MarketRepository, Participant, Phase, PhaseId, PhaseType,
    RecordingBroadcaster, Response, Seller, Simulation,
};
use rust_decimal::Decimal;

use crate::config::SimConfig;

/// In-memory market wired for one scripted run.
pub struct ScriptedMarket {
    config: SimConfig,
    repo: Arc<InMemoryRepository>,
    broadcaster: Arc<RecordingBroadcaster>,
    lifecycle: Lifecycle,
    dispatcher: Dispatcher,
}

impl ScriptedMarket {
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let ctx = MarketContext::new(repo.clone(), broadcaster.clone(), &config.market);
        Self {
            lifecycle: Lifecycle::new(ctx.clone(), &config.market),
            dispatcher: Dispatcher::new(ctx),
            config,
            repo,
            broadcaster,
        }
    }

    #[must_use]
    pub fn broadcaster(&self) -> &RecordingBroadcaster {
        &self.broadcaster
    }

    /// Seed a simulation, run one full session and return the simulation
    /// with its refreshed aggregates.
    pub async fn run(&self) -> Result<Simulation> {
        let simulation = self.seed().await?;
        let (session, phases) = self
            .lifecycle
            .create_session(simulation.id, &self.config.session_name)
            .await?;
        tracing::info!(session = %session.id, "running scripted session");

        for phase in &phases {
            self.lifecycle.start_phase(phase.id).await?;
            match self.config.mechanism {
                MarketMechanism::PostedOffer | MarketMechanism::Decentralized => {
                    self.trade_asks(phase).await?;
                }
                MarketMechanism::DoubleAuction => self.trade_auction(phase).await?,
            }
            let finished = self.lifecycle.finish_phase(phase.id).await?;
            tracing::info!(
                phase_type = %finished.phase_type,
                trades = %finished.stats.avg_trx_occurrence,
                avg_price = %finished.stats.avg_trx_price,
                "phase summary"
            );
        }

        self.repo
            .find_simulation(simulation.id)
            .await?
            .context("simulation vanished during the run")
    }

    async fn seed(&self) -> Result<Simulation> {
        let cfg = &self.config;
        let simulation = Simulation::new(
            cfg.mechanism,
            Goods {
                name: cfg.goods.clone(),
                unit: "unit".to_string(),
                picture: None,
            },
            cfg.seller_costs.len() + cfg.buyer_values.len(),
        );
        self.repo.save_simulation(simulation.clone()).await?;

        for (i, cost) in cfg.seller_costs.iter().enumerate() {
            let seller = Seller::new(simulation.id, *cost);
            self.enroll(&simulation, seller.into(), seller_conn(i)).await?;
        }
        for (i, value) in cfg.buyer_values.iter().enumerate() {
            let buyer = Buyer::new(simulation.id, *value);
            self.enroll(&simulation, buyer.into(), buyer_conn(i)).await?;
        }
        tracing::info!(
            simulation = %simulation.id,
            participants = simulation.participant_number,
            "simulation seeded"
        );
        Ok(simulation)
    }

    /// Persist a participant, then join and ready it over `connection`.
    async fn enroll(
        &self,
        simulation: &Simulation,
        participant: Participant,
        connection: ConnectionId,
    ) -> Result<()> {
        let participant_id = participant.id();
        self.repo.save_participant(participant).await?;
        let join = Action::Join {
            participant_id,
            login_token: simulation.login_token.clone(),
        };
        self.send(&connection, &join).await?;
        self.send(&connection, &Action::Ready).await?;
        Ok(())
    }

    async fn trade_asks(&self, phase: &Phase) -> Result<()> {
        let markup = Decimal::ONE + self.config.markup;
        for (i, cost) in self.config.seller_costs.iter().enumerate() {
            let price = self.quote(phase.phase_type, i, *cost * markup);
            let action = match self.config.mechanism {
                MarketMechanism::Decentralized => Action::PostListing {
                    phase_id: phase.id,
                    price,
                },
                _ => Action::PostOffer {
                    phase_id: phase.id,
                    price,
                },
            };
            self.send(&seller_conn(i), &action).await?;
        }

        for (i, value) in self.config.buyer_values.iter().enumerate() {
            let Some(ask) = self
                .open_asks(phase.id)
                .await?
                .into_iter()
                .filter(|a| !a.sold && a.price <= *value)
                .min_by_key(|a| a.price)
            else {
                tracing::debug!(buyer = i, "nothing affordable left");
                continue;
            };
            let action = match self.config.mechanism {
                MarketMechanism::Decentralized => Action::BuyListing {
                    phase_id: phase.id,
                    listing_id: ask.id,
                },
                _ => Action::BuyOffer {
                    phase_id: phase.id,
                    offer_id: ask.id,
                },
            };
            self.send(&buyer_conn(i), &action).await?;
        }
        Ok(())
    }

    async fn open_asks(&self, phase_id: PhaseId) -> Result<Vec<Ask>> {
        let decentralized = self.config.mechanism == MarketMechanism::Decentralized;
        let action = if decentralized {
            Action::ListingBook { phase_id }
        } else {
            Action::OfferBook { phase_id }
        };
        let mut data = self.send(&buyer_conn(0), &action).await?.data;
        if !decentralized {
            data = data["offers"].take();
        }
        Ok(serde_json::from_value(data)?)
    }

    async fn trade_auction(&self, phase: &Phase) -> Result<()> {
        let cfg = &self.config;
        for (i, cost) in cfg.seller_costs.iter().enumerate() {
            let price = self.quote(phase.phase_type, i, *cost * (Decimal::ONE + cfg.markup));
            self.submit(&seller_conn(i), phase.id, price).await?;
        }
        for (i, value) in cfg.buyer_values.iter().enumerate() {
            let price = self.quote(phase.phase_type, i, *value * (Decimal::ONE - cfg.markup));
            self.submit(&buyer_conn(i), phase.id, price).await?;
        }

        let response = self
            .send(&buyer_conn(0), &Action::AuctionBook { phase_id: phase.id })
            .await?;
        let snapshot: AuctionSnapshot = serde_json::from_value(response.data)?;
        let AuctionStage::Main {
            carry_over_bid,
            carry_over_offer,
        } = snapshot.stage
        else {
            tracing::warn!(phase = %phase.id, "opening stage did not close");
            return Ok(());
        };

        let pairs = cfg.seller_costs.iter().zip(&cfg.buyer_values).enumerate();
        for (i, (cost, value)) in pairs {
            let target = ((*cost + *value) / Decimal::TWO)
                .clamp(carry_over_bid, carry_over_offer)
                .round();
            if target < *cost || target > *value {
                continue;
            }
            let price = self.quote(phase.phase_type, i, target);
            self.submit(&seller_conn(i), phase.id, price).await?;
            self.submit(&buyer_conn(i), phase.id, price).await?;
        }
        Ok(())
    }

    async fn submit(&self, connection: &ConnectionId, phase_id: PhaseId, price: Decimal) -> Result<()> {
        self.send(connection, &Action::SubmitAuctionPrice { phase_id, price })
            .await
            .map(|_| ())
    }

    /// Express a full-scale price the way participant `index` would type
    /// it in `phase_type`.
    fn quote(&self, phase_type: PhaseType, index: usize, full: Decimal) -> Decimal {
        let full = full.round();
        let redenominated = match phase_type {
            PhaseType::PreRedenomination => false,
            PhaseType::Transition => index % 2 == 1,
            PhaseType::PostRedenomination => true,
        };
        if redenominated {
            full / self.config.market.redenomination_factor
        } else {
            full
        }
    }

    async fn send(&self, connection: &ConnectionId, action: &Action) -> Result<Response> {
        let response = self
            .dispatcher
            .dispatch(&Envelope::new(connection.clone(), action))
            .await;
        if !response.is_success() {
            bail!("{} from {connection} failed: {}", action.name(), response.message);
        }
        Ok(response)
    }
}

fn seller_conn(i: usize) -> ConnectionId {
    ConnectionId::new(format!("seller-{i}"))
}

fn buyer_conn(i: usize) -> ConnectionId {
    ConnectionId::new(format!("buyer-{i}"))
}
