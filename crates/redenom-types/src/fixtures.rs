//! Test helpers: a seeded market with one session and bound participants.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    Buyer, ConnectionId, Goods, InMemoryRepository, MarketMechanism, MarketRepository,
    Participant, Phase, PhaseId, PhaseType, RecordingBroadcaster, Seller, Session, Simulation,
};

/// A simulation with one session, its three phases and connected
/// participants. Seller `i` is bound to connection `seller-i`, buyer `i`
/// to `buyer-i`.
pub struct MarketFixture {
    pub repo: Arc<InMemoryRepository>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub simulation: Simulation,
    pub session: Session,
    pub phases: Vec<Phase>,
    pub sellers: Vec<Participant>,
    pub buyers: Vec<Participant>,
}

impl MarketFixture {
    pub async fn new(mechanism: MarketMechanism, seller_costs: &[i64], buyer_values: &[i64]) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let simulation = Simulation::new(
            mechanism,
            Goods {
                name: "Rice".to_string(),
                unit: "kg".to_string(),
                picture: None,
            },
            seller_costs.len() + buyer_values.len(),
        );
        repo.save_simulation(simulation.clone()).await.unwrap();

        let (session, phases) = Session::with_phases(simulation.id, "fixture session");
        repo.create_session_with_phases(session.clone(), phases.clone())
            .await
            .unwrap();

        let mut sellers = Vec::new();
        for (i, cost) in seller_costs.iter().enumerate() {
            let mut p: Participant = Seller::new(simulation.id, Decimal::from(*cost)).into();
            p.bind_connection(Self::seller_conn(i));
            repo.save_participant(p.clone()).await.unwrap();
            sellers.push(p);
        }
        let mut buyers = Vec::new();
        for (i, value) in buyer_values.iter().enumerate() {
            let mut p: Participant = Buyer::new(simulation.id, Decimal::from(*value)).into();
            p.bind_connection(Self::buyer_conn(i));
            repo.save_participant(p.clone()).await.unwrap();
            buyers.push(p);
        }

        Self {
            repo,
            broadcaster: Arc::new(RecordingBroadcaster::new()),
            simulation,
            session,
            phases,
            sellers,
            buyers,
        }
    }

    #[must_use]
    pub fn seller_conn(i: usize) -> ConnectionId {
        ConnectionId::new(format!("seller-{i}"))
    }

    #[must_use]
    pub fn buyer_conn(i: usize) -> ConnectionId {
        ConnectionId::new(format!("buyer-{i}"))
    }

    #[must_use]
    pub fn phase(&self, phase_type: PhaseType) -> PhaseId {
        self.phases[phase_type.index()].id
    }

    /// Flip a phase's running flag directly in the repository.
    pub async fn set_running(&self, phase_type: PhaseType, running: bool) -> PhaseId {
        let id = self.phase(phase_type);
        let mut phase = self.repo.find_phase(id).await.unwrap().unwrap();
        phase.is_running = running;
        self.repo.save_phase(phase).await.unwrap();
        id
    }
}
