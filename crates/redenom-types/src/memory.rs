//! In-memory adapters for the persistence and transport ports.
//!
//! Used by tests and the demo binary. Tables sit behind a single
//! `tokio::sync::RwLock`, which also makes `create_session_with_phases`
//! atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{
    Bargain, Broadcaster, ConnectionId, MarketError, MarketRepository, Participant, ParticipantId,
    Phase, PhaseId, Profit, Result, Role, RoomId, ServerEvent, Session, SessionId, Simulation,
    SimulationId, Transaction,
};

#[derive(Default)]
struct Tables {
    simulations: HashMap<SimulationId, Simulation>,
    sessions: HashMap<SessionId, Session>,
    phases: HashMap<PhaseId, Phase>,
    participants: HashMap<ParticipantId, Participant>,
    bargains: Vec<Bargain>,
    transactions: Vec<Transaction>,
    profits: Vec<Profit>,
}

/// Repository backed by process memory.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    fail_record_writes: AtomicBool,
    fail_transaction_writes: AtomicBool,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent bargain/transaction/profit write fail.
    pub fn fail_record_writes(&self, fail: bool) {
        self.fail_record_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only transaction writes fail; bargains and profits still land.
    pub fn fail_transaction_writes(&self, fail: bool) {
        self.fail_transaction_writes.store(fail, Ordering::SeqCst);
    }

    /// Delete a participant, leaving dangling references behind.
    pub async fn remove_participant(&self, id: ParticipantId) -> Option<Participant> {
        self.tables.write().await.participants.remove(&id)
    }

    pub async fn bargains(&self) -> Vec<Bargain> {
        self.tables.read().await.bargains.clone()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.tables.read().await.transactions.clone()
    }

    pub async fn profits(&self) -> Vec<Profit> {
        self.tables.read().await.profits.clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(MarketError::Persistence("record store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketRepository for InMemoryRepository {
    async fn find_simulation(&self, id: SimulationId) -> Result<Option<Simulation>> {
        Ok(self.tables.read().await.simulations.get(&id).cloned())
    }

    async fn save_simulation(&self, simulation: Simulation) -> Result<()> {
        self.tables
            .write()
            .await
            .simulations
            .insert(simulation.id, simulation);
        Ok(())
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn save_session(&self, session: Session) -> Result<()> {
        self.tables.write().await.sessions.insert(session.id, session);
        Ok(())
    }

    async fn create_session_with_phases(&self, session: Session, phases: Vec<Phase>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.simulations.contains_key(&session.simulation_id) {
            return Err(MarketError::missing("simulation", session.simulation_id));
        }
        for phase in phases {
            tables.phases.insert(phase.id, phase);
        }
        tables.sessions.insert(session.id, session);
        Ok(())
    }

    async fn sessions_of_simulation(&self, id: SimulationId) -> Result<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.simulation_id == id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn find_phase(&self, id: PhaseId) -> Result<Option<Phase>> {
        Ok(self.tables.read().await.phases.get(&id).cloned())
    }

    async fn save_phase(&self, phase: Phase) -> Result<()> {
        self.tables.write().await.phases.insert(phase.id, phase);
        Ok(())
    }

    async fn phases_of_session(&self, id: SessionId) -> Result<Vec<Phase>> {
        let tables = self.tables.read().await;
        let mut phases: Vec<Phase> = tables
            .phases
            .values()
            .filter(|p| p.session_id == id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| p.phase_type.index());
        Ok(phases)
    }

    async fn find_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.tables.read().await.participants.get(&id).cloned())
    }

    async fn find_participant_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Participant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .find(|p| p.connection() == Some(connection))
            .cloned())
    }

    async fn save_participant(&self, participant: Participant) -> Result<()> {
        self.tables
            .write()
            .await
            .participants
            .insert(participant.id(), participant);
        Ok(())
    }

    async fn count_participants(&self, simulation: SimulationId, role: Role) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .filter(|p| p.simulation_id() == simulation && p.role() == role)
            .count())
    }

    async fn count_ready(&self, simulation: SimulationId) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .filter(|p| p.simulation_id() == simulation && p.is_ready())
            .count())
    }

    async fn create_bargain(&self, bargain: Bargain) -> Result<()> {
        self.check_writable()?;
        self.tables.write().await.bargains.push(bargain);
        Ok(())
    }

    async fn create_transaction(&self, transaction: Transaction) -> Result<()> {
        self.check_writable()?;
        if self.fail_transaction_writes.load(Ordering::SeqCst) {
            return Err(MarketError::Persistence("transaction table unavailable".to_string()));
        }
        self.tables.write().await.transactions.push(transaction);
        Ok(())
    }

    async fn create_profit(&self, profit: Profit) -> Result<()> {
        self.check_writable()?;
        self.tables.write().await.profits.push(profit);
        Ok(())
    }

    async fn transactions_of_phase(&self, id: PhaseId) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.phase_id == id)
            .cloned()
            .collect())
    }

    async fn count_transactions(&self, id: PhaseId) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.iter().filter(|t| t.phase_id == id).count())
    }
}

/// Where a recorded event was sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Room(RoomId, ServerEvent),
    Direct(ConnectionId, ServerEvent),
}

impl Delivery {
    #[must_use]
    pub fn event(&self) -> &ServerEvent {
        match self {
            Self::Room(_, e) | Self::Direct(_, e) => e,
        }
    }
}

/// Transport adapter that records every delivery instead of sending it.
#[derive(Default)]
pub struct RecordingBroadcaster {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    /// Events sent directly to one connection.
    pub async fn sent_to(&self, connection: &ConnectionId) -> Vec<ServerEvent> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Direct(c, e) if c == connection => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.deliveries.lock().await.clear();
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn broadcast(&self, room: &RoomId, event: ServerEvent) {
        tracing::trace!(%room, event = event.name(), "broadcast");
        self.deliveries
            .lock()
            .await
            .push(Delivery::Room(room.clone(), event));
    }

    async fn emit_to(&self, connection: &ConnectionId, event: ServerEvent) {
        tracing::trace!(%connection, event = event.name(), "emit");
        self.deliveries
            .lock()
            .await
            .push(Delivery::Direct(connection.clone(), event));
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{Buyer, Goods, MarketMechanism, Seller};

    #[tokio::test]
    async fn session_creation_requires_simulation() {
        let repo = InMemoryRepository::new();
        let (session, phases) = Session::with_phases(SimulationId::new(), "orphan");
        let err = repo
            .create_session_with_phases(session, phases)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::MissingRelation { .. }));
    }

    #[tokio::test]
    async fn phases_come_back_in_order() {
        let repo = InMemoryRepository::new();
        let sim = Simulation::new(MarketMechanism::PostedOffer, Goods::default(), 2);
        let sim_id = sim.id;
        repo.save_simulation(sim).await.unwrap();

        let (session, mut phases) = Session::with_phases(sim_id, "s");
        let session_id = session.id;
        phases.reverse();
        repo.create_session_with_phases(session, phases).await.unwrap();

        let loaded = repo.phases_of_session(session_id).await.unwrap();
        let types: Vec<_> = loaded.iter().map(|p| p.phase_type).collect();
        assert_eq!(types, crate::PhaseType::ORDERED.to_vec());
    }

    #[tokio::test]
    async fn lookup_by_connection_and_counts() {
        let repo = InMemoryRepository::new();
        let sim = SimulationId::new();
        let mut buyer: Participant = Buyer::new(sim, Decimal::new(10, 0)).into();
        buyer.bind_connection(ConnectionId::new("c1"));
        buyer.set_ready(true);
        repo.save_participant(buyer.clone()).await.unwrap();
        repo.save_participant(Seller::new(sim, Decimal::ONE).into())
            .await
            .unwrap();

        let found = repo
            .find_participant_by_connection(&ConnectionId::new("c1"))
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id()), Some(buyer.id()));
        assert_eq!(repo.count_participants(sim, Role::Seller).await.unwrap(), 1);
        assert_eq!(repo.count_ready(sim).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_record_writes() {
        let repo = InMemoryRepository::new();
        repo.fail_record_writes(true);
        let bargain = Bargain::new(PhaseId::new(), ParticipantId::new(), Role::Buyer, Decimal::ONE);
        assert!(matches!(
            repo.create_bargain(bargain).await,
            Err(MarketError::Persistence(_))
        ));
        assert!(repo.bargains().await.is_empty());
    }
}
