//! Ports to the external collaborators: durable storage and transport.
//!
//! The core never talks to a database or a socket directly. Engines and the
//! lifecycle receive these as `Arc<dyn ...>` so that tests and the demo
//! binary can plug in the in-memory adapters from [`crate::memory`].

use async_trait::async_trait;

use crate::{
    Bargain, ConnectionId, Participant, ParticipantId, Phase, PhaseId, Profit, Result, Role,
    RoomId, ServerEvent, Session, SessionId, Simulation, SimulationId, Transaction,
};

/// Durable store for simulations, sessions, phases, participants and the
/// append-only trade records.
#[async_trait]
pub trait MarketRepository: Send + Sync {
    // --- simulations / sessions / phases ---
    async fn find_simulation(&self, id: SimulationId) -> Result<Option<Simulation>>;
    async fn save_simulation(&self, simulation: Simulation) -> Result<()>;
    async fn find_session(&self, id: SessionId) -> Result<Option<Session>>;
    async fn save_session(&self, session: Session) -> Result<()>;
    /// Persist a new session and all its phases in one atomic step.
    async fn create_session_with_phases(&self, session: Session, phases: Vec<Phase>) -> Result<()>;
    async fn sessions_of_simulation(&self, id: SimulationId) -> Result<Vec<Session>>;
    async fn find_phase(&self, id: PhaseId) -> Result<Option<Phase>>;
    async fn save_phase(&self, phase: Phase) -> Result<()>;
    /// Phases of a session in creation order.
    async fn phases_of_session(&self, id: SessionId) -> Result<Vec<Phase>>;

    // --- participants ---
    async fn find_participant(&self, id: ParticipantId) -> Result<Option<Participant>>;
    async fn find_participant_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Participant>>;
    async fn save_participant(&self, participant: Participant) -> Result<()>;
    async fn count_participants(&self, simulation: SimulationId, role: Role) -> Result<usize>;
    async fn count_ready(&self, simulation: SimulationId) -> Result<usize>;

    // --- append-only records ---
    async fn create_bargain(&self, bargain: Bargain) -> Result<()>;
    async fn create_transaction(&self, transaction: Transaction) -> Result<()>;
    async fn create_profit(&self, profit: Profit) -> Result<()>;
    async fn transactions_of_phase(&self, id: PhaseId) -> Result<Vec<Transaction>>;
    async fn count_transactions(&self, id: PhaseId) -> Result<usize>;
}

/// Delivery of server events to connected participants. Delivery is
/// at-least-once and never fails from the core's point of view.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, room: &RoomId, event: ServerEvent);
    async fn emit_to(&self, connection: &ConnectionId, event: ServerEvent);
}
