//! Shared wiring handed to every engine.

use std::sync::Arc;

use redenom_types::{
    Broadcaster, ConnectionId, ErrorClass, MarketConfig, MarketError, MarketRepository,
    Participant, Phase, PhaseId, Result, Role, Simulation,
};

use crate::{Lease, LeaseGate, LeaseKey, MarketStore, PriceValidator};

/// Ports, store, lease gate and validator shared by the engines.
///
/// Cloning is cheap and every clone sees the same store and leases.
#[derive(Clone)]
pub struct MarketContext {
    pub repository: Arc<dyn MarketRepository>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub store: Arc<MarketStore>,
    pub leases: Arc<LeaseGate>,
    pub validator: PriceValidator,
}

impl MarketContext {
    #[must_use]
    pub fn new(
        repository: Arc<dyn MarketRepository>,
        broadcaster: Arc<dyn Broadcaster>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            repository,
            broadcaster,
            store: Arc::new(MarketStore::new()),
            leases: Arc::new(LeaseGate::new()),
            validator: PriceValidator::new(config),
        }
    }

    /// Participant bound to `connection`.
    pub async fn resolve(&self, connection: &ConnectionId) -> Result<Participant> {
        self.repository
            .find_participant_by_connection(connection)
            .await?
            .ok_or_else(|| MarketError::UnknownConnection(connection.clone()))
    }

    pub async fn phase(&self, phase_id: PhaseId) -> Result<Phase> {
        self.repository
            .find_phase(phase_id)
            .await?
            .ok_or(MarketError::PhaseNotFound(phase_id))
    }

    /// The phase, provided it is accepting submissions.
    pub async fn running_phase(&self, phase_id: PhaseId) -> Result<Phase> {
        let phase = self.phase(phase_id).await?;
        if !phase.is_running {
            return Err(MarketError::PhaseNotRunning(phase_id));
        }
        Ok(phase)
    }

    /// Simulation owning `phase`, through its session.
    pub async fn simulation_of(&self, phase: &Phase) -> Result<Simulation> {
        let session = self
            .repository
            .find_session(phase.session_id)
            .await?
            .ok_or_else(|| MarketError::missing("session", phase.session_id))?;
        self.repository
            .find_simulation(session.simulation_id)
            .await?
            .ok_or_else(|| MarketError::missing("simulation", session.simulation_id))
    }

    /// Take every lease of `phase_id`, in [`LeaseKey::all_for_phase`] order.
    /// While held, no engine can touch any book of the phase.
    pub async fn lock_phase(&self, phase_id: PhaseId) -> Vec<Lease> {
        let mut leases = Vec::with_capacity(3);
        for key in LeaseKey::all_for_phase(phase_id) {
            leases.push(self.leases.acquire(key).await);
        }
        leases
    }

    /// Clear the partitions guarded by `leases`.
    pub fn clear_locked(&self, leases: &[Lease]) {
        for lease in leases {
            self.store.clear(lease.key());
        }
    }

    /// Destroy every ephemeral book of `phase_id`.
    pub async fn reset_phase(&self, phase_id: PhaseId) {
        let leases = self.lock_phase(phase_id).await;
        self.clear_locked(&leases);
        tracing::debug!(phase = %phase_id, "phase books cleared");
    }
}

/// Reject participants enrolled in another simulation than `simulation`.
pub fn require_member(participant: &Participant, simulation: &Simulation) -> Result<()> {
    if participant.simulation_id() == simulation.id {
        Ok(())
    } else {
        Err(MarketError::ForeignParticipant {
            participant: participant.id(),
            simulation: simulation.id,
        })
    }
}

/// Reject callers on the wrong side of the market.
pub fn require_role(participant: &Participant, expected: Role) -> Result<()> {
    let actual = participant.role();
    if actual == expected {
        Ok(())
    } else {
        Err(MarketError::WrongRole { expected, actual })
    }
}

/// Log a failed operation at a level matching its class.
pub fn log_rejection(operation: &'static str, err: &MarketError) {
    match err.class() {
        ErrorClass::Integrity => tracing::error!(operation, error = %err, "operation aborted"),
        ErrorClass::Validation | ErrorClass::Conflict => {
            tracing::debug!(operation, error = %err, "submission rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use redenom_types::fixtures::MarketFixture;
    use redenom_types::{Ask, MarketMechanism, PhaseType};
    use rust_decimal::Decimal;

    use super::*;

    fn ctx(fx: &MarketFixture) -> MarketContext {
        MarketContext::new(fx.repo.clone(), fx.broadcaster.clone(), &MarketConfig::default())
    }

    #[tokio::test]
    async fn resolve_unknown_connection() {
        let fx = MarketFixture::new(MarketMechanism::PostedOffer, &[10], &[20]).await;
        let ctx = ctx(&fx);
        let err = ctx.resolve(&ConnectionId::new("nobody")).await.unwrap_err();
        assert!(matches!(err, MarketError::UnknownConnection(_)));
        assert!(ctx.resolve(&MarketFixture::seller_conn(0)).await.is_ok());
    }

    #[tokio::test]
    async fn running_phase_gate() {
        let fx = MarketFixture::new(MarketMechanism::PostedOffer, &[10], &[20]).await;
        let ctx = ctx(&fx);
        let phase = fx.phase(PhaseType::PreRedenomination);

        let err = ctx.running_phase(phase).await.unwrap_err();
        assert!(matches!(err, MarketError::PhaseNotRunning(_)));

        fx.set_running(PhaseType::PreRedenomination, true).await;
        assert!(ctx.running_phase(phase).await.is_ok());

        let err = ctx.running_phase(PhaseId::new()).await.unwrap_err();
        assert!(matches!(err, MarketError::PhaseNotFound(_)));
    }

    #[tokio::test]
    async fn simulation_of_phase() {
        let fx = MarketFixture::new(MarketMechanism::DoubleAuction, &[10], &[20]).await;
        let ctx = ctx(&fx);
        let phase = ctx.phase(fx.phase(PhaseType::Transition)).await.unwrap();
        let sim = ctx.simulation_of(&phase).await.unwrap();
        assert_eq!(sim.id, fx.simulation.id);
    }

    #[tokio::test]
    async fn reset_clears_all_partitions() {
        let fx = MarketFixture::new(MarketMechanism::PostedOffer, &[10], &[20]).await;
        let ctx = ctx(&fx);
        let phase = fx.phase(PhaseType::PreRedenomination);
        let ask = Ask::new(MarketMechanism::PostedOffer, phase, fx.sellers[0].id(), Decimal::TEN);
        ctx.store.replace_asks(MarketMechanism::PostedOffer, phase, vec![ask]);

        ctx.reset_phase(phase).await;
        assert!(!ctx.store.has_state(phase));
    }

    #[tokio::test]
    async fn lock_phase_blocks_every_book() {
        let fx = MarketFixture::new(MarketMechanism::PostedOffer, &[10], &[20]).await;
        let ctx = ctx(&fx);
        let phase = fx.phase(PhaseType::Transition);

        let leases = ctx.lock_phase(phase).await;
        for key in LeaseKey::all_for_phase(phase) {
            assert!(ctx.leases.is_held(key));
        }
        drop(leases);
        assert!(ctx.leases.try_acquire(LeaseKey::AuctionBook(phase)).is_some());
    }

    #[test]
    fn members_of_other_simulations_are_rejected() {
        let simulation = redenom_types::Simulation::new(
            MarketMechanism::PostedOffer,
            redenom_types::Goods::default(),
            2,
        );
        let member: Participant =
            redenom_types::Seller::new(simulation.id, Decimal::ONE).into();
        let outsider: Participant =
            redenom_types::Seller::new(redenom_types::SimulationId::new(), Decimal::ONE).into();

        assert!(require_member(&member, &simulation).is_ok());
        let err = require_member(&outsider, &simulation).unwrap_err();
        assert!(matches!(err, MarketError::ForeignParticipant { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn wrong_role_is_reported() {
        let buyer: Participant =
            redenom_types::Buyer::new(redenom_types::SimulationId::new(), Decimal::ONE).into();
        let err = require_role(&buyer, Role::Seller).unwrap_err();
        assert!(matches!(
            err,
            MarketError::WrongRole {
                expected: Role::Seller,
                actual: Role::Buyer
            }
        ));
    }
}
