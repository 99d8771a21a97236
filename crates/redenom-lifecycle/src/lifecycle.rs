//! Operator-driven phase transitions.
//!
//! Only one phase of a session runs at a time. Transitions are serialised
//! through a single guard so two operators cannot start sibling phases at
//! once. Timers are advisory: nothing here stops a phase on expiry.

use chrono::Utc;
use redenom_matchcore::MarketContext;
use redenom_types::{
    MarketConfig, MarketError, Phase, PhaseId, PhaseStatus, Result, RoomId, ServerEvent, Session,
    SessionId, SimulationId,
};
use tokio::sync::Mutex;

use crate::aggregates::{phase_stats, rollup, run_stamp};

/// Phase/session state machine over the shared market context.
pub struct Lifecycle {
    ctx: MarketContext,
    phase_time_limit_secs: u64,
    transitions: Mutex<()>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(ctx: MarketContext, config: &MarketConfig) -> Self {
        Self {
            ctx,
            phase_time_limit_secs: config.phase_time_limit_secs,
            transitions: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &MarketContext {
        &self.ctx
    }

    /// Create a session and its three phases in one repository write.
    pub async fn create_session(
        &self,
        simulation_id: SimulationId,
        name: &str,
    ) -> Result<(Session, Vec<Phase>)> {
        let repo = &self.ctx.repository;
        if repo.find_simulation(simulation_id).await?.is_none() {
            return Err(MarketError::NotFound(format!("simulation {simulation_id}")));
        }

        let (session, mut phases) = Session::with_phases(simulation_id, name);
        for phase in &mut phases {
            phase.time_limit_secs = self.phase_time_limit_secs;
        }
        repo.create_session_with_phases(session.clone(), phases.clone())
            .await?;
        tracing::info!(session = %session.id, simulation = %simulation_id, name, "session created");
        Ok((session, phases))
    }

    pub async fn phase_status(&self, phase_id: PhaseId) -> Result<PhaseStatus> {
        Ok(self.ctx.phase(phase_id).await?.status())
    }

    /// Open a phase for submissions with empty books.
    pub async fn start_phase(&self, phase_id: PhaseId) -> Result<Phase> {
        let _guard = self.transitions.lock().await;
        let repo = &self.ctx.repository;

        let mut phase = self.ctx.phase(phase_id).await?;
        if phase.is_running {
            return Err(MarketError::PhaseAlreadyRunning(phase_id));
        }
        let mut session = self.session(phase.session_id).await?;
        let siblings = repo.phases_of_session(session.id).await?;
        if let Some(busy) = siblings.iter().find(|p| p.is_running && p.id != phase_id) {
            return Err(MarketError::SessionBusy(busy.id));
        }

        self.ctx.reset_phase(phase_id).await;
        phase.is_running = true;
        repo.save_phase(phase.clone()).await?;
        session.is_running = true;
        repo.save_session(session).await?;

        tracing::info!(
            phase = %phase_id,
            phase_type = %phase.phase_type,
            time_limit_secs = phase.time_limit_secs,
            "phase started"
        );
        self.ctx
            .broadcaster
            .broadcast(
                &RoomId::phase(phase_id),
                ServerEvent::PhaseStarted {
                    phase_id,
                    phase_type: phase.phase_type,
                    time_limit_secs: phase.time_limit_secs,
                },
            )
            .await;
        Ok(phase)
    }

    /// Close a running phase, record its aggregates and roll them up.
    pub async fn finish_phase(&self, phase_id: PhaseId) -> Result<Phase> {
        let _guard = self.transitions.lock().await;
        let repo = &self.ctx.repository;

        let mut phase = self.ctx.phase(phase_id).await?;
        if !phase.is_running {
            return Err(MarketError::PhaseNotRunning(phase_id));
        }
        let mut session = self.session(phase.session_id).await?;

        // Holding every book lease drains in-flight submissions: each one
        // either commits before the stats are taken or sees the phase stopped.
        let leases = self.ctx.lock_phase(phase_id).await;
        let transactions = repo.transactions_of_phase(phase_id).await?;
        phase.stats = phase_stats(&transactions);
        phase.is_running = false;
        phase.time_last_run = run_stamp(phase.time_created);
        repo.save_phase(phase.clone()).await?;
        self.ctx.clear_locked(&leases);
        drop(leases);
        tracing::info!(
            phase = %phase_id,
            trades = transactions.len(),
            avg_price = %phase.stats.avg_trx_price,
            "phase finished"
        );

        let phases = repo.phases_of_session(session.id).await?;
        let session_complete = phases.iter().all(Phase::has_run);
        if session_complete {
            session.stats = rollup(phases.iter().map(|p| (p.has_run(), p.stats)));
            session.time_last_run = run_stamp(session.time_created);
            tracing::info!(
                session = %session.id,
                avg_trx_occurrence = %session.stats.avg_trx_occurrence,
                avg_trx_price = %session.stats.avg_trx_price,
                "session aggregates updated"
            );
        }
        session.is_running = false;
        let simulation_id = session.simulation_id;
        repo.save_session(session).await?;

        if session_complete {
            self.refresh_simulation(simulation_id).await?;
        }

        self.ctx
            .broadcaster
            .broadcast(
                &RoomId::phase(phase_id),
                ServerEvent::PhaseFinished {
                    phase_id,
                    stats: phase.stats,
                },
            )
            .await;
        Ok(phase)
    }

    async fn session(&self, session_id: SessionId) -> Result<Session> {
        self.ctx
            .repository
            .find_session(session_id)
            .await?
            .ok_or_else(|| MarketError::missing("session", session_id))
    }

    async fn refresh_simulation(&self, simulation_id: SimulationId) -> Result<()> {
        let repo = &self.ctx.repository;
        let mut simulation = repo
            .find_simulation(simulation_id)
            .await?
            .ok_or_else(|| MarketError::missing("simulation", simulation_id))?;
        let sessions = repo.sessions_of_simulation(simulation_id).await?;
        simulation.stats = rollup(sessions.iter().map(|s| (s.has_run(), s.stats)));
        simulation.time_last_run = Utc::now();
        tracing::info!(
            simulation = %simulation_id,
            avg_trx_occurrence = %simulation.stats.avg_trx_occurrence,
            avg_trx_price = %simulation.stats.avg_trx_price,
            "simulation aggregates updated"
        );
        repo.save_simulation(simulation).await
    }
}
