//! Simulations, sessions and phases.
//!
//! A [`Simulation`] owns many [`Session`]s; every session owns exactly three
//! [`Phase`]s created together in [`PhaseType::ORDERED`] order. All three
//! carry trade aggregates that the lifecycle recomputes when a phase
//! finishes.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    LoginToken, MarketMechanism, PhaseId, PhaseType, SessionId, SimulationId, constants,
};

/// Mean trade count and mean trade price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub avg_trx_occurrence: Decimal,
    pub avg_trx_price: Decimal,
}

impl TradeStats {
    /// Arithmetic mean over a set of child aggregates. Empty input yields zeros.
    #[must_use]
    pub fn mean_of(children: &[TradeStats]) -> Self {
        if children.is_empty() {
            return Self::default();
        }
        let n = Decimal::from(children.len());
        let occurrence: Decimal = children.iter().map(|s| s.avg_trx_occurrence).sum();
        let price: Decimal = children.iter().map(|s| s.avg_trx_price).sum();
        Self {
            avg_trx_occurrence: occurrence / n,
            avg_trx_price: price / n,
        }
    }
}

/// Goods being traded, shown to participants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Goods {
    pub name: String,
    pub unit: String,
    pub picture: Option<String>,
}

/// A configured experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub id: SimulationId,
    pub mechanism: MarketMechanism,
    pub goods: Goods,
    /// Total buyers plus sellers.
    pub participant_number: usize,
    pub stats: TradeStats,
    pub login_token: LoginToken,
    pub time_created: DateTime<Utc>,
    pub time_last_run: DateTime<Utc>,
}

impl Simulation {
    #[must_use]
    pub fn new(mechanism: MarketMechanism, goods: Goods, participant_number: usize) -> Self {
        let now = Utc::now();
        Self {
            id: SimulationId::new(),
            mechanism,
            goods,
            participant_number,
            stats: TradeStats::default(),
            login_token: LoginToken::generate(),
            time_created: now,
            time_last_run: now,
        }
    }
}

/// One run of a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub simulation_id: SimulationId,
    pub name: String,
    pub is_running: bool,
    pub stats: TradeStats,
    pub time_created: DateTime<Utc>,
    pub time_last_run: DateTime<Utc>,
}

impl Session {
    /// Build a session together with its three phases.
    #[must_use]
    pub fn with_phases(simulation_id: SimulationId, name: impl Into<String>) -> (Self, Vec<Phase>) {
        let now = Utc::now();
        let session = Self {
            id: SessionId::new(),
            simulation_id,
            name: name.into(),
            is_running: false,
            stats: TradeStats::default(),
            time_created: now,
            time_last_run: now,
        };
        let phases = PhaseType::ORDERED
            .iter()
            .map(|&phase_type| Phase::new(session.id, phase_type, now))
            .collect();
        (session, phases)
    }

    /// Whether the session has completed at least once.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.time_created != self.time_last_run
    }
}

/// Observable state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseStatus {
    /// Never started.
    Created,
    /// Accepting submissions.
    Running,
    /// Stopped after having run at least once.
    Finished,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// A bounded trading window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub session_id: SessionId,
    pub phase_type: PhaseType,
    pub is_running: bool,
    /// Advisory timer; nothing here preempts on expiry.
    pub time_limit_secs: u64,
    pub stats: TradeStats,
    pub time_created: DateTime<Utc>,
    pub time_last_run: DateTime<Utc>,
}

impl Phase {
    #[must_use]
    pub fn new(session_id: SessionId, phase_type: PhaseType, now: DateTime<Utc>) -> Self {
        Self {
            id: PhaseId::new(),
            session_id,
            phase_type,
            is_running: false,
            time_limit_secs: constants::DEFAULT_PHASE_TIME_LIMIT_SECS,
            stats: TradeStats::default(),
            time_created: now,
            time_last_run: now,
        }
    }

    /// `time_created != time_last_run` marks a phase that has been run.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.time_created != self.time_last_run
    }

    #[must_use]
    pub fn status(&self) -> PhaseStatus {
        if self.is_running {
            PhaseStatus::Running
        } else if self.has_run() {
            PhaseStatus::Finished
        } else {
            PhaseStatus::Created
        }
    }
}
