//! Error types for the market core.
//!
//! All errors use the `RD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Validation errors (bad input, wrong role, unknown entity)
//! - 2xx: State conflicts (already sold, phase not running, ...)
//! - 9xx: Integrity / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    ConnectionId, EntryId, MarketMechanism, ParticipantId, PhaseId, PhaseType, Role, SimulationId,
};

/// Coarse classification used to pick a status code and log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// User-visible, 4xx-equivalent, never retried.
    Validation,
    /// User-visible, 4xx-equivalent, never retried.
    Conflict,
    /// Logged, surfaced as a generic 5xx-equivalent.
    Integrity,
}

/// Central error enum for all market operations.
#[derive(Debug, Error)]
pub enum MarketError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Price is not a positive number.
    #[error("RD_ERR_100: Invalid price: {reason}")]
    InvalidPrice { reason: String },

    /// A redenominated price was submitted where only the old scale is allowed.
    #[error("RD_ERR_101: Price {price} is a redenominated number, not allowed in {phase}")]
    RedenominatedNotAllowed { price: Decimal, phase: PhaseType },

    /// A plain price was submitted where the new scale is mandatory.
    #[error("RD_ERR_102: Price {price} must be a redenominated number in {phase}")]
    RedenominatedRequired { price: Decimal, phase: PhaseType },

    /// Seller asked for less than its unit cost.
    #[error("RD_ERR_103: Price {price} is below the seller's reservation value {bound}")]
    BelowReservation { price: Decimal, bound: Decimal },

    /// Buyer offered more than its unit value.
    #[error("RD_ERR_104: Price {price} exceeds the buyer's reservation value {bound}")]
    AboveReservation { price: Decimal, bound: Decimal },

    /// The action is reserved for the other side of the market.
    #[error("RD_ERR_105: Action requires a {expected}, caller is a {actual}")]
    WrongRole { expected: Role, actual: Role },

    #[error("RD_ERR_106: Phase not found: {0}")]
    PhaseNotFound(PhaseId),

    #[error("RD_ERR_107: Order-book entry not found: {0}")]
    EntryNotFound(EntryId),

    /// No participant is bound to this connection.
    #[error("RD_ERR_108: Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// Main-stage double-auction price outside the carry-over band.
    #[error("RD_ERR_109: Price {price} outside the allowed band [{floor}, {ceiling}]")]
    OutsideBand {
        price: Decimal,
        floor: Decimal,
        ceiling: Decimal,
    },

    #[error("RD_ERR_110: Invalid login token")]
    InvalidLoginToken,

    #[error("RD_ERR_111: Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("RD_ERR_112: Not found: {0}")]
    NotFound(String),

    /// The action targets a mechanism the simulation does not run.
    #[error("RD_ERR_113: Simulation runs {actual}, action targets {requested}")]
    WrongMechanism {
        requested: MarketMechanism,
        actual: MarketMechanism,
    },

    #[error("RD_ERR_114: Malformed action: {0}")]
    MalformedAction(String),

    /// The participant is enrolled in another simulation than the phase's.
    #[error("RD_ERR_115: Participant {participant} is not part of simulation {simulation}")]
    ForeignParticipant {
        participant: ParticipantId,
        simulation: SimulationId,
    },

    // =================================================================
    // State Conflicts (2xx)
    // =================================================================
    #[error("RD_ERR_200: Phase is not running: {0}")]
    PhaseNotRunning(PhaseId),

    #[error("RD_ERR_201: Offer already sold: {0}")]
    AlreadySold(EntryId),

    /// A buyer may purchase at most one ask per phase.
    #[error("RD_ERR_202: Buyer has already bought once in this phase")]
    AlreadyBought,

    /// Opening double-auction stage accepts one price per participant.
    #[error("RD_ERR_203: Price already submitted in the opening stage")]
    AlreadySubmitted,

    /// The participant already completed its trade in this phase.
    #[error("RD_ERR_204: Participant has already traded in this phase")]
    AlreadyTraded,

    #[error("RD_ERR_205: Phase is already running: {0}")]
    PhaseAlreadyRunning(PhaseId),

    /// Another phase of the same session is running.
    #[error("RD_ERR_206: Another phase of this session is running: {0}")]
    SessionBusy(PhaseId),

    // =================================================================
    // Integrity / Internal (9xx)
    // =================================================================
    /// A related entity that must exist does not.
    #[error("RD_ERR_900: Missing related {entity}: {id}")]
    MissingRelation { entity: &'static str, id: String },

    /// The persistence collaborator failed.
    #[error("RD_ERR_901: Persistence error: {0}")]
    Persistence(String),

    #[error("RD_ERR_902: Configuration error: {0}")]
    Configuration(String),

    #[error("RD_ERR_903: Serialization error: {0}")]
    Serialization(String),

    #[error("RD_ERR_904: I/O error: {0}")]
    Io(String),
}

impl MarketError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidPrice { .. }
            | Self::RedenominatedNotAllowed { .. }
            | Self::RedenominatedRequired { .. }
            | Self::BelowReservation { .. }
            | Self::AboveReservation { .. }
            | Self::WrongRole { .. }
            | Self::PhaseNotFound(_)
            | Self::EntryNotFound(_)
            | Self::UnknownConnection(_)
            | Self::OutsideBand { .. }
            | Self::InvalidLoginToken
            | Self::ParticipantNotFound(_)
            | Self::NotFound(_)
            | Self::WrongMechanism { .. }
            | Self::MalformedAction(_)
            | Self::ForeignParticipant { .. } => ErrorClass::Validation,
            Self::PhaseNotRunning(_)
            | Self::AlreadySold(_)
            | Self::AlreadyBought
            | Self::AlreadySubmitted
            | Self::AlreadyTraded
            | Self::PhaseAlreadyRunning(_)
            | Self::SessionBusy(_) => ErrorClass::Conflict,
            Self::MissingRelation { .. }
            | Self::Persistence(_)
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorClass::Integrity,
        }
    }

    /// HTTP-equivalent status code for the response envelope.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation => 400,
            ErrorClass::Conflict => 409,
            ErrorClass::Integrity => 500,
        }
    }

    /// Shorthand for a missing related entity.
    pub fn missing(entity: &'static str, id: impl ToString) -> Self {
        Self::MissingRelation {
            entity,
            id: id.to_string(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bought_once_message() {
        let msg = MarketError::AlreadyBought.to_string();
        assert!(msg.starts_with("RD_ERR_202"));
        assert!(msg.contains("bought once"));
    }

    #[test]
    fn classes_map_to_status_codes() {
        assert_eq!(MarketError::InvalidLoginToken.status_code(), 400);
        assert_eq!(MarketError::PhaseNotRunning(PhaseId::new()).status_code(), 409);
        assert_eq!(MarketError::missing("seller", "x").status_code(), 500);
    }

    #[test]
    fn reservation_errors_are_descriptive() {
        let err = MarketError::BelowReservation {
            price: Decimal::new(11_000, 0),
            bound: Decimal::new(12_000, 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("11000"));
        assert!(msg.contains("12000"));
    }

    #[test]
    fn all_errors_have_rd_err_prefix() {
        let errors = vec![
            MarketError::AlreadyBought,
            MarketError::AlreadySubmitted,
            MarketError::InvalidLoginToken,
            MarketError::Persistence("down".into()),
            MarketError::WrongRole {
                expected: Role::Seller,
                actual: Role::Buyer,
            },
        ];
        for err in errors {
            let msg = err.to_string();
            assert!(msg.starts_with("RD_ERR_"), "Error missing RD_ERR_ prefix: {msg}");
        }
    }
}
