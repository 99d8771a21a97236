//! Identifiers used throughout the market core.
//!
//! Entity ids are UUIDv7 so they sort by creation time. Connection, room and
//! login-token identities are opaque strings handed to us by collaborators.

use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// A configured experiment.
    SimulationId,
    "sim"
);
uuid_id!(
    /// One run of a simulation.
    SessionId,
    "session"
);
uuid_id!(
    /// One of the three trading windows of a session.
    PhaseId,
    "phase"
);
uuid_id!(
    /// A buyer or seller.
    ParticipantId,
    "participant"
);
uuid_id!(
    /// Ephemeral order-book entry (ask, bid or listing).
    EntryId,
    "entry"
);
uuid_id!(BargainId, "bargain");
uuid_id!(TransactionId, "trx");
uuid_id!(ProfitId, "profit");

// ---------------------------------------------------------------------------
// ConnectionId
// ---------------------------------------------------------------------------

/// Live connection identity assigned by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// Broadcast group addressed by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// The room every participant of a running phase listens on.
    #[must_use]
    pub fn phase(phase_id: PhaseId) -> Self {
        Self(format!("{}{}", constants::PHASE_ROOM_PREFIX, phase_id.0))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// LoginToken
// ---------------------------------------------------------------------------

/// Shared credential of every participant of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginToken(pub String);

impl LoginToken {
    /// Generate a fresh alphanumeric token.
    #[must_use]
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(constants::LOGIN_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token.to_uppercase())
    }
}

impl fmt::Display for LoginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_id_uniqueness_and_ordering() {
        let a = PhaseId::new();
        let b = PhaseId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn display_carries_prefix() {
        let id = EntryId::new();
        assert!(id.to_string().starts_with("entry:"));
    }

    #[test]
    fn phase_room_is_stable() {
        let phase = PhaseId::new();
        assert_eq!(RoomId::phase(phase), RoomId::phase(phase));
        assert!(RoomId::phase(phase).0.starts_with(constants::PHASE_ROOM_PREFIX));
    }

    #[test]
    fn login_token_shape() {
        let token = LoginToken::generate();
        assert_eq!(token.0.len(), constants::LOGIN_TOKEN_LEN);
        assert!(token.0.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ParticipantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
