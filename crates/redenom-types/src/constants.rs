//! System-wide constants for the market core.

/// Scale between the pre- and post-redenomination price units.
pub const REDENOMINATION_FACTOR: i64 = 1000;

/// Minimum difference in integer digits between a reservation value and a
/// price for the price to count as redenominated.
pub const REDENOMINATED_DIGIT_GAP: u32 = 2;

/// Every session owns exactly this many phases.
pub const PHASES_PER_SESSION: usize = 3;

/// Default advisory phase timer, in seconds.
pub const DEFAULT_PHASE_TIME_LIMIT_SECS: u64 = 300;

/// Length of generated simulation login tokens.
pub const LOGIN_TOKEN_LEN: usize = 6;

/// Prefix of broadcast rooms scoped to a phase.
pub const PHASE_ROOM_PREFIX: &str = "phase-";

/// Message returned to clients in place of integrity error details.
pub const GENERIC_INTERNAL_MESSAGE: &str = "Internal error, please resubmit";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
