//! # redenom-lifecycle
//!
//! **Phase and session lifecycle.**
//!
//! A phase moves `created -> running -> finished` and may be restarted.
//! Starting or finishing a phase wipes its ephemeral books. Finishing a
//! phase records its trade aggregates and, once every phase of the session
//! has run, rolls them up into the session and then the simulation.
//!
//! - [`Lifecycle`]: operator transitions (`create_session`, `start_phase`,
//!   `finish_phase`, `phase_status`)
//! - [`aggregates`]: pure roll-up helpers

pub mod aggregates;
pub mod lifecycle;

pub use aggregates::{phase_stats, rollup};
pub use lifecycle::Lifecycle;
