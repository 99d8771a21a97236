//! # redenom-types
//!
//! Shared types, errors, ports and configuration for the **redenom** market
//! core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`SimulationId`], [`SessionId`], [`PhaseId`], [`ParticipantId`], [`EntryId`], [`ConnectionId`], [`RoomId`]
//! - **Market model**: [`MarketMechanism`], [`PhaseType`], [`Role`]
//! - **Durable entities**: [`Simulation`], [`Session`], [`Phase`], [`Buyer`], [`Seller`], [`Bargain`], [`Transaction`], [`Profit`]
//! - **Ephemeral order-book records**: [`Ask`], [`AuctionEntry`]
//! - **Ports**: [`MarketRepository`] (persistence) and [`Broadcaster`] (transport)
//! - **Envelope and events**: [`Response`], [`ServerEvent`]
//! - **Configuration**: [`MarketConfig`]
//! - **Errors**: [`MarketError`] with `RD_ERR_` prefix codes

pub mod book;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod events;
pub mod ids;
pub mod market;
pub mod memory;
pub mod participant;
pub mod ports;
pub mod records;
pub mod simulation;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

pub use book::*;
pub use config::*;
pub use envelope::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use market::*;
pub use memory::{Delivery, InMemoryRepository, RecordingBroadcaster};
pub use participant::*;
pub use ports::*;
pub use records::*;
pub use simulation::*;

// Constants are accessed via `redenom_types::constants::FOO`.
