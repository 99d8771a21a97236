//! # redenom-matchcore
//!
//! **Market-matching engines for redenomination experiments.**
//!
//! - [`PriceValidator`]: normalises every submitted price to the
//!   pre-redenomination scale and enforces the phase's pricing rule
//! - [`LeaseGate`]: named exclusive leases; every read-modify-write of
//!   shared market state happens while holding one
//! - [`MarketStore`]: phase-scoped in-memory books, injected, never global
//! - Engines: [`PostedOfferEngine`], [`DoubleAuctionEngine`],
//!   [`DecentralizedEngine`]
//!
//! ## Submission flow
//!
//! ```text
//! resolve participant -> phase running? -> PriceValidator
//!     -> acquire lease -> stage mutation on a copy -> persist records
//!     -> commit copy to MarketStore -> release lease -> broadcast
//! ```
//!
//! A failure anywhere before the commit leaves the shared books untouched.

pub mod asks;
pub mod context;
pub mod decentralized;
pub mod double_auction;
pub mod lease;
pub mod posted_offer;
pub mod pricing;
pub mod store;

pub use asks::Purchase;
pub use context::MarketContext;
pub use decentralized::DecentralizedEngine;
pub use double_auction::{AuctionOutcome, DoubleAuctionEngine};
pub use lease::{Lease, LeaseGate, LeaseKey};
pub use posted_offer::PostedOfferEngine;
pub use pricing::PriceValidator;
pub use store::{AuctionBook, MarketStore};
