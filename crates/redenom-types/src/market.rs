//! Market mechanisms, phase types and participant roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The trading institution a simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarketMechanism {
    /// Sellers post one ask each; buyers pick from the list.
    PostedOffer,
    /// Continuous double auction with an opening sealed-bid stage.
    DoubleAuction,
    /// Bilateral bargaining over independent listings.
    Decentralized,
}

impl fmt::Display for MarketMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostedOffer => write!(f, "POSTED_OFFER"),
            Self::DoubleAuction => write!(f, "DOUBLE_AUCTION"),
            Self::Decentralized => write!(f, "DECENTRALIZED"),
        }
    }
}

/// The three fixed trading windows of a session, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseType {
    PreRedenomination,
    Transition,
    PostRedenomination,
}

impl PhaseType {
    /// Creation order of a session's phases.
    pub const ORDERED: [Self; 3] = [
        Self::PreRedenomination,
        Self::Transition,
        Self::PostRedenomination,
    ];

    /// Zero-based position within a session.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::PreRedenomination => 0,
            Self::Transition => 1,
            Self::PostRedenomination => 2,
        }
    }
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreRedenomination => write!(f, "PRE_REDENOMINATION"),
            Self::Transition => write!(f, "TRANSITION"),
            Self::PostRedenomination => write!(f, "POST_REDENOMINATION"),
        }
    }
}

/// Which side of the market a participant trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Buyer,
    Seller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
        }
    }
}
