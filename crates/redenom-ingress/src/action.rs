//! Typed participant actions.

use redenom_types::{
    ConnectionId, EntryId, LoginToken, MarketError, MarketMechanism, ParticipantId, PhaseId,
    Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    pub sender_connection_id: ConnectionId,
}

impl Envelope {
    #[must_use]
    pub fn new(sender: ConnectionId, action: &Action) -> Self {
        let (kind, payload) = match serde_json::to_value(action) {
            Ok(Value::Object(mut map)) => (
                map.remove("kind")
                    .and_then(|k| k.as_str().map(str::to_string))
                    .unwrap_or_default(),
                map.remove("payload").unwrap_or(Value::Null),
            ),
            _ => (String::new(), Value::Null),
        };
        Self {
            kind,
            payload,
            sender_connection_id: sender,
        }
    }

    /// Decode `kind` + `payload` into an [`Action`].
    pub fn action(&self) -> Result<Action> {
        let mut map = Map::new();
        map.insert("kind".to_string(), Value::String(self.kind.clone()));
        if !self.payload.is_null() {
            map.insert("payload".to_string(), self.payload.clone());
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|err| MarketError::MalformedAction(format!("{}: {err}", self.kind)))
    }
}

/// What a participant asks the market to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Join {
        participant_id: ParticipantId,
        login_token: LoginToken,
    },
    Ready,
    #[serde(rename_all = "camelCase")]
    PostOffer { phase_id: PhaseId, price: Decimal },
    #[serde(rename_all = "camelCase")]
    BuyOffer { phase_id: PhaseId, offer_id: EntryId },
    #[serde(rename_all = "camelCase")]
    SubmitAuctionPrice { phase_id: PhaseId, price: Decimal },
    #[serde(rename_all = "camelCase")]
    PostListing { phase_id: PhaseId, price: Decimal },
    #[serde(rename_all = "camelCase")]
    BuyListing {
        phase_id: PhaseId,
        listing_id: EntryId,
    },
    #[serde(rename_all = "camelCase")]
    OfferBook { phase_id: PhaseId },
    #[serde(rename_all = "camelCase")]
    AuctionBook { phase_id: PhaseId },
    #[serde(rename_all = "camelCase")]
    ListingBook { phase_id: PhaseId },
}

impl Action {
    /// Mechanism a market action is addressed to. `None` for identity actions.
    #[must_use]
    pub fn mechanism(&self) -> Option<MarketMechanism> {
        match self {
            Self::Join { .. } | Self::Ready => None,
            Self::PostOffer { .. } | Self::BuyOffer { .. } | Self::OfferBook { .. } => {
                Some(MarketMechanism::PostedOffer)
            }
            Self::SubmitAuctionPrice { .. } | Self::AuctionBook { .. } => {
                Some(MarketMechanism::DoubleAuction)
            }
            Self::PostListing { .. } | Self::BuyListing { .. } | Self::ListingBook { .. } => {
                Some(MarketMechanism::Decentralized)
            }
        }
    }

    #[must_use]
    pub fn phase_id(&self) -> Option<PhaseId> {
        match self {
            Self::Join { .. } | Self::Ready => None,
            Self::PostOffer { phase_id, .. }
            | Self::BuyOffer { phase_id, .. }
            | Self::SubmitAuctionPrice { phase_id, .. }
            | Self::PostListing { phase_id, .. }
            | Self::BuyListing { phase_id, .. }
            | Self::OfferBook { phase_id }
            | Self::AuctionBook { phase_id }
            | Self::ListingBook { phase_id } => Some(*phase_id),
        }
    }

    /// Wire name, as carried in `kind`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Ready => "ready",
            Self::PostOffer { .. } => "postOffer",
            Self::BuyOffer { .. } => "buyOffer",
            Self::SubmitAuctionPrice { .. } => "submitAuctionPrice",
            Self::PostListing { .. } => "postListing",
            Self::BuyListing { .. } => "buyListing",
            Self::OfferBook { .. } => "offerBook",
            Self::AuctionBook { .. } => "auctionBook",
            Self::ListingBook { .. } => "listingBook",
        }
    }
}
