//! Phase-scoped in-memory market state.
//!
//! The store is owned by the engine layer and handed to each engine through
//! [`crate::MarketContext`]; nothing here is process-global. Partitions are
//! keyed by `(mechanism, phase)`.
//!
//! Engines follow a copy-then-commit discipline while holding the matching
//! lease: read a copy, mutate it, persist records, then [`MarketStore::replace_asks`]
//! or [`MarketStore::replace_auction`]. An error before the commit leaves
//! the shared partition exactly as it was.

use std::collections::HashSet;

use dashmap::DashMap;
use redenom_types::{
    Ask, AuctionEntry, AuctionSnapshot, AuctionStage, MarketMechanism, ParticipantId, PhaseId, Role,
};
use rust_decimal::Decimal;

use crate::LeaseKey;

/// Double-auction state for one phase.
#[derive(Debug, Clone, Default)]
pub struct AuctionBook {
    pub stage: AuctionStage,
    /// Sellers' outstanding asks.
    pub asks: Vec<AuctionEntry>,
    /// Buyers' outstanding bids.
    pub bids: Vec<AuctionEntry>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub matched_pairs: usize,
    /// Who already priced in the opening stage.
    pub submitted: HashSet<ParticipantId>,
    /// Who already traded in this phase.
    pub traded: HashSet<ParticipantId>,
}

impl AuctionBook {
    /// The side a participant of `role` posts into.
    pub fn side_mut(&mut self, role: Role) -> &mut Vec<AuctionEntry> {
        match role {
            Role::Seller => &mut self.asks,
            Role::Buyer => &mut self.bids,
        }
    }

    /// Oldest entry on the opposite side priced exactly at `price`.
    #[must_use]
    pub fn exact_counter(&self, role: Role, price: Decimal) -> Option<&AuctionEntry> {
        let opposite = match role {
            Role::Seller => &self.bids,
            Role::Buyer => &self.asks,
        };
        opposite
            .iter()
            .filter(|e| e.price == price)
            .min_by_key(|e| (e.created_at, e.id))
    }

    /// Drop any outstanding entry of `participant`.
    pub fn withdraw(&mut self, participant: ParticipantId) {
        self.asks.retain(|e| e.participant_id != participant);
        self.bids.retain(|e| e.participant_id != participant);
    }

    pub fn remove_entry(&mut self, entry: &AuctionEntry) {
        self.side_mut(entry.role).retain(|e| e.id != entry.id);
    }

    /// Recompute the best bid (highest) and best ask (lowest).
    pub fn refresh_best(&mut self) {
        self.best_bid = self.bids.iter().map(|e| e.price).max();
        self.best_ask = self.asks.iter().map(|e| e.price).min();
    }

    /// Entries counted towards closing the opening stage.
    #[must_use]
    pub fn opening_count(&self, recorded_pairs: usize) -> usize {
        self.asks.len() + self.bids.len() + recorded_pairs * 2
    }

    #[must_use]
    pub fn snapshot(&self, phase_id: PhaseId) -> AuctionSnapshot {
        AuctionSnapshot {
            phase_id,
            stage: self.stage,
            asks: self.asks.clone(),
            bids: self.bids.clone(),
            best_bid: self.best_bid,
            best_ask: self.best_ask,
            matched_pairs: self.matched_pairs,
        }
    }
}

/// All ephemeral books, partitioned by mechanism and phase.
#[derive(Debug, Default)]
pub struct MarketStore {
    asks: DashMap<(MarketMechanism, PhaseId), Vec<Ask>>,
    auctions: DashMap<PhaseId, AuctionBook>,
}

impl MarketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the ask list for `(mechanism, phase)`.
    #[must_use]
    pub fn asks(&self, mechanism: MarketMechanism, phase_id: PhaseId) -> Vec<Ask> {
        self.asks
            .get(&(mechanism, phase_id))
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Commit a new ask list. Caller must hold the matching lease.
    pub fn replace_asks(&self, mechanism: MarketMechanism, phase_id: PhaseId, asks: Vec<Ask>) {
        self.asks.insert((mechanism, phase_id), asks);
    }

    /// Copy of the auction book for `phase_id`; a fresh opening-stage book
    /// if none exists yet.
    #[must_use]
    pub fn auction(&self, phase_id: PhaseId) -> AuctionBook {
        self.auctions
            .get(&phase_id)
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Commit a new auction book. Caller must hold the matching lease.
    pub fn replace_auction(&self, phase_id: PhaseId, book: AuctionBook) {
        self.auctions.insert(phase_id, book);
    }

    /// Drop the partition guarded by `key`. Caller must hold that lease.
    pub fn clear(&self, key: LeaseKey) {
        match key {
            LeaseKey::OfferBook(p) => {
                self.asks.remove(&(MarketMechanism::PostedOffer, p));
            }
            LeaseKey::ListingBook(p) => {
                self.asks.remove(&(MarketMechanism::Decentralized, p));
            }
            LeaseKey::AuctionBook(p) => {
                self.auctions.remove(&p);
            }
        }
    }

    /// Whether any partition holds state for `phase_id`.
    #[must_use]
    pub fn has_state(&self, phase_id: PhaseId) -> bool {
        self.auctions.contains_key(&phase_id)
            || self.asks.contains_key(&(MarketMechanism::PostedOffer, phase_id))
            || self.asks.contains_key(&(MarketMechanism::Decentralized, phase_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn asks_partitioned_by_mechanism() {
        let store = MarketStore::new();
        let phase = PhaseId::new();
        let ask = Ask::new(MarketMechanism::PostedOffer, phase, ParticipantId::new(), dec(10));
        store.replace_asks(MarketMechanism::PostedOffer, phase, vec![ask]);

        assert_eq!(store.asks(MarketMechanism::PostedOffer, phase).len(), 1);
        assert!(store.asks(MarketMechanism::Decentralized, phase).is_empty());
    }

    #[test]
    fn copies_do_not_leak_into_store() {
        let store = MarketStore::new();
        let phase = PhaseId::new();
        let mut book = store.auction(phase);
        book.bids.push(AuctionEntry::new(phase, ParticipantId::new(), Role::Buyer, dec(5)));
        assert!(store.auction(phase).bids.is_empty());

        store.replace_auction(phase, book);
        assert_eq!(store.auction(phase).bids.len(), 1);
    }

    #[test]
    fn clear_drops_only_its_partition() {
        let store = MarketStore::new();
        let phase = PhaseId::new();
        store.replace_asks(MarketMechanism::Decentralized, phase, vec![]);
        store.replace_auction(phase, AuctionBook::default());

        store.clear(LeaseKey::AuctionBook(phase));
        assert!(store.has_state(phase));
        store.clear(LeaseKey::ListingBook(phase));
        assert!(!store.has_state(phase));
    }

    #[test]
    fn exact_counter_prefers_oldest_and_exact_price() {
        let phase = PhaseId::new();
        let mut book = AuctionBook::default();
        let first = AuctionEntry::new(phase, ParticipantId::new(), Role::Buyer, dec(12_000));
        let mut second = AuctionEntry::new(phase, ParticipantId::new(), Role::Buyer, dec(12_000));
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        book.bids.push(second.clone());
        book.bids.push(first.clone());
        book.bids.push(AuctionEntry::new(phase, ParticipantId::new(), Role::Buyer, dec(12_001)));

        let hit = book.exact_counter(Role::Seller, dec(12_000)).unwrap();
        assert_eq!(hit.id, first.id);
        assert!(book.exact_counter(Role::Seller, dec(11_999)).is_none());
        assert!(book.exact_counter(Role::Buyer, dec(12_000)).is_none());
    }

    #[test]
    fn best_prices_track_extremes() {
        let phase = PhaseId::new();
        let mut book = AuctionBook::default();
        for p in [13_000, 12_000, 11_000] {
            book.bids.push(AuctionEntry::new(phase, ParticipantId::new(), Role::Buyer, dec(p)));
        }
        for p in [14_000, 15_000] {
            book.asks.push(AuctionEntry::new(phase, ParticipantId::new(), Role::Seller, dec(p)));
        }
        book.refresh_best();
        assert_eq!(book.best_bid, Some(dec(13_000)));
        assert_eq!(book.best_ask, Some(dec(14_000)));
        assert_eq!(book.opening_count(1), 7);
    }
}
