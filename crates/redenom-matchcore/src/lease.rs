//! Named exclusive leases over logical market resources.
//!
//! Every read-modify-write of a phase's book runs while holding the lease
//! for that book. Leases with different keys never block each other; two
//! callers asking for the same key are served one after the other, the
//! second suspending (not spinning) until the first lease is dropped.
//!
//! Engines hold at most one lease at a time. Phase transitions take every
//! lease of a phase, always in [`LeaseKey::all_for_phase`] order, so the two
//! never deadlock. The guard releases on every exit path, including `?`
//! returns.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use redenom_types::{MarketMechanism, PhaseId};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The fixed set of lease names, each scoped to one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseKey {
    /// Posted-offer ask list.
    OfferBook(PhaseId),
    /// Double-auction bids, asks, best prices and stage.
    AuctionBook(PhaseId),
    /// Decentralized listings.
    ListingBook(PhaseId),
}

impl LeaseKey {
    /// The lease guarding `mechanism`'s book for `phase_id`.
    #[must_use]
    pub fn for_mechanism(mechanism: MarketMechanism, phase_id: PhaseId) -> Self {
        match mechanism {
            MarketMechanism::PostedOffer => Self::OfferBook(phase_id),
            MarketMechanism::DoubleAuction => Self::AuctionBook(phase_id),
            MarketMechanism::Decentralized => Self::ListingBook(phase_id),
        }
    }

    /// Every lease scoped to `phase_id`, in acquisition order.
    #[must_use]
    pub fn all_for_phase(phase_id: PhaseId) -> [Self; 3] {
        [
            Self::OfferBook(phase_id),
            Self::AuctionBook(phase_id),
            Self::ListingBook(phase_id),
        ]
    }

    #[must_use]
    pub fn phase_id(&self) -> PhaseId {
        match self {
            Self::OfferBook(p) | Self::AuctionBook(p) | Self::ListingBook(p) => *p,
        }
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OfferBook(p) => write!(f, "sellers-offer-book:{}", p.0),
            Self::AuctionBook(p) => write!(f, "auction-book:{}", p.0),
            Self::ListingBook(p) => write!(f, "decentralized-listings:{}", p.0),
        }
    }
}

/// Registry of lease slots, created lazily per key.
#[derive(Debug, Default)]
pub struct LeaseGate {
    slots: DashMap<LeaseKey, Arc<Mutex<()>>>,
}

impl LeaseGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: LeaseKey) -> Arc<Mutex<()>> {
        // The map guard is dropped at the end of this statement, before any await.
        Arc::clone(self.slots.entry(key).or_default().value())
    }

    /// Wait for and take the lease named `key`.
    pub async fn acquire(&self, key: LeaseKey) -> Lease {
        let guard = self.slot(key).lock_owned().await;
        tracing::trace!(lease = %key, "lease acquired");
        Lease {
            key,
            acquired_at: Instant::now(),
            _guard: guard,
        }
    }

    /// Take the lease only if it is free right now.
    pub fn try_acquire(&self, key: LeaseKey) -> Option<Lease> {
        let guard = self.slot(key).try_lock_owned().ok()?;
        tracing::trace!(lease = %key, "lease acquired");
        Some(Lease {
            key,
            acquired_at: Instant::now(),
            _guard: guard,
        })
    }

    /// Whether someone currently holds `key`.
    #[must_use]
    pub fn is_held(&self, key: LeaseKey) -> bool {
        self.slots
            .get(&key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }
}

/// Exclusive hold on one named resource. Released on drop.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct Lease {
    key: LeaseKey,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl Lease {
    #[must_use]
    pub fn key(&self) -> LeaseKey {
        self.key
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("key", &self.key).finish_non_exhaustive()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        tracing::trace!(
            lease = %self.key,
            held_us = self.acquired_at.elapsed().as_micros(),
            "lease released"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let gate = LeaseGate::new();
        let key = LeaseKey::OfferBook(PhaseId::new());

        let lease = gate.acquire(key).await;
        assert!(gate.is_held(key));
        assert!(gate.try_acquire(key).is_none());

        drop(lease);
        assert!(!gate.is_held(key));
        assert!(gate.try_acquire(key).is_some());
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_block() {
        let gate = LeaseGate::new();
        let phase = PhaseId::new();
        let _a = gate.acquire(LeaseKey::OfferBook(phase)).await;
        let b = gate.try_acquire(LeaseKey::AuctionBook(phase));
        let c = gate.try_acquire(LeaseKey::OfferBook(PhaseId::new()));
        assert!(b.is_some());
        assert!(c.is_some());
    }

    #[tokio::test]
    async fn released_on_error_path() {
        async fn failing(gate: &LeaseGate, key: LeaseKey) -> Result<(), &'static str> {
            let _lease = gate.acquire(key).await;
            let step: Result<(), &'static str> = Err("boom");
            step?;
            Ok(())
        }

        let gate = LeaseGate::new();
        let key = LeaseKey::ListingBook(PhaseId::new());
        assert!(failing(&gate, key).await.is_err());
        assert!(!gate.is_held(key));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn contending_tasks_are_serialized() {
        let gate = Arc::new(LeaseGate::new());
        let key = LeaseKey::AuctionBook(PhaseId::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _lease = gate.acquire(key).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_names() {
        let phase = PhaseId::new();
        assert!(LeaseKey::OfferBook(phase).to_string().starts_with("sellers-offer-book:"));
        assert_eq!(
            LeaseKey::for_mechanism(MarketMechanism::DoubleAuction, phase),
            LeaseKey::AuctionBook(phase)
        );
        assert_eq!(LeaseKey::all_for_phase(phase).len(), 3);
    }
}
