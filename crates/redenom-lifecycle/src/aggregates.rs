//! Trade aggregates for phases, sessions and simulations.

use chrono::{DateTime, Duration, Utc};
use redenom_types::{TradeStats, Transaction};
use rust_decimal::Decimal;

/// Trade count and mean price of one phase's transactions.
#[must_use]
pub fn phase_stats(transactions: &[Transaction]) -> TradeStats {
    if transactions.is_empty() {
        return TradeStats::default();
    }
    let count = Decimal::from(transactions.len());
    let total: Decimal = transactions.iter().map(|t| t.price).sum();
    TradeStats {
        avg_trx_occurrence: count,
        avg_trx_price: total / count,
    }
}

/// Mean over the children that have run. Children that never ran are
/// ignored; if none ran the result is all zeros.
pub fn rollup<I>(children: I) -> TradeStats
where
    I: IntoIterator<Item = (bool, TradeStats)>,
{
    let ran: Vec<TradeStats> = children
        .into_iter()
        .filter_map(|(has_run, stats)| has_run.then_some(stats))
        .collect();
    TradeStats::mean_of(&ran)
}

/// Timestamp that marks a record as run. Always differs from `created`.
pub(crate) fn run_stamp(created: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > created {
        now
    } else {
        created + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use redenom_types::{ParticipantId, PhaseId};

    use super::*;

    fn trx(price: i64) -> Transaction {
        Transaction::new(
            PhaseId::new(),
            ParticipantId::new(),
            ParticipantId::new(),
            Decimal::new(price, 0),
        )
    }

    #[test]
    fn empty_phase_has_zero_stats() {
        assert_eq!(phase_stats(&[]), TradeStats::default());
    }

    #[test]
    fn phase_stats_count_and_mean() {
        let stats = phase_stats(&[trx(13_000), trx(14_000), trx(15_000)]);
        assert_eq!(stats.avg_trx_occurrence, Decimal::new(3, 0));
        assert_eq!(stats.avg_trx_price, Decimal::new(14_000, 0));
    }

    #[test]
    fn rollup_skips_children_that_never_ran() {
        let ran = TradeStats {
            avg_trx_occurrence: Decimal::new(2, 0),
            avg_trx_price: Decimal::new(12_000, 0),
        };
        let other = TradeStats {
            avg_trx_occurrence: Decimal::new(4, 0),
            avg_trx_price: Decimal::new(14_000, 0),
        };
        let stats = rollup([(true, ran), (false, TradeStats::default()), (true, other)]);
        assert_eq!(stats.avg_trx_occurrence, Decimal::new(3, 0));
        assert_eq!(stats.avg_trx_price, Decimal::new(13_000, 0));
    }

    #[test]
    fn run_stamp_never_equals_creation() {
        let future = Utc::now() + Duration::seconds(60);
        assert!(run_stamp(future) > future);
    }
}
