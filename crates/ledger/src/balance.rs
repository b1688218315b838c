use rust_decimal::Decimal;

use plantflow_core::{DomainError, DomainResult};

use crate::entry::StockLedgerEntry;

/// Σ(quantity_in − quantity_out) over `entries`.
pub fn fold_balance<'a>(entries: impl IntoIterator<Item = &'a StockLedgerEntry>) -> Decimal {
    entries.into_iter().map(StockLedgerEntry::net).sum()
}

/// Check that every entry's snapshot equals the running sum up to and including it,
/// and that no snapshot is negative. `entries` must be the full history of one key
/// in append order.
pub fn verify_snapshots(entries: &[StockLedgerEntry]) -> DomainResult<()> {
    let mut running = Decimal::ZERO;
    let mut last_sequence = 0u64;
    for e in entries {
        if e.sequence <= last_sequence {
            return Err(DomainError::invariant(format!(
                "non-monotonic ledger sequence (last={last_sequence}, found={})",
                e.sequence
            )));
        }
        last_sequence = e.sequence;
        running += e.net();
        if running != e.balance_snapshot {
            return Err(DomainError::invariant(format!(
                "balance snapshot {} at sequence {} does not match running balance {running}",
                e.balance_snapshot, e.sequence
            )));
        }
        if running < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "negative balance {running} at sequence {}",
                e.sequence
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{DocumentRef, LedgerKey, LedgerPosting, MovementKind, ReferenceKind};
    use chrono::Utc;
    use plantflow_core::{AggregateId, ItemId, LocationId};
    use proptest::prelude::*;

    fn chain(deltas: &[i64]) -> Vec<StockLedgerEntry> {
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        let reference = DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "RCV-1");
        let mut running = Decimal::ZERO;
        deltas
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let qty = Decimal::from(d.abs());
                let posting = if *d >= 0 {
                    LedgerPosting::credit(key, MovementKind::Receipt, reference.clone(), qty, Utc::now())
                } else {
                    LedgerPosting::debit(key, MovementKind::IssueOut, reference.clone(), qty, Utc::now())
                }
                .unwrap();
                running += posting.net();
                StockLedgerEntry::from_posting(i as u64 + 1, posting, running)
            })
            .collect()
    }

    #[test]
    fn tampered_snapshot_is_detected() {
        let mut entries = chain(&[5, -2]);
        entries[1].balance_snapshot = Decimal::from(4);
        assert!(verify_snapshots(&entries).is_err());
    }

    #[test]
    fn negative_running_balance_is_detected() {
        let entries = chain(&[2, -3]);
        assert!(matches!(
            verify_snapshots(&entries),
            Err(DomainError::InvariantViolation(msg)) if msg.contains("negative")
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the latest snapshot always equals the folded balance.
        #[test]
        fn latest_snapshot_equals_fold(credits in prop::collection::vec(1i64..1_000, 1..20)) {
            let mut deltas = Vec::new();
            for c in credits {
                deltas.push(c);
                deltas.push(-(c / 2).max(1));
            }
            let entries = chain(&deltas);
            prop_assert!(verify_snapshots(&entries).is_ok());
            let last = entries.last().map(|e| e.balance_snapshot).unwrap_or_default();
            prop_assert_eq!(fold_balance(&entries), last);
        }
    }
}
