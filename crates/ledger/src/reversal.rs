//! Compensating legs. History is never deleted: undoing a document appends the
//! exact opposite of each of its entries, at the entry's original location.

use chrono::{DateTime, Utc};

use plantflow_core::{DomainError, DomainResult};

use crate::entry::{LedgerPosting, StockLedgerEntry};

/// Build one reversing posting per original movement entry of a document.
///
/// Fails with a state error if the entries already contain reversals (the document
/// was undone before).
pub fn reversal_postings(
    entries: &[StockLedgerEntry],
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<LedgerPosting>> {
    if entries.iter().any(|e| e.transaction_type.is_reversal()) {
        return Err(DomainError::state("document ledger legs are already reversed"));
    }

    let mut ordered: Vec<&StockLedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);

    Ok(ordered
        .into_iter()
        .map(|e| LedgerPosting {
            key: e.key(),
            transaction_type: e.transaction_type.reversed(),
            reference: e.reference.clone(),
            quantity_in: e.quantity_out,
            quantity_out: e.quantity_in,
            occurred_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{DocumentRef, LedgerKey, MovementKind, ReferenceKind, TransactionType};
    use plantflow_core::{AggregateId, ItemId, LocationId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn transfer_legs() -> Vec<StockLedgerEntry> {
        let item = ItemId::new();
        let store = LocationId::new();
        let floor = LocationId::new();
        let reference = DocumentRef::new(AggregateId::new(), ReferenceKind::Issue, "ISS-1");
        let out = LedgerPosting::debit(
            LedgerKey::new(item, store),
            MovementKind::IssueOut,
            reference.clone(),
            dec!(3),
            Utc::now(),
        )
        .unwrap();
        let inn = LedgerPosting::credit(
            LedgerKey::new(item, floor),
            MovementKind::IssueIn,
            reference,
            dec!(3),
            Utc::now(),
        )
        .unwrap();
        vec![
            StockLedgerEntry::from_posting(8, inn, dec!(3)),
            StockLedgerEntry::from_posting(7, out, dec!(2)),
        ]
    }

    #[test]
    fn reversal_swaps_sides_and_keeps_locations() {
        let legs = transfer_legs();
        let reversed = reversal_postings(&legs, Utc::now()).unwrap();

        assert_eq!(reversed.len(), 2);
        // Ordered by original sequence: the issue_out leg first.
        assert_eq!(reversed[0].key, legs[1].key());
        assert_eq!(reversed[0].quantity_in, dec!(3));
        assert_eq!(
            reversed[0].transaction_type,
            TransactionType::Reversal(MovementKind::IssueOut)
        );
        assert_eq!(reversed[1].quantity_out, dec!(3));
        let net: Decimal = reversed.iter().map(LedgerPosting::net).sum();
        assert_eq!(net, Decimal::ZERO);
    }

    #[test]
    fn reversing_twice_is_a_state_error() {
        let legs = transfer_legs();
        let mut with_reversal = legs.clone();
        let mut undone = legs[0].clone();
        undone.transaction_type = undone.transaction_type.reversed();
        with_reversal.push(undone);
        assert!(matches!(
            reversal_postings(&with_reversal, Utc::now()),
            Err(DomainError::State(_))
        ));
    }
}
