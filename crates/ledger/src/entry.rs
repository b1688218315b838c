use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plantflow_core::{AggregateId, DomainResult, ItemId, LocationId, ensure_positive};

/// Ledger partition: one running balance per item per location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub item: ItemId,
    pub location: LocationId,
}

impl LedgerKey {
    pub fn new(item: ItemId, location: LocationId) -> Self {
        Self { item, location }
    }
}

impl core::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.item, self.location)
    }
}

/// What moved the stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    OpeningBalance,
    Receipt,
    ProductionOut,
    ProductionIn,
    IssueOut,
    IssueIn,
    ReturnOut,
    ReturnIn,
    TransferOut,
    TransferIn,
    RepackOut,
    RepackIn,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::OpeningBalance => "opening_balance",
            MovementKind::Receipt => "receipt",
            MovementKind::ProductionOut => "production_out",
            MovementKind::ProductionIn => "production_in",
            MovementKind::IssueOut => "issue_out",
            MovementKind::IssueIn => "issue_in",
            MovementKind::ReturnOut => "return_out",
            MovementKind::ReturnIn => "return_in",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::RepackOut => "repack_out",
            MovementKind::RepackIn => "repack_in",
        }
    }
}

/// Ledger transaction type. Compensating entries keep the original movement
/// kind but are a distinct `_reversal` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum TransactionType {
    Movement(MovementKind),
    Reversal(MovementKind),
}

impl TransactionType {
    pub fn kind(&self) -> MovementKind {
        match self {
            TransactionType::Movement(k) | TransactionType::Reversal(k) => *k,
        }
    }

    pub fn is_reversal(&self) -> bool {
        matches!(self, TransactionType::Reversal(_))
    }

    pub fn reversed(&self) -> Self {
        TransactionType::Reversal(self.kind())
    }
}

impl From<MovementKind> for TransactionType {
    fn from(kind: MovementKind) -> Self {
        TransactionType::Movement(kind)
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransactionType::Movement(k) => f.write_str(k.as_str()),
            TransactionType::Reversal(k) => write!(f, "{}_reversal", k.as_str()),
        }
    }
}

/// Kind of source document a ledger entry points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Receipt,
    Issue,
    Return,
    Transfer,
    Production,
    Repacking,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: AggregateId,
    pub kind: ReferenceKind,
    /// Human document number (e.g. "ISS-0042").
    pub reference_no: String,
}

impl DocumentRef {
    pub fn new(id: AggregateId, kind: ReferenceKind, reference_no: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            reference_no: reference_no.into(),
        }
    }
}

/// A leg waiting to be committed. The store assigns sequence and balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub key: LedgerKey,
    pub transaction_type: TransactionType,
    pub reference: DocumentRef,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerPosting {
    pub fn credit(
        key: LedgerKey,
        transaction_type: impl Into<TransactionType>,
        reference: DocumentRef,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            key,
            transaction_type: transaction_type.into(),
            reference,
            quantity_in: ensure_positive(quantity, "credit quantity")?,
            quantity_out: Decimal::ZERO,
            occurred_at,
        })
    }

    pub fn debit(
        key: LedgerKey,
        transaction_type: impl Into<TransactionType>,
        reference: DocumentRef,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            key,
            transaction_type: transaction_type.into(),
            reference,
            quantity_in: Decimal::ZERO,
            quantity_out: ensure_positive(quantity, "debit quantity")?,
            occurred_at,
        })
    }

    pub fn net(&self) -> Decimal {
        self.quantity_in - self.quantity_out
    }
}

/// Immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    /// Global append order across all keys.
    pub sequence: u64,
    pub entry_id: Uuid,
    pub item: ItemId,
    pub location: LocationId,
    pub transaction_type: TransactionType,
    pub reference: DocumentRef,
    pub date: DateTime<Utc>,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    /// Balance of (item, location) right after this entry.
    pub balance_snapshot: Decimal,
}

impl StockLedgerEntry {
    pub fn from_posting(sequence: u64, posting: LedgerPosting, balance_snapshot: Decimal) -> Self {
        Self {
            sequence,
            entry_id: Uuid::now_v7(),
            item: posting.key.item,
            location: posting.key.location,
            transaction_type: posting.transaction_type,
            reference: posting.reference,
            date: posting.occurred_at,
            quantity_in: posting.quantity_in,
            quantity_out: posting.quantity_out,
            balance_snapshot,
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.item, self.location)
    }

    pub fn net(&self) -> Decimal {
        self.quantity_in - self.quantity_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reversal_types_carry_suffix() {
        let t = TransactionType::from(MovementKind::TransferOut);
        assert_eq!(t.to_string(), "transfer_out");
        assert_eq!(t.reversed().to_string(), "transfer_out_reversal");
        assert!(t.reversed().is_reversal());
        assert_eq!(t.reversed().kind(), MovementKind::TransferOut);
    }

    #[test]
    fn postings_reject_non_positive_quantities() {
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        let reference = DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "RCV-1");
        assert!(
            LedgerPosting::debit(key, MovementKind::IssueOut, reference.clone(), dec!(0), Utc::now())
                .is_err()
        );
        let credit =
            LedgerPosting::credit(key, MovementKind::Receipt, reference, dec!(2.5), Utc::now()).unwrap();
        assert_eq!(credit.net(), dec!(2.5));
    }
}
