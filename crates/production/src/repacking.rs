//! Repacking: finished units re-bundled into retail units.
//!
//! `repack_quantity` is fixed at creation; `remaining_qty` only goes down.
//! Consumed quantity is always derived from the two.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ItemId, LocationId, Shortfall,
    StockTarget, ensure_positive,
};
use plantflow_events::Event;

use crate::batch::ProductionBatchId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepackingId(pub AggregateId);

impl RepackingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RepackingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: RepackingRecord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackingRecord {
    id: RepackingId,
    repack_no: String,
    source_item: Option<ItemId>,
    repack_item: Option<ItemId>,
    location: Option<LocationId>,
    source_quantity: Decimal,
    repack_quantity: Decimal,
    remaining_qty: Decimal,
    source_batch: Option<ProductionBatchId>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl RepackingRecord {
    pub fn empty(id: RepackingId) -> Self {
        Self {
            id,
            repack_no: String::new(),
            source_item: None,
            repack_item: None,
            location: None,
            source_quantity: Decimal::ZERO,
            repack_quantity: Decimal::ZERO,
            remaining_qty: Decimal::ZERO,
            source_batch: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn repack_no(&self) -> &str {
        &self.repack_no
    }

    pub fn source_item(&self) -> Option<ItemId> {
        self.source_item
    }

    pub fn repack_item(&self) -> Option<ItemId> {
        self.repack_item
    }

    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn source_quantity(&self) -> Decimal {
        self.source_quantity
    }

    pub fn repack_quantity(&self) -> Decimal {
        self.repack_quantity
    }

    pub fn remaining_qty(&self) -> Decimal {
        self.remaining_qty
    }

    pub fn consumed_qty(&self) -> Decimal {
        self.repack_quantity - self.remaining_qty
    }

    pub fn source_batch(&self) -> Option<ProductionBatchId> {
        self.source_batch
    }
}

impl AggregateRoot for RepackingRecord {
    type Id = RepackingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRepacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepacking {
    pub repacking_id: RepackingId,
    pub repack_no: String,
    pub source_item: ItemId,
    pub repack_item: ItemId,
    pub location: LocationId,
    /// Source units taken, in the source item's catalog unit.
    pub source_quantity: Decimal,
    /// Repacked units produced, in the repack item's catalog unit.
    pub repack_quantity: Decimal,
    pub source_batch: Option<ProductionBatchId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeRepacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRepacked {
    pub repacking_id: RepackingId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteRepacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRepacking {
    pub repacking_id: RepackingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepackingCommand {
    CreateRepacking(CreateRepacking),
    ConsumeRepacked(ConsumeRepacked),
    DeleteRepacking(DeleteRepacking),
}

impl RepackingCommand {
    pub fn repacking_id(&self) -> RepackingId {
        match self {
            RepackingCommand::CreateRepacking(c) => c.repacking_id,
            RepackingCommand::ConsumeRepacked(c) => c.repacking_id,
            RepackingCommand::DeleteRepacking(c) => c.repacking_id,
        }
    }
}

/// Event: RepackingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackingCreated {
    pub repacking_id: RepackingId,
    pub repack_no: String,
    pub source_item: ItemId,
    pub repack_item: ItemId,
    pub location: LocationId,
    pub source_quantity: Decimal,
    pub repack_quantity: Decimal,
    pub source_batch: Option<ProductionBatchId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RepackedConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackedConsumed {
    pub repacking_id: RepackingId,
    pub quantity: Decimal,
    pub remaining_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RepackingDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepackingDeleted {
    pub repacking_id: RepackingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepackingEvent {
    RepackingCreated(RepackingCreated),
    RepackedConsumed(RepackedConsumed),
    RepackingDeleted(RepackingDeleted),
}

impl Event for RepackingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RepackingEvent::RepackingCreated(_) => "production.repacking.created",
            RepackingEvent::RepackedConsumed(_) => "production.repacking.consumed",
            RepackingEvent::RepackingDeleted(_) => "production.repacking.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RepackingEvent::RepackingCreated(e) => e.occurred_at,
            RepackingEvent::RepackedConsumed(e) => e.occurred_at,
            RepackingEvent::RepackingDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RepackingRecord {
    type Command = RepackingCommand;
    type Event = RepackingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RepackingEvent::RepackingCreated(e) => {
                self.id = e.repacking_id;
                self.repack_no = e.repack_no.clone();
                self.source_item = Some(e.source_item);
                self.repack_item = Some(e.repack_item);
                self.location = Some(e.location);
                self.source_quantity = e.source_quantity;
                self.repack_quantity = e.repack_quantity;
                self.remaining_qty = e.repack_quantity;
                self.source_batch = e.source_batch;
                self.created = true;
            }
            RepackingEvent::RepackedConsumed(e) => {
                self.remaining_qty = e.remaining_after;
            }
            RepackingEvent::RepackingDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.id != command.repacking_id() {
            return Err(DomainError::invariant("repacking_id mismatch"));
        }
        match command {
            RepackingCommand::CreateRepacking(cmd) => self.handle_create(cmd),
            RepackingCommand::ConsumeRepacked(cmd) => self.handle_consume(cmd),
            RepackingCommand::DeleteRepacking(cmd) => self.handle_delete(cmd),
        }
    }
}

impl RepackingRecord {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("repacking {}", self.id)));
        }
        if self.deleted {
            return Err(DomainError::state(format!(
                "repacking {} is deleted",
                self.repack_no
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRepacking) -> Result<Vec<RepackingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("repacking already exists"));
        }
        if cmd.repack_no.trim().is_empty() {
            return Err(DomainError::validation("repack_no cannot be empty"));
        }
        if cmd.source_item == cmd.repack_item {
            return Err(DomainError::validation(
                "source and repack item must be different",
            ));
        }
        ensure_positive(cmd.source_quantity, "source quantity")?;
        ensure_positive(cmd.repack_quantity, "repack quantity")?;

        Ok(vec![RepackingEvent::RepackingCreated(RepackingCreated {
            repacking_id: cmd.repacking_id,
            repack_no: cmd.repack_no.trim().to_string(),
            source_item: cmd.source_item,
            repack_item: cmd.repack_item,
            location: cmd.location,
            source_quantity: cmd.source_quantity,
            repack_quantity: cmd.repack_quantity,
            source_batch: cmd.source_batch,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeRepacked) -> Result<Vec<RepackingEvent>, DomainError> {
        self.ensure_live()?;
        let quantity = ensure_positive(cmd.quantity, "consumed quantity")?;
        if quantity > self.remaining_qty {
            let (item, location) = self
                .repack_item
                .zip(self.location)
                .ok_or_else(|| DomainError::invariant("created repacking without item or location"))?;
            return Err(DomainError::InsufficientStock(Shortfall::new(
                StockTarget::Item(item),
                location,
                quantity,
                self.remaining_qty,
            )));
        }
        Ok(vec![RepackingEvent::RepackedConsumed(RepackedConsumed {
            repacking_id: cmd.repacking_id,
            quantity,
            remaining_after: self.remaining_qty - quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteRepacking) -> Result<Vec<RepackingEvent>, DomainError> {
        self.ensure_live()?;
        if self.consumed_qty() > Decimal::ZERO {
            return Err(DomainError::state(format!(
                "repacking {} has {} unit(s) consumed downstream",
                self.repack_no,
                self.consumed_qty()
            )));
        }
        Ok(vec![RepackingEvent::RepackingDeleted(RepackingDeleted {
            repacking_id: cmd.repacking_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap()
    }

    fn execute(record: &mut RepackingRecord, cmd: RepackingCommand) -> Result<(), DomainError> {
        for event in record.handle(&cmd)? {
            record.apply(&event);
        }
        Ok(())
    }

    fn created(repack_quantity: Decimal) -> RepackingRecord {
        let repacking_id = RepackingId::new(AggregateId::new());
        let mut record = RepackingRecord::empty(repacking_id);
        execute(
            &mut record,
            RepackingCommand::CreateRepacking(CreateRepacking {
                repacking_id,
                repack_no: "RP-01".to_string(),
                source_item: ItemId::new(),
                repack_item: ItemId::new(),
                location: LocationId::new(),
                source_quantity: dec!(60),
                repack_quantity,
                source_batch: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        record
    }

    fn consume(record: &RepackingRecord, quantity: Decimal) -> RepackingCommand {
        RepackingCommand::ConsumeRepacked(ConsumeRepacked {
            repacking_id: *record.id(),
            quantity,
            occurred_at: test_time(),
        })
    }

    fn delete(record: &RepackingRecord) -> RepackingCommand {
        RepackingCommand::DeleteRepacking(DeleteRepacking {
            repacking_id: *record.id(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn consumed_is_derived_from_remaining() {
        let mut record = created(dec!(10));
        let cmd = consume(&record, dec!(3));
        execute(&mut record, cmd).unwrap();
        assert_eq!(record.remaining_qty(), dec!(7));
        assert_eq!(record.consumed_qty(), dec!(3));
    }

    #[test]
    fn cannot_consume_more_than_remaining() {
        let record = created(dec!(2));
        match record.handle(&consume(&record, dec!(3))).unwrap_err() {
            DomainError::InsufficientStock(s) => assert_eq!(s.missing(), dec!(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn delete_is_refused_once_consumed() {
        let mut record = created(dec!(10));
        let cmd = consume(&record, dec!(1));
        execute(&mut record, cmd).unwrap();
        assert!(matches!(
            record.handle(&delete(&record)),
            Err(DomainError::State(_))
        ));
    }

    #[test]
    fn deleted_record_rejects_further_commands() {
        let mut record = created(dec!(10));
        let cmd = delete(&record);
        execute(&mut record, cmd).unwrap();
        assert!(record.is_deleted());
        assert!(matches!(
            record.handle(&delete(&record)),
            Err(DomainError::State(_))
        ));
        assert!(record.handle(&consume(&record, dec!(1))).is_err());
    }

    proptest! {
        /// Property: remaining never increases and stays within [0, repack_quantity].
        #[test]
        fn remaining_is_monotonic_and_bounded(
            draws in prop::collection::vec(1i64..50, 0..20),
        ) {
            let mut record = created(dec!(100));
            let mut previous = record.remaining_qty();
            for d in draws {
                let cmd = consume(&record, Decimal::from(d));
                let _ = execute(&mut record, cmd);
                prop_assert!(record.remaining_qty() <= previous);
                prop_assert!(record.remaining_qty() >= Decimal::ZERO);
                prop_assert!(record.remaining_qty() <= record.repack_quantity());
                previous = record.remaining_qty();
            }
        }
    }
}
