use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ItemId, LocationId, Shortfall,
    StockTarget, checked_mul, ensure_positive,
};
use plantflow_events::Event;

use crate::remaining::RemainingMeasurement;

/// Production batch identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductionBatchId(pub AggregateId);

impl ProductionBatchId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductionBatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    PendingMaterial,
    MaterialsIssued,
    InProgress,
    Completed,
    PartiallyTransferred,
    FullyTransferred,
}

impl BatchStatus {
    fn can_start(self) -> bool {
        matches!(
            self,
            BatchStatus::Planned | BatchStatus::PendingMaterial | BatchStatus::MaterialsIssued
        )
    }

    /// Completed batches whose finished units can still be measured or drawn.
    fn holds_remaining(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::PartiallyTransferred
        )
    }
}

/// Cumulative losses recorded against a batch. Created zeroed at completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WastageRecord {
    pub wastage_units: Decimal,
    pub variance_weight: Decimal,
    pub verifications: u32,
}

/// One raw-material debit posted when the batch completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedMaterial {
    pub item: ItemId,
    pub location: LocationId,
    pub quantity: Decimal,
    /// Category the item was allocated for, if the recipe line was category-scoped.
    pub category: Option<plantflow_core::CategoryId>,
}

/// Aggregate root: ProductionBatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionBatch {
    id: ProductionBatchId,
    batch_no: String,
    item: Option<ItemId>,
    location: Option<LocationId>,
    planned_qty: Decimal,
    peetu_item: Option<ItemId>,
    peetu_qty: Option<Decimal>,
    status: BatchStatus,
    actual_qty: Decimal,
    remaining_qty: Decimal,
    remaining_weight: Decimal,
    unit_mass: Decimal,
    /// Units drawn downstream and not restored.
    drawn_qty: Decimal,
    consumed: Vec<ConsumedMaterial>,
    wastage: WastageRecord,
    verifications: Vec<RemainingVerified>,
    version: u64,
    created: bool,
}

impl ProductionBatch {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductionBatchId) -> Self {
        Self {
            id,
            batch_no: String::new(),
            item: None,
            location: None,
            planned_qty: Decimal::ZERO,
            peetu_item: None,
            peetu_qty: None,
            status: BatchStatus::Planned,
            actual_qty: Decimal::ZERO,
            remaining_qty: Decimal::ZERO,
            remaining_weight: Decimal::ZERO,
            unit_mass: Decimal::ZERO,
            drawn_qty: Decimal::ZERO,
            consumed: Vec::new(),
            wastage: WastageRecord::default(),
            verifications: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn batch_no(&self) -> &str {
        &self.batch_no
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn planned_qty(&self) -> Decimal {
        self.planned_qty
    }

    pub fn peetu(&self) -> Option<(ItemId, Decimal)> {
        self.peetu_item.zip(self.peetu_qty)
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn actual_qty(&self) -> Decimal {
        self.actual_qty
    }

    pub fn remaining_qty(&self) -> Decimal {
        self.remaining_qty
    }

    pub fn remaining_weight(&self) -> Decimal {
        self.remaining_weight
    }

    pub fn unit_mass(&self) -> Decimal {
        self.unit_mass
    }

    pub fn drawn_qty(&self) -> Decimal {
        self.drawn_qty
    }

    pub fn consumed(&self) -> &[ConsumedMaterial] {
        &self.consumed
    }

    pub fn wastage(&self) -> &WastageRecord {
        &self.wastage
    }

    /// Append-only verification history, oldest first.
    pub fn verifications(&self) -> &[RemainingVerified] {
        &self.verifications
    }
}

impl AggregateRoot for ProductionBatch {
    type Id = ProductionBatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub batch_id: ProductionBatchId,
    pub batch_no: String,
    pub item: ItemId,
    pub location: LocationId,
    pub planned_qty: Decimal,
    pub peetu_item: Option<ItemId>,
    pub peetu_qty: Option<Decimal>,
    /// Outcome of the dry-run availability check made when planning.
    pub materials_available: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkMaterialsIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkMaterialsIssued {
    pub batch_id: ProductionBatchId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartProduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProduction {
    pub batch_id: ProductionBatchId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteProduction.
///
/// `consumed` is the already-validated debit plan; the aggregate only records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteProduction {
    pub batch_id: ProductionBatchId,
    pub unit_mass: Decimal,
    pub consumed: Vec<ConsumedMaterial>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VerifyRemaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRemaining {
    pub batch_id: ProductionBatchId,
    pub measured_weight: Decimal,
    pub reason: String,
    pub allow_reverify: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DrawRemaining (downstream consumption of finished units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRemaining {
    pub batch_id: ProductionBatchId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestoreRemaining. Gives back units of an earlier draw whose consumer
/// was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRemaining {
    pub batch_id: ProductionBatchId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchCommand {
    CreateBatch(CreateBatch),
    MarkMaterialsIssued(MarkMaterialsIssued),
    StartProduction(StartProduction),
    CompleteProduction(CompleteProduction),
    VerifyRemaining(VerifyRemaining),
    DrawRemaining(DrawRemaining),
    RestoreRemaining(RestoreRemaining),
}

impl BatchCommand {
    pub fn batch_id(&self) -> ProductionBatchId {
        match self {
            BatchCommand::CreateBatch(c) => c.batch_id,
            BatchCommand::MarkMaterialsIssued(c) => c.batch_id,
            BatchCommand::StartProduction(c) => c.batch_id,
            BatchCommand::CompleteProduction(c) => c.batch_id,
            BatchCommand::VerifyRemaining(c) => c.batch_id,
            BatchCommand::DrawRemaining(c) => c.batch_id,
            BatchCommand::RestoreRemaining(c) => c.batch_id,
        }
    }
}

/// Event: BatchCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub batch_id: ProductionBatchId,
    pub batch_no: String,
    pub item: ItemId,
    pub location: LocationId,
    pub planned_qty: Decimal,
    pub peetu_item: Option<ItemId>,
    pub peetu_qty: Option<Decimal>,
    pub status: BatchStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialsIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialsIssued {
    pub batch_id: ProductionBatchId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStarted {
    pub batch_id: ProductionBatchId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchCompleted. Remaining quantity starts at the theoretical yield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCompleted {
    pub batch_id: ProductionBatchId,
    pub actual_qty: Decimal,
    pub unit_mass: Decimal,
    pub remaining_weight: Decimal,
    pub consumed: Vec<ConsumedMaterial>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemainingVerified. Immutable verification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingVerified {
    pub batch_id: ProductionBatchId,
    pub measurement: RemainingMeasurement,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemainingDrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingDrawn {
    pub batch_id: ProductionBatchId,
    pub quantity: Decimal,
    pub remaining_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemainingRestored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingRestored {
    pub batch_id: ProductionBatchId,
    pub quantity: Decimal,
    pub remaining_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchEvent {
    BatchCreated(BatchCreated),
    MaterialsIssued(MaterialsIssued),
    ProductionStarted(ProductionStarted),
    BatchCompleted(BatchCompleted),
    RemainingVerified(RemainingVerified),
    RemainingDrawn(RemainingDrawn),
    RemainingRestored(RemainingRestored),
}

impl Event for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::BatchCreated(_) => "production.batch.created",
            BatchEvent::MaterialsIssued(_) => "production.batch.materials_issued",
            BatchEvent::ProductionStarted(_) => "production.batch.started",
            BatchEvent::BatchCompleted(_) => "production.batch.completed",
            BatchEvent::RemainingVerified(_) => "production.batch.remaining_verified",
            BatchEvent::RemainingDrawn(_) => "production.batch.remaining_drawn",
            BatchEvent::RemainingRestored(_) => "production.batch.remaining_restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::BatchCreated(e) => e.occurred_at,
            BatchEvent::MaterialsIssued(e) => e.occurred_at,
            BatchEvent::ProductionStarted(e) => e.occurred_at,
            BatchEvent::BatchCompleted(e) => e.occurred_at,
            BatchEvent::RemainingVerified(e) => e.occurred_at,
            BatchEvent::RemainingDrawn(e) => e.occurred_at,
            BatchEvent::RemainingRestored(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductionBatch {
    type Command = BatchCommand;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::BatchCreated(e) => {
                self.id = e.batch_id;
                self.batch_no = e.batch_no.clone();
                self.item = Some(e.item);
                self.location = Some(e.location);
                self.planned_qty = e.planned_qty;
                self.peetu_item = e.peetu_item;
                self.peetu_qty = e.peetu_qty;
                self.status = e.status;
                self.created = true;
            }
            BatchEvent::MaterialsIssued(_) => {
                self.status = BatchStatus::MaterialsIssued;
            }
            BatchEvent::ProductionStarted(_) => {
                self.status = BatchStatus::InProgress;
            }
            BatchEvent::BatchCompleted(e) => {
                self.status = BatchStatus::Completed;
                self.actual_qty = e.actual_qty;
                self.remaining_qty = e.actual_qty;
                self.unit_mass = e.unit_mass;
                self.remaining_weight = e.remaining_weight;
                self.consumed = e.consumed.clone();
                self.wastage = WastageRecord::default();
            }
            BatchEvent::RemainingVerified(e) => {
                self.remaining_qty = e.measurement.remaining_units;
                self.remaining_weight = e.measurement.remaining_weight();
                self.wastage.wastage_units += e.measurement.wastage_units;
                self.wastage.variance_weight += e.measurement.variance_weight;
                self.wastage.verifications += 1;
                self.verifications.push(e.clone());
            }
            BatchEvent::RemainingDrawn(e) => {
                self.drawn_qty += e.quantity;
                self.set_remaining(e.remaining_after);
            }
            BatchEvent::RemainingRestored(e) => {
                self.drawn_qty -= e.quantity;
                self.set_remaining(e.remaining_after);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_batch_id(command.batch_id())?;
        match command {
            BatchCommand::CreateBatch(cmd) => self.handle_create(cmd),
            BatchCommand::MarkMaterialsIssued(cmd) => self.handle_mark_issued(cmd),
            BatchCommand::StartProduction(cmd) => self.handle_start(cmd),
            BatchCommand::CompleteProduction(cmd) => self.handle_complete(cmd),
            BatchCommand::VerifyRemaining(cmd) => self.handle_verify(cmd),
            BatchCommand::DrawRemaining(cmd) => self.handle_draw(cmd),
            BatchCommand::RestoreRemaining(cmd) => self.handle_restore(cmd),
        }
    }
}

impl ProductionBatch {
    fn set_remaining(&mut self, remaining: Decimal) {
        self.remaining_qty = remaining;
        self.remaining_weight = remaining * self.unit_mass;
        self.status = if self.drawn_qty.is_zero() {
            BatchStatus::Completed
        } else if remaining.is_zero() {
            BatchStatus::FullyTransferred
        } else {
            BatchStatus::PartiallyTransferred
        };
    }

    fn ensure_batch_id(&self, batch_id: ProductionBatchId) -> Result<(), DomainError> {
        if self.id != batch_id {
            return Err(DomainError::invariant("batch_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("production batch {}", self.id)));
        }
        Ok(())
    }

    fn wrong_state(&self, action: &str) -> DomainError {
        DomainError::state(format!(
            "cannot {action} batch {} in status {:?}",
            self.batch_no, self.status
        ))
    }

    fn handle_create(&self, cmd: &CreateBatch) -> Result<Vec<BatchEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("batch already exists"));
        }
        if cmd.batch_no.trim().is_empty() {
            return Err(DomainError::validation("batch_no cannot be empty"));
        }
        ensure_positive(cmd.planned_qty, "planned quantity")?;
        if let Some(peetu_qty) = cmd.peetu_qty {
            ensure_positive(peetu_qty, "peetu quantity")?;
        }

        let status = if cmd.materials_available {
            BatchStatus::Planned
        } else {
            BatchStatus::PendingMaterial
        };
        Ok(vec![BatchEvent::BatchCreated(BatchCreated {
            batch_id: cmd.batch_id,
            batch_no: cmd.batch_no.trim().to_string(),
            item: cmd.item,
            location: cmd.location,
            planned_qty: cmd.planned_qty,
            peetu_item: cmd.peetu_item,
            peetu_qty: cmd.peetu_qty,
            status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_issued(&self, cmd: &MarkMaterialsIssued) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if !matches!(self.status, BatchStatus::Planned | BatchStatus::PendingMaterial) {
            return Err(self.wrong_state("issue materials for"));
        }
        Ok(vec![BatchEvent::MaterialsIssued(MaterialsIssued {
            batch_id: cmd.batch_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartProduction) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.can_start() {
            return Err(self.wrong_state("start"));
        }
        Ok(vec![BatchEvent::ProductionStarted(ProductionStarted {
            batch_id: cmd.batch_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteProduction) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if self.status != BatchStatus::InProgress {
            return Err(self.wrong_state("complete"));
        }
        let unit_mass = ensure_positive(cmd.unit_mass, "unit mass")?;

        Ok(vec![BatchEvent::BatchCompleted(BatchCompleted {
            batch_id: cmd.batch_id,
            actual_qty: self.planned_qty,
            unit_mass,
            remaining_weight: checked_mul(self.planned_qty, unit_mass, "batch weight")?,
            consumed: cmd.consumed.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify(&self, cmd: &VerifyRemaining) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.holds_remaining() {
            return Err(self.wrong_state("verify remaining of"));
        }
        if !self.verifications.is_empty() && !cmd.allow_reverify {
            return Err(DomainError::state(format!(
                "remaining quantity of batch {} was already verified",
                self.batch_no
            )));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("verification reason cannot be empty"));
        }

        let measurement =
            RemainingMeasurement::measure(cmd.measured_weight, self.unit_mass, self.remaining_qty)?;
        tracing::debug!(
            batch = %self.batch_no,
            remaining = %measurement.remaining_units,
            wastage = %measurement.wastage_units,
            "remaining quantity measured"
        );
        Ok(vec![BatchEvent::RemainingVerified(RemainingVerified {
            batch_id: cmd.batch_id,
            measurement,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_draw(&self, cmd: &DrawRemaining) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.holds_remaining() {
            return Err(self.wrong_state("draw from"));
        }
        let quantity = ensure_positive(cmd.quantity, "draw quantity")?;
        if quantity > self.remaining_qty {
            let (item, location) = self
                .item
                .zip(self.location)
                .ok_or_else(|| DomainError::invariant("created batch without item or location"))?;
            return Err(DomainError::InsufficientStock(Shortfall::new(
                StockTarget::Item(item),
                location,
                quantity,
                self.remaining_qty,
            )));
        }

        Ok(vec![BatchEvent::RemainingDrawn(RemainingDrawn {
            batch_id: cmd.batch_id,
            quantity,
            remaining_after: self.remaining_qty - quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restore(&self, cmd: &RestoreRemaining) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_created()?;
        if !matches!(
            self.status,
            BatchStatus::PartiallyTransferred | BatchStatus::FullyTransferred
        ) {
            return Err(self.wrong_state("restore units to"));
        }
        let quantity = ensure_positive(cmd.quantity, "restored quantity")?;
        if quantity > self.drawn_qty {
            return Err(DomainError::validation(format!(
                "cannot restore {quantity} units to batch {}; only {} were drawn",
                self.batch_no, self.drawn_qty
            )));
        }

        Ok(vec![BatchEvent::RemainingRestored(RemainingRestored {
            batch_id: cmd.batch_id,
            quantity,
            remaining_after: self.remaining_qty + quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}
