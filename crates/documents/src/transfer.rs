use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_catalog::{Location, LocationKind};
use plantflow_core::{
    Aggregate, AggregateId, AggregateRoot, CategoryId, DomainError, ItemId, LocationId,
    StockTarget,
};
use plantflow_events::Event;
use plantflow_ledger::{MovementKind, ReferenceKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferDocumentId(pub AggregateId);

impl TransferDocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferDocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Semantic direction of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Store → Production Floor.
    Issue,
    /// Production Floor → Store.
    Return,
    /// Any two distinct locations.
    Transfer,
}

impl DocumentKind {
    pub fn reference_kind(self) -> ReferenceKind {
        match self {
            DocumentKind::Issue => ReferenceKind::Issue,
            DocumentKind::Return => ReferenceKind::Return,
            DocumentKind::Transfer => ReferenceKind::Transfer,
        }
    }

    /// Ledger movement kinds for the (source, destination) legs.
    pub fn movements(self) -> (MovementKind, MovementKind) {
        match self {
            DocumentKind::Issue => (MovementKind::IssueOut, MovementKind::IssueIn),
            DocumentKind::Return => (MovementKind::ReturnOut, MovementKind::ReturnIn),
            DocumentKind::Transfer => (MovementKind::TransferOut, MovementKind::TransferIn),
        }
    }

    fn required_direction(self) -> Option<(LocationKind, LocationKind)> {
        match self {
            DocumentKind::Issue => Some((LocationKind::Store, LocationKind::ProductionFloor)),
            DocumentKind::Return => Some((LocationKind::ProductionFloor, LocationKind::Store)),
            DocumentKind::Transfer => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Reserved; no ledger effect.
    Pending,
    /// Both legs of every line posted.
    Completed,
    /// Retired. Completed documents were reversed first.
    Deleted,
}

/// Requested line, quantity in the item's catalog unit (category lines: canonical).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub target: StockTarget,
    pub quantity: Decimal,
}

/// What a line actually moved once completed (canonical quantity, concrete item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedLine {
    pub line: usize,
    pub item: ItemId,
    pub quantity: Decimal,
    pub category: Option<CategoryId>,
}

/// Aggregate root: TransferDocument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDocument {
    id: TransferDocumentId,
    kind: DocumentKind,
    doc_no: String,
    source: Option<LocationId>,
    destination: Option<LocationId>,
    lines: Vec<TransferLine>,
    moved: Vec<MovedLine>,
    status: DocumentStatus,
    version: u64,
    created: bool,
}

impl TransferDocument {
    pub fn empty(id: TransferDocumentId) -> Self {
        Self {
            id,
            kind: DocumentKind::Transfer,
            doc_no: String::new(),
            source: None,
            destination: None,
            lines: Vec::new(),
            moved: Vec::new(),
            status: DocumentStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn doc_no(&self) -> &str {
        &self.doc_no
    }

    pub fn source(&self) -> Option<LocationId> {
        self.source
    }

    pub fn destination(&self) -> Option<LocationId> {
        self.destination
    }

    pub fn lines(&self) -> &[TransferLine] {
        &self.lines
    }

    pub fn moved(&self) -> &[MovedLine] {
        &self.moved
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }
}

impl AggregateRoot for TransferDocument {
    type Id = TransferDocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransferDocument.
///
/// Locations are passed resolved so the direction rule can be checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferDocument {
    pub document_id: TransferDocumentId,
    pub kind: DocumentKind,
    pub doc_no: String,
    pub source: Location,
    pub destination: Location,
    pub lines: Vec<TransferLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTransferDocument. `moved` is the validated posting plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTransferDocument {
    pub document_id: TransferDocumentId,
    pub moved: Vec<MovedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteTransferDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTransferDocument {
    pub document_id: TransferDocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCommand {
    Create(CreateTransferDocument),
    Complete(CompleteTransferDocument),
    Delete(DeleteTransferDocument),
}

impl DocumentCommand {
    pub fn document_id(&self) -> TransferDocumentId {
        match self {
            DocumentCommand::Create(c) => c.document_id,
            DocumentCommand::Complete(c) => c.document_id,
            DocumentCommand::Delete(c) => c.document_id,
        }
    }
}

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: TransferDocumentId,
    pub kind: DocumentKind,
    pub doc_no: String,
    pub source: LocationId,
    pub destination: LocationId,
    pub lines: Vec<TransferLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCompleted {
    pub document_id: TransferDocumentId,
    pub moved: Vec<MovedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeleted {
    pub document_id: TransferDocumentId,
    /// True when the document had posted legs that were reversed.
    pub reversed: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    DocumentCompleted(DocumentCompleted),
    DocumentDeleted(DocumentDeleted),
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "documents.transfer.created",
            DocumentEvent::DocumentCompleted(_) => "documents.transfer.completed",
            DocumentEvent::DocumentDeleted(_) => "documents.transfer.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::DocumentCompleted(e) => e.occurred_at,
            DocumentEvent::DocumentDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TransferDocument {
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(e) => {
                self.id = e.document_id;
                self.kind = e.kind;
                self.doc_no = e.doc_no.clone();
                self.source = Some(e.source);
                self.destination = Some(e.destination);
                self.lines = e.lines.clone();
                self.status = DocumentStatus::Pending;
                self.created = true;
            }
            DocumentEvent::DocumentCompleted(e) => {
                self.moved = e.moved.clone();
                self.status = DocumentStatus::Completed;
            }
            DocumentEvent::DocumentDeleted(_) => {
                self.status = DocumentStatus::Deleted;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.id != command.document_id() {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        match command {
            DocumentCommand::Create(cmd) => self.handle_create(cmd),
            DocumentCommand::Complete(cmd) => self.handle_complete(cmd),
            DocumentCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl TransferDocument {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("document {}", self.id)));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTransferDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("document already exists"));
        }
        if cmd.doc_no.trim().is_empty() {
            return Err(DomainError::validation("doc_no cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("document has no lines"));
        }
        if let Some((i, line)) = cmd
            .lines
            .iter()
            .enumerate()
            .find(|(_, l)| l.quantity <= Decimal::ZERO)
        {
            return Err(DomainError::validation(format!(
                "line {} ({}) must have a positive quantity (got {})",
                i + 1,
                line.target,
                line.quantity
            )));
        }
        if cmd.source.id == cmd.destination.id {
            return Err(DomainError::validation(
                "source and destination must be different locations",
            ));
        }
        if let Some((from, to)) = cmd.kind.required_direction() {
            if cmd.source.kind != from || cmd.destination.kind != to {
                return Err(DomainError::validation(format!(
                    "{:?} must move stock from {from:?} to {to:?} (got {} -> {})",
                    cmd.kind, cmd.source.code, cmd.destination.code
                )));
            }
        }

        Ok(vec![DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: cmd.document_id,
            kind: cmd.kind,
            doc_no: cmd.doc_no.trim().to_string(),
            source: cmd.source.id,
            destination: cmd.destination.id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(
        &self,
        cmd: &CompleteTransferDocument,
    ) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_created()?;
        if self.status != DocumentStatus::Pending {
            return Err(DomainError::state(format!(
                "document {} is {:?}, only pending documents can be completed",
                self.doc_no, self.status
            )));
        }
        if let Some(bad) = cmd.moved.iter().find(|m| m.line >= self.lines.len()) {
            return Err(DomainError::invariant(format!(
                "moved line {} does not exist on document {}",
                bad.line, self.doc_no
            )));
        }
        if cmd.moved.iter().any(|m| m.quantity <= Decimal::ZERO) {
            return Err(DomainError::invariant("moved quantities must be positive"));
        }

        Ok(vec![DocumentEvent::DocumentCompleted(DocumentCompleted {
            document_id: cmd.document_id,
            moved: cmd.moved.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteTransferDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_created()?;
        if self.status == DocumentStatus::Deleted {
            return Err(DomainError::state(format!(
                "document {} is already deleted",
                self.doc_no
            )));
        }
        Ok(vec![DocumentEvent::DocumentDeleted(DocumentDeleted {
            document_id: cmd.document_id,
            reversed: self.status == DocumentStatus::Completed,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 8, 0, 0).unwrap()
    }

    fn store() -> Location {
        Location::new("STORE", LocationKind::Store)
    }

    fn floor() -> Location {
        Location::new("FLOOR", LocationKind::ProductionFloor)
    }

    fn create(
        kind: DocumentKind,
        source: Location,
        destination: Location,
        lines: Vec<TransferLine>,
    ) -> (TransferDocument, DocumentCommand) {
        let document_id = TransferDocumentId::new(AggregateId::new());
        let cmd = DocumentCommand::Create(CreateTransferDocument {
            document_id,
            kind,
            doc_no: "ISS-0001".to_string(),
            source,
            destination,
            lines,
            occurred_at: test_time(),
        });
        (TransferDocument::empty(document_id), cmd)
    }

    fn one_line() -> Vec<TransferLine> {
        vec![TransferLine {
            target: StockTarget::Item(ItemId::new()),
            quantity: dec!(3),
        }]
    }

    fn execute(doc: &mut TransferDocument, cmd: &DocumentCommand) -> Result<(), DomainError> {
        for event in doc.handle(cmd)? {
            doc.apply(&event);
        }
        Ok(())
    }

    #[test]
    fn issue_must_go_store_to_floor() {
        let (doc, cmd) = create(DocumentKind::Issue, floor(), store(), one_line());
        match doc.handle(&cmd).unwrap_err() {
            DomainError::Validation(msg) if msg.contains("Issue") => {}
            other => panic!("unexpected error: {other:?}"),
        }

        let (doc, cmd) = create(DocumentKind::Issue, store(), floor(), one_line());
        assert!(doc.handle(&cmd).is_ok());
    }

    #[test]
    fn transfer_needs_distinct_locations_and_lines() {
        let loc = store();
        let (doc, cmd) = create(DocumentKind::Transfer, loc.clone(), loc, one_line());
        assert!(matches!(doc.handle(&cmd), Err(DomainError::Validation(_))));

        let (doc, cmd) = create(DocumentKind::Transfer, store(), floor(), vec![]);
        assert!(matches!(doc.handle(&cmd), Err(DomainError::Validation(_))));

        let zero = vec![TransferLine {
            target: StockTarget::Category(CategoryId::new()),
            quantity: dec!(0),
        }];
        let (doc, cmd) = create(DocumentKind::Transfer, store(), floor(), zero);
        assert!(matches!(doc.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn lifecycle_pending_completed_deleted() {
        let lines = one_line();
        let item = match lines[0].target {
            StockTarget::Item(id) => id,
            StockTarget::Category(_) => unreachable!(),
        };
        let (mut doc, cmd) = create(DocumentKind::Issue, store(), floor(), lines);
        execute(&mut doc, &cmd).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Pending);

        let document_id = *doc.id();
        execute(
            &mut doc,
            &DocumentCommand::Complete(CompleteTransferDocument {
                document_id,
                moved: vec![MovedLine {
                    line: 0,
                    item,
                    quantity: dec!(3),
                    category: None,
                }],
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(doc.status(), DocumentStatus::Completed);

        let delete = DocumentCommand::Delete(DeleteTransferDocument {
            document_id,
            occurred_at: test_time(),
        });
        let events = doc.handle(&delete).unwrap();
        assert!(matches!(
            &events[0],
            DocumentEvent::DocumentDeleted(DocumentDeleted { reversed: true, .. })
        ));
        execute(&mut doc, &delete).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Deleted);
        assert_eq!(doc.version(), 3);

        assert!(matches!(doc.handle(&delete), Err(DomainError::State(_))));
    }

    #[test]
    fn pending_delete_has_nothing_to_reverse() {
        let (mut doc, cmd) = create(DocumentKind::Transfer, store(), floor(), one_line());
        execute(&mut doc, &cmd).unwrap();
        let events = doc
            .handle(&DocumentCommand::Delete(DeleteTransferDocument {
                document_id: *doc.id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(matches!(
            &events[0],
            DocumentEvent::DocumentDeleted(DocumentDeleted { reversed: false, .. })
        ));
    }

    #[test]
    fn completing_twice_is_a_state_error() {
        let (mut doc, cmd) = create(DocumentKind::Transfer, store(), floor(), one_line());
        execute(&mut doc, &cmd).unwrap();
        let complete = DocumentCommand::Complete(CompleteTransferDocument {
            document_id: *doc.id(),
            moved: vec![],
            occurred_at: test_time(),
        });
        execute(&mut doc, &complete).unwrap();
        assert!(matches!(doc.handle(&complete), Err(DomainError::State(_))));
    }
}
