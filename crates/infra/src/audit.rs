use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One committed command, as seen by auditors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Command name, e.g. "transfer.complete".
    pub action: String,
    /// Document, batch or repacking number the command acted on.
    pub reference: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: impl Into<String>,
        reference: impl Into<String>,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            action: action.into(),
            reference: reference.into(),
            detail: detail.into(),
            at,
        }
    }
}

/// Audit sink. Recorded after commit; a failing sink must not undo the command.
pub trait AuditLog: Send + Sync {
    fn record(&self, record: AuditRecord);
}

impl<A> AuditLog for Arc<A>
where
    A: AuditLog + ?Sized,
{
    fn record(&self, record: AuditRecord) {
        (**self).record(record)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, record: AuditRecord) {
        tracing::info!(action = %record.action, reference = %record.reference, "audit");
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
