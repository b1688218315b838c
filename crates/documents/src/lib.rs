//! Transfer documents (event-sourced).
//!
//! Issue, return and transfer share one shape and one lifecycle; the direction is
//! an explicit `DocumentKind`, never inferred from the document number.

pub mod transfer;

pub use transfer::{
    CompleteTransferDocument, CreateTransferDocument, DeleteTransferDocument, DocumentCommand,
    DocumentCompleted, DocumentCreated, DocumentDeleted, DocumentEvent, DocumentKind,
    DocumentStatus, MovedLine, TransferDocument, TransferDocumentId, TransferLine,
};
