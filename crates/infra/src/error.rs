use thiserror::Error;

use plantflow_core::{DomainError, Shortfall};

/// Store operation error.
///
/// Infrastructure failures (concurrency, storage integrity) as opposed to domain
/// errors. A failed commit never leaves anything applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A ledger key or aggregate stream moved since it was read.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Applying the change set would drive a balance below zero.
    #[error("negative balance rejected: {0}")]
    NegativeBalance(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Error returned by every engine command.
///
/// Every variant means the command changed nothing, except `Publish`, which is
/// reported after a successful commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Missing or ambiguous recipe, yield row or conversion factor.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient stock: {0}")]
    InsufficientStock(Shortfall),

    #[error("insufficient stock for {} requirement(s)", .0.len())]
    AggregatedInsufficientStock(Vec<Shortfall>),

    #[error("invalid state: {0}")]
    State(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Retryable by the caller; nothing was applied.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error(transparent)]
    Store(StoreError),

    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// Publication failed after a successful commit (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl EngineError {
    /// Every unmet requirement carried by this error.
    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            EngineError::InsufficientStock(s) => core::slice::from_ref(s),
            EngineError::AggregatedInsufficientStock(all) => all,
            _ => &[],
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => EngineError::ConcurrencyConflict(msg),
            other => EngineError::Store(other),
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::InvariantViolation(msg) => EngineError::InvariantViolation(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::Conflict(msg) => EngineError::ConcurrencyConflict(msg),
            DomainError::Configuration(msg) => EngineError::Configuration(msg),
            DomainError::InsufficientStock(s) => EngineError::InsufficientStock(s),
            DomainError::AggregatedInsufficientStock(all) => {
                EngineError::AggregatedInsufficientStock(all)
            }
            DomainError::State(msg) => EngineError::State(msg),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use plantflow_core::{ItemId, LocationId, StockTarget};
    use rust_decimal_macros::dec;

    #[test]
    fn domain_errors_keep_their_kind() {
        let s = Shortfall::new(
            StockTarget::Item(ItemId::new()),
            LocationId::new(),
            dec!(5),
            dec!(2),
        );
        let err = EngineError::from(DomainError::InsufficientStock(s.clone()));
        assert_eq!(err.shortfalls(), &[s]);
        assert!(matches!(
            EngineError::from(DomainError::configuration("no recipe")),
            EngineError::Configuration(_)
        ));
        assert!(matches!(
            EngineError::from(DomainError::state("deleted")),
            EngineError::State(_)
        ));
    }

    #[test]
    fn store_concurrency_is_retryable_conflict() {
        let err = EngineError::from(StoreError::Concurrency("key moved".into()));
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
        let err = EngineError::from(StoreError::Poisoned);
        assert!(matches!(err, EngineError::Store(StoreError::Poisoned)));
    }
}
