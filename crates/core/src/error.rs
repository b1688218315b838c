//! Domain error model.

use thiserror::Error;

use crate::stock::Shortfall;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, missing recipes, stock shortages). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (non-positive quantity, same source/destination, empty lines).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or ambiguous master data (BOM, yield row, conversion factor).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single requirement could not be met.
    #[error("insufficient stock: {0}")]
    InsufficientStock(Shortfall),

    /// Every requirement of one command that could not be met.
    #[error("insufficient stock for {} requirement(s)", .0.len())]
    AggregatedInsufficientStock(Vec<Shortfall>),

    /// Command issued against an aggregate in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    State(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Collapse a list of shortfalls into one error (or `None` when nothing is short).
    pub fn from_shortfalls(shortfalls: Vec<Shortfall>) -> Option<Self> {
        if shortfalls.is_empty() {
            None
        } else {
            Some(Self::AggregatedInsufficientStock(shortfalls))
        }
    }

    /// Shortfalls carried by this error, if it is a stock error.
    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            Self::InsufficientStock(s) => core::slice::from_ref(s),
            Self::AggregatedInsufficientStock(list) => list,
            _ => &[],
        }
    }
}
