//! Domain error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Storage
/// failures belong to the infrastructure layer and are mapped onto these kinds
/// at the service boundary.
///
/// Every variant maps to a stable code via [`DomainError::code`] so calling
/// layers can pick an HTTP status or UI treatment without parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range caller data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced item/lock/stock taking does not exist for this tenant.
    ///
    /// Cross-tenant access is reported as `NotFound` as well, never as a
    /// permission failure.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Available quantity cannot satisfy a reservation.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: Decimal, available: Decimal },

    /// Version mismatch on write. The only kind callers are expected to retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

/// Error kind without payload, for matching and metrics labels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidState,
    InsufficientStock,
    ConcurrencyConflict,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn insufficient_stock(requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidInput(_) => ErrorKind::InvalidInput,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::InvalidState(_) => ErrorKind::InvalidState,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
        }
    }

    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether the caller should re-read and resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict(_))
    }
}
