// SPDX-License-Identifier: MIT

//! Application error types and the coarse classes exposed to API callers.

use serde::Serialize;

/// Core error type for credential, directory and collection operations.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller input violated a field-length bound or a fixed enumeration.
    /// No write has been performed.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Unknown user, bad session/reset key, or expired validity window.
    /// Deliberately undifferentiated so callers cannot probe which part failed.
    #[error("Invalid credentials")]
    InvalidCredential,

    /// The owner is already at their collection limit.
    #[error("Collection limit reached ({0})")]
    TooManyCollections(usize),

    /// Uniqueness violation on a caller-visible key (user name, email,
    /// collection name).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Upsert retry budget exhausted under a write race. Transient.
    #[error("Write contention on {0}")]
    Contention(String),

    /// Durability layer unavailable or rejected the write. Fatal to the
    /// calling operation, never swallowed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal invariant failure.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse outcome classes consumed by the (external) API layer.
///
/// The full `AppError` is logged internally before collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    BadInput,
    Unauthorized,
    Conflict,
    Transient,
    ServerFailure,
}

impl AppError {
    /// Collapse into the coarse class the API boundary reports, logging the
    /// root cause where the collapse loses detail.
    pub fn classify(&self) -> ErrorClass {
        match self {
            AppError::InvalidField(_) => ErrorClass::BadInput,
            AppError::InvalidCredential => ErrorClass::Unauthorized,
            AppError::TooManyCollections(_) | AppError::AlreadyExists(_) => ErrorClass::Conflict,
            AppError::Contention(what) => {
                tracing::warn!(resource = %what, "Write contention surfaced to caller");
                ErrorClass::Transient
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                ErrorClass::ServerFailure
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                ErrorClass::ServerFailure
            }
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, AppError>;
