//! Unified error types for the dronify core library.
//!
//! This module provides the error type [`DronifyError`] returned by every record
//! store operation. Configuration loading reports through its own
//! [`ConfigError`](crate::config::ConfigError), which never reaches the store.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages tell the caller which input to correct
//! - **All-or-nothing writes**: Any error raised during a store write means nothing was committed
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! # Example
//!
//! ```rust
//! use dronify_core::error::{DronifyError, Result};
//!
//! fn check_weight(weight_kg: f64) -> Result<()> {
//!     if weight_kg < 0.0 {
//!         return Err(DronifyError::InvalidInput(format!("negative weight: {weight_kg}")));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Errors raised by record store writes and lookups.
#[derive(Debug, Error)]
pub enum DronifyError {
    // =========================================================================
    // RECORD VALIDATION ERRORS
    // =========================================================================
    /// A write was rejected because a record-validity rule failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A numeric input is physically meaningless (negative weight, NaN, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A field that can no longer be changed was included in an update.
    #[error("Field '{field}' of {entity} is read-only once set")]
    ReadOnlyField {
        /// Entity kind (e.g. "package").
        entity: &'static str,
        /// Field name.
        field: &'static str,
    },

    // =========================================================================
    // RELATIONAL ERRORS
    // =========================================================================
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "flight").
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A reference points to a record that does not play the required role.
    #[error("Reference violation: {0}")]
    ReferenceViolation(String),

    /// The package is already assigned to a different flight.
    #[error("Package {package} is already assigned to flight {flight}")]
    AlreadyAssigned {
        /// Package identifier.
        package: String,
        /// Flight the package currently belongs to.
        flight: String,
    },

    /// The derived-field declarations contain a cycle.
    #[error("Derived field dependency cycle involving '{0}'")]
    DependencyCycle(String),
}

/// A specialized [`Result`] type for dronify operations.
pub type Result<T> = std::result::Result<T, DronifyError>;

impl DronifyError {
    /// Shorthand for a [`DronifyError::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` if the caller supplied input that must be corrected.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidInput(_) | Self::ReadOnlyField { .. }
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::Validation(_) | Self::InvalidInput(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict - clashes with the current record state
            Self::ReadOnlyField { .. } | Self::AlreadyAssigned { .. } => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::ReferenceViolation(_) => 422,

            // 500 Internal Server Error
            Self::DependencyCycle(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ReadOnlyField { .. } => "READ_ONLY_FIELD",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ReferenceViolation(_) => "REFERENCE_VIOLATION",
            Self::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            Self::DependencyCycle(_) => "DEPENDENCY_CYCLE",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
