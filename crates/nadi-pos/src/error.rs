//! # Service Error Type
//!
//! One error enum for the service layer, wrapping the domain and store
//! taxonomies. UI surfaces match on this; nothing below ever reaches a
//! render layer as an uncaught panic.

use thiserror::Error;

use nadi_core::{CoreError, ValidationError};
use nadi_store::StoreError;

/// Errors surfaced by the application services.
#[derive(Debug, Error)]
pub enum PosError {
    /// Business rule violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Durable store failure (constraint, I/O, not-found).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for PosError {
    fn from(err: ValidationError) -> Self {
        PosError::Core(CoreError::Validation(err))
    }
}

/// Result type for service operations.
pub type PosResult<T> = Result<T, PosError>;
