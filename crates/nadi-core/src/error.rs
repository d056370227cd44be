//! # Error Types
//!
//! Domain-specific error types for nadi-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  nadi-core errors (this file)                                       │
//! │  ├── CoreError        - business rule violations                    │
//! │  └── ValidationError  - input validation failures                   │
//! │                                                                     │
//! │  nadi-store errors (separate crate)                                 │
//! │  └── StoreError       - constraint / IO / duplicate-commit          │
//! │                                                                     │
//! │  nadi-sync errors (separate crate)                                  │
//! │  └── SyncError        - network / conflict / config                 │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → StoreError → caller            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual Display impls
//! 2. Context in the message (ids, quantities), never bare strings
//! 3. Errors are enum variants the caller can match on

use thiserror::Error;

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not exist (or was retired and is hidden).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The active cart has no line for the given product.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Checkout requested on an empty cart.
    #[error("Cannot commit a sale from an empty cart")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Input validation errors.
///
/// Raised before business logic runs, so bad input never reaches the
/// durable store.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. malformed UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
