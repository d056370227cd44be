//! # Sync Error Types
//!
//! Error taxonomy for the sync engine.
//!
//! ## Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Sync Error Categories                          │
//! │                                                                     │
//! │  Network      transient: rows stay pending, the phase backs off     │
//! │               and the next cycle retries                            │
//! │                                                                     │
//! │  Conflict     resolved automatically by policy (LWW / delta         │
//! │               replay); logged for audit, never user-facing          │
//! │                                                                     │
//! │  Database     the local store rejected a write mid-phase; the       │
//! │               enclosing batch transaction rolled back               │
//! │                                                                     │
//! │  Config       invalid device/tenant/sync settings; sync refuses     │
//! │               to start, local operations are unaffected             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Network errors never block foreground operations: cart, checkout, and
//! inventory edits keep working fully offline while sync retries.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all sync failure modes.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device id (required before any push).
    #[error("Device ID not configured. Run initial provisioning first.")]
    MissingDeviceId,

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The remote backend was unreachable or the call failed in transit.
    /// Recoverable: affected rows stay `pending`.
    #[error("Network error: {0}")]
    Network(String),

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    /// A remote row changed concurrently with local state. Resolved by
    /// policy; surfaced only through logs.
    #[error("Conflict on {entity_type}/{entity_id}: {detail}")]
    Conflict {
        entity_type: String,
        entity_id: String,
        detail: String,
    },

    // =========================================================================
    // Local Store Errors
    // =========================================================================
    /// The local database rejected an operation.
    #[error("Database error: {0}")]
    Database(String),

}

impl SyncError {
    /// True when the operation may succeed if simply retried later.
    ///
    /// Only transport faults qualify; config, conflict, and database
    /// errors need intervention or are already resolved.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// True when this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<nadi_store::StoreError> for SyncError {
    fn from(err: nadi_store::StoreError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SyncError::Network("connection reset".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::Database("locked".into()).is_retryable());
        assert!(!SyncError::Conflict {
            entity_type: "product".into(),
            entity_id: "p-1".into(),
            detail: "older remote row".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(SyncError::MissingDeviceId.is_config_error());
        assert!(!SyncError::Network("timeout".into()).is_config_error());
    }
}
