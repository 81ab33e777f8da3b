//! # Client Error Types
//!
//! Two layers: `StoreError` for a failed remote call, `ClientError` for what
//! the managers report to their callers.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Authentication │  │   Remote Store  │  │     Local State         │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidCreds   │  │  ServerError    │  │  MalformedPersisted     │  │
//! │  │  Conflict       │  │   └ StoreError  │  │  Storage                │  │
//! │  │  Unauthorized   │  │     Transport   │  │  Validation             │  │
//! │  │  Forbidden      │  │     Timeout     │  │                         │  │
//! │  │                 │  │     Status      │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  Configuration  │                                                    │
//! │  │  InvalidConfig  │                                                    │
//! │  │  ConfigLoad/Save│                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;
use storefront_core::{CoreError, Role, ValidationError};
use storefront_db::DbError;
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Result type alias for remote store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// A remote store call that did not produce a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The request never got a response (DNS, refused, reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with a non-success status.
    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The addressed record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Transport failures, timeouts and 5xx/429 answers may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Timeout(_) => true,
            StoreError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        StoreError::InvalidRequest(err.to_string())
    }
}

// =============================================================================
// Client Error
// =============================================================================

/// Result type alias for manager operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by the session, cart and service operations.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// Lookup yielded nothing (product, user, order).
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Login failed. Unknown email and wrong password both end up here.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Registration with an email that already has an account.
    #[error("Email is already registered: {0}")]
    Conflict(String),

    /// A mutating action was attempted without an active Identity.
    #[error("Please log in to continue")]
    Unauthorized,

    /// Signed in, but with the wrong role.
    #[error("This action requires the {required} role")]
    Forbidden { required: Role },

    // =========================================================================
    // Remote Store Errors
    // =========================================================================
    /// Remote call failed or returned non-success.
    #[error("Server error: {0}")]
    ServerError(#[source] StoreError),

    // =========================================================================
    // Local State Errors
    // =========================================================================
    /// The persisted Identity could not be used.
    #[error("Persisted session is unusable: {0}")]
    MalformedPersisted(String),

    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => ClientError::NotFound { resource, id },
            other => ClientError::ServerError(other),
        }
    }
}

impl From<DbError> for ClientError {
    fn from(err: DbError) -> Self {
        ClientError::Storage(err.to_string())
    }
}

/// Cart rule violations surface as validation failures or missing lines.
impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LineNotFound(id) => ClientError::NotFound {
                resource: "Cart line".to_string(),
                id,
            },
            CoreError::Validation(v) => ClientError::Validation(v),
            CoreError::QuantityTooLarge { max, .. } => {
                ClientError::Validation(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 0,
                    max,
                })
            }
            other => ClientError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        ClientError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// Only transport-level failures qualify. Nothing is retried
    /// automatically; the caller decides.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ServerError(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::ServerError(StoreError::Transport("reset".into())).is_retryable());
        assert!(
            ClientError::ServerError(StoreError::Timeout(Duration::from_secs(5))).is_retryable()
        );
        assert!(ClientError::ServerError(StoreError::Status {
            status: 503,
            message: "busy".into()
        })
        .is_retryable());

        assert!(!ClientError::ServerError(StoreError::Status {
            status: 400,
            message: "bad".into()
        })
        .is_retryable());
        assert!(!ClientError::InvalidCredentials.is_retryable());
        assert!(!ClientError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: ClientError = StoreError::not_found("products", "9").into();
        assert!(matches!(err, ClientError::NotFound { ref id, .. } if id == "9"));

        let err: ClientError = StoreError::Decode("eof".into()).into();
        assert!(matches!(err, ClientError::ServerError(StoreError::Decode(_))));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ClientError = CoreError::LineNotFound("tmp-1".into()).into();
        assert!(matches!(err, ClientError::NotFound { .. }));

        let err: ClientError = CoreError::QuantityTooLarge {
            requested: 1000,
            max: 999,
        }
        .into();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ClientError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
        let err = ClientError::Forbidden {
            required: Role::Admin,
        };
        assert!(err.to_string().contains("admin"));
        assert!(ClientError::InvalidConfig("x".into()).is_config_error());
    }
}
