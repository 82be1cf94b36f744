//! Error taxonomy for the MoMo client.
//!
//! Every failure carries the name of the operation that produced it so callers
//! can act on it without parsing messages. Provider error codes are preserved
//! verbatim on `Auth` and `Payment` failures.

use thiserror::Error;
use uuid::Uuid;

pub type MomoResult<T> = Result<T, MomoError>;

/// Code the provider returns when an API user with the same reference already exists.
pub const ALREADY_EXISTS_CODE: &str = "RESOURCE_ALREADY_EXIST";

#[derive(Debug, Clone, Error)]
pub enum MomoError {
    /// Missing or invalid configuration, detected before any request is sent.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Caller input rejected locally (amount, MSISDN, attempt limits).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Credential bootstrap or token exchange rejected by the provider.
    #[error("Auth error in {operation}: {message}")]
    Auth {
        operation: String,
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// Connection, DNS or transport-level timeout failure.
    #[error("Transport error in {operation}: {message}")]
    Transport {
        operation: String,
        message: String,
        timed_out: bool,
    },

    /// Provider rejected a submission or status query.
    #[error(
        "Payment error in {operation}: HTTP {status}, code={}, message={message}",
        .code.as_deref().unwrap_or("unknown")
    )]
    Payment {
        operation: String,
        reference_id: Option<Uuid>,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Provider answered 2xx with a body we could not understand.
    #[error("Decode error in {operation}: {message}")]
    Decode { operation: String, message: String },

    /// The caller's context was cancelled.
    #[error("Operation {operation} was cancelled")]
    Cancelled { operation: String },

    /// The caller's context deadline elapsed.
    #[error("Operation {operation} exceeded its deadline")]
    Timeout { operation: String },
}

impl MomoError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn decode(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// True when the caller's context ended the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MomoError::Cancelled { .. } | MomoError::Timeout { .. })
    }

    /// True for `create_api_user` conflicts, which callers may safely ignore.
    pub fn is_already_exists(&self) -> bool {
        match self {
            MomoError::Auth { status, code, .. } => {
                *status == Some(409) || code.as_deref() == Some(ALREADY_EXISTS_CODE)
            }
            _ => false,
        }
    }

    /// Whether repeating the same call (with the same idempotency key) may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MomoError::Config { .. } => false,
            MomoError::Validation { .. } => false,
            MomoError::Auth { status, .. } => matches!(status, Some(s) if *s == 429 || *s >= 500),
            MomoError::Transport { .. } => true,
            MomoError::Payment { status, .. } => *status == 429 || *status >= 500,
            MomoError::Decode { .. } => false,
            MomoError::Cancelled { .. } => false,
            MomoError::Timeout { .. } => true,
        }
    }

    /// Provider error code, when the provider supplied one.
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            MomoError::Auth { code, .. } | MomoError::Payment { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Reference id of the transaction the error relates to, if any.
    pub fn reference_id(&self) -> Option<Uuid> {
        match self {
            MomoError::Payment { reference_id, .. } => *reference_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_treated_as_already_exists() {
        let by_status = MomoError::Auth {
            operation: "create_api_user".to_string(),
            status: Some(409),
            code: None,
            message: "conflict".to_string(),
        };
        let by_code = MomoError::Auth {
            operation: "create_api_user".to_string(),
            status: Some(400),
            code: Some(ALREADY_EXISTS_CODE.to_string()),
            message: "duplicate".to_string(),
        };
        assert!(by_status.is_already_exists());
        assert!(by_code.is_already_exists());
        assert!(!MomoError::config("missing key").is_already_exists());
    }

    #[test]
    fn test_retryable_flags_are_set() {
        assert!(MomoError::transport("request_to_pay", "connection reset").is_retryable());
        assert!(!MomoError::cancelled("request_to_pay").is_retryable());
        assert!(!MomoError::Payment {
            operation: "transfer".to_string(),
            reference_id: None,
            status: 400,
            code: Some("PAYEE_NOT_FOUND".to_string()),
            message: "payee not found".to_string(),
        }
        .is_retryable());
        assert!(MomoError::Payment {
            operation: "transfer".to_string(),
            reference_id: None,
            status: 503,
            code: None,
            message: "unavailable".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_payment_error_display_includes_code() {
        let reference_id = Uuid::new_v4();
        let err = MomoError::Payment {
            operation: "request_to_pay".to_string(),
            reference_id: Some(reference_id),
            status: 500,
            code: Some("INTERNAL_PROCESSING_ERROR".to_string()),
            message: "boom".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("request_to_pay"));
        assert!(text.contains("INTERNAL_PROCESSING_ERROR"));
        assert_eq!(err.provider_code(), Some("INTERNAL_PROCESSING_ERROR"));
        assert_eq!(err.reference_id(), Some(reference_id));
    }

    #[test]
    fn test_cancellation_and_timeout_are_cancellations() {
        assert!(MomoError::cancelled("poll").is_cancellation());
        assert!(MomoError::timeout("poll").is_cancellation());
        assert!(!MomoError::transport("poll", "dns").is_cancellation());
    }
}
