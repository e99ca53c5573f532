use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure the autofill core can surface to its caller.
///
/// [`AutofillError::is_retryable`] matches exhaustively; new variants must
/// pick a side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutofillError {
    /// The service has not finished initialising.
    #[error("autofill service is not ready")]
    ServiceNotReady,
    /// A fill request ran past its deadline.
    #[error("fill request timed out after {}ms", duration.as_millis())]
    RequestTimeout { duration: Duration },
    /// No saved credential matched the request.
    #[error("no matching credential (domain: {domain}, app: {app_id})")]
    NoMatchingCredential { domain: String, app_id: String },
    /// The page/view structure could not be parsed.
    #[error("page structure parsing failed: {cause}")]
    StructureParsingFailed { cause: String },
    /// A single field could not be filled.
    #[error("failed to fill field {field_id}: {cause}")]
    FieldFillFailed { field_id: String, cause: String },
    /// Biometric authentication was rejected or aborted.
    #[error("biometric authentication failed: {reason}")]
    BiometricAuthFailed { reason: String },
    /// The credential store failed to answer.
    #[error("database error: {cause}")]
    DatabaseError { cause: String },
    /// The fill request itself is malformed.
    #[error("invalid fill request: {reason}")]
    InvalidRequest { reason: String },
    /// A required permission is missing.
    #[error("permission denied: {permission}")]
    PermissionDenied { permission: String },
    /// Configuration is inconsistent or unreadable.
    #[error("configuration error: {config}")]
    ConfigurationError { config: String },
}

/// Payload-free discriminant of [`AutofillError`], used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ServiceNotReady,
    RequestTimeout,
    NoMatchingCredential,
    StructureParsingFailed,
    FieldFillFailed,
    BiometricAuthFailed,
    DatabaseError,
    InvalidRequest,
    PermissionDenied,
    ConfigurationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ServiceNotReady => "service_not_ready",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::NoMatchingCredential => "no_matching_credential",
            ErrorKind::StructureParsingFailed => "structure_parsing_failed",
            ErrorKind::FieldFillFailed => "field_fill_failed",
            ErrorKind::BiometricAuthFailed => "biometric_auth_failed",
            ErrorKind::DatabaseError => "database_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ConfigurationError => "configuration_error",
        }
    }

    /// Whether a failure of this kind may succeed on a later attempt.
    ///
    /// Service-level kinds are deterministic: retrying a missing permission
    /// or a broken config cannot help.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::ServiceNotReady
            | ErrorKind::BiometricAuthFailed
            | ErrorKind::InvalidRequest
            | ErrorKind::PermissionDenied
            | ErrorKind::ConfigurationError => false,
            ErrorKind::RequestTimeout
            | ErrorKind::NoMatchingCredential
            | ErrorKind::StructureParsingFailed
            | ErrorKind::FieldFillFailed
            | ErrorKind::DatabaseError => true,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AutofillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutofillError::ServiceNotReady => ErrorKind::ServiceNotReady,
            AutofillError::RequestTimeout { .. } => ErrorKind::RequestTimeout,
            AutofillError::NoMatchingCredential { .. } => ErrorKind::NoMatchingCredential,
            AutofillError::StructureParsingFailed { .. } => ErrorKind::StructureParsingFailed,
            AutofillError::FieldFillFailed { .. } => ErrorKind::FieldFillFailed,
            AutofillError::BiometricAuthFailed { .. } => ErrorKind::BiometricAuthFailed,
            AutofillError::DatabaseError { .. } => ErrorKind::DatabaseError,
            AutofillError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            AutofillError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AutofillError::ConfigurationError { .. } => ErrorKind::ConfigurationError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn field_fill_failed(field_id: impl Into<String>, cause: impl fmt::Display) -> Self {
        AutofillError::FieldFillFailed {
            field_id: field_id.into(),
            cause: cause.to_string(),
        }
    }

    pub fn database(cause: impl fmt::Display) -> Self {
        AutofillError::DatabaseError {
            cause: cause.to_string(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        AutofillError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn configuration(config: impl Into<String>) -> Self {
        AutofillError::ConfigurationError {
            config: config.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<AutofillError> {
        vec![
            AutofillError::ServiceNotReady,
            AutofillError::RequestTimeout {
                duration: Duration::from_millis(250),
            },
            AutofillError::NoMatchingCredential {
                domain: "example.com".into(),
                app_id: "com.example".into(),
            },
            AutofillError::StructureParsingFailed {
                cause: "truncated tree".into(),
            },
            AutofillError::field_fill_failed("field-1", "value rejected"),
            AutofillError::BiometricAuthFailed {
                reason: "cancelled".into(),
            },
            AutofillError::database("disk I/O"),
            AutofillError::invalid_request("no fields"),
            AutofillError::PermissionDenied {
                permission: "BIND_AUTOFILL_SERVICE".into(),
            },
            AutofillError::configuration("retry_count"),
        ]
    }

    #[test]
    fn service_level_kinds_are_not_retryable() {
        let non_retryable: Vec<ErrorKind> = all_errors()
            .iter()
            .filter(|e| !e.is_retryable())
            .map(AutofillError::kind)
            .collect();
        assert_eq!(
            non_retryable,
            vec![
                ErrorKind::ServiceNotReady,
                ErrorKind::BiometricAuthFailed,
                ErrorKind::InvalidRequest,
                ErrorKind::PermissionDenied,
                ErrorKind::ConfigurationError,
            ]
        );
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = AutofillError::RequestTimeout {
            duration: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "fill request timed out after 1500ms");
    }

    #[test]
    fn field_fill_message_names_field() {
        let err = AutofillError::field_fill_failed("username-id", "view detached");
        assert!(err.to_string().contains("username-id"));
        assert!(err.to_string().contains("view detached"));
    }

    #[test]
    fn kind_labels_are_unique() {
        let mut labels: Vec<&str> = all_errors().iter().map(|e| e.kind().as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 10);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
