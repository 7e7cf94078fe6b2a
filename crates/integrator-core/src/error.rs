//! Error types for the integration dashboard client

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Message used for the self-deletion guard
pub const SELF_DELETE_MESSAGE: &str = "You cannot delete your own account";

/// Main error type for the integration dashboard client
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// The backend answered with a non-success status
    #[error("API returned {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Api {
        /// HTTP status code
        status: u16,
        /// `detail` field of the error body, when the backend sent one
        detail: Option<String>,
    },

    /// No session, or the backend rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Action reserved for administrators
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Required fields are empty
    #[error("Validation error: {context} requires {}", fields.join(", "))]
    Validation {
        /// What was being validated (a wizard step, a form)
        context: String,
        /// Names of the missing fields, sorted
        fields: Vec<String>,
    },

    /// A field holds a value that cannot be interpreted
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// An action the current user may not perform on themselves
    #[error("{0}")]
    SelfAction(String),

    /// The same resource already has an operation in flight
    #[error("{resource} is already in progress")]
    Busy {
        /// Resource that is busy
        resource: String,
    },

    /// Not found error
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an API error from a status code and optional detail
    pub const fn api(status: u16, detail: Option<String>) -> Self {
        Self::Api { status, detail }
    }

    /// Create a validation error; field names are sorted for stable output
    pub fn validation<I, S>(context: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();
        Self::Validation {
            context: context.into(),
            fields,
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a busy error
    pub fn busy(resource: impl Into<String>) -> Self {
        Self::Busy {
            resource: resource.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Text to show to the user for this failure.
    ///
    /// Backend failures use the response `detail` when there is one and `fallback`
    /// otherwise. Failures raised on the client side already carry a readable message.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api {
                detail: Some(detail),
                ..
            } if !detail.is_empty() => detail.clone(),
            Self::Api { .. }
            | Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Serialization(_)
            | Self::Io(_) => fallback.to_string(),
            Self::SelfAction(message) | Self::Authorization(message) | Self::Other(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::uninlined_format_args)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as StdError;
    use std::io;

    #[test]
    fn test_api_error_display() {
        let error = Error::api(400, Some("Username already registered".to_string()));
        assert_eq!(
            format!("{}", error),
            "API returned 400: Username already registered"
        );

        let error = Error::api(502, None);
        assert_eq!(format!("{}", error), "API returned 502: no detail");
    }

    #[test]
    fn test_validation_fields_are_sorted() {
        let error = Error::validation("source", ["table_id", "dataset_id"]);
        match &error {
            Error::Validation { context, fields } => {
                assert_eq!(context, "source");
                assert_eq!(fields, &vec!["dataset_id".to_string(), "table_id".to_string()]);
            }
            _ => panic!("Expected Validation error variant"),
        }
        assert_eq!(
            format!("{}", error),
            "Validation error: source requires dataset_id, table_id"
        );
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let error = Error::api(401, Some("Incorrect username or password".to_string()));
        assert_eq!(
            error.user_message("Login failed"),
            "Incorrect username or password"
        );
    }

    #[test]
    fn test_user_message_falls_back_without_detail() {
        assert_eq!(
            Error::api(500, None).user_message("Failed to fetch users"),
            "Failed to fetch users"
        );
        assert_eq!(
            Error::api(500, Some(String::new())).user_message("Failed to fetch users"),
            "Failed to fetch users"
        );
        assert_eq!(
            Error::network("connection refused").user_message("Error deleting user"),
            "Error deleting user"
        );
        assert_eq!(
            Error::Timeout { duration_ms: 30_000 }.user_message("Failed to fetch schemas"),
            "Failed to fetch schemas"
        );
    }

    #[test]
    fn test_user_message_for_client_side_errors() {
        let error = Error::SelfAction(SELF_DELETE_MESSAGE.to_string());
        assert_eq!(error.user_message("ignored"), "You cannot delete your own account");

        let error = Error::Authorization("admin only".to_string());
        assert_eq!(error.user_message("ignored"), "admin only");

        let error = Error::busy("Schema load");
        assert_eq!(error.user_message("ignored"), "Schema load is already in progress");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let app_error = Error::from(io_error);

        assert!(matches!(app_error, Error::Io(_)));
        assert!(format!("{}", app_error).contains("I/O error"));
        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_error =
            serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#).unwrap_err();
        let app_error = Error::from(json_error);

        assert!(matches!(app_error, Error::Serialization(_)));
        assert!(format!("{}", app_error).contains("Serialization error"));
    }

    #[test]
    fn test_error_source_for_plain_variants() {
        assert!(Error::configuration("test").source().is_none());
        assert!(Error::not_found("connection 42").source().is_none());
        assert!(Error::validation("name", ["name"]).source().is_none());
    }

    #[test]
    fn test_all_error_display_variants() {
        let test_cases = vec![
            (Error::network("refused"), "Network error: refused"),
            (Error::Authentication("no session".to_string()), "Authentication failed: no session"),
            (Error::Authorization("admin only".to_string()), "Not authorized: admin only"),
            (
                Error::invalid_value("start_time", "bad format"),
                "Invalid value for start_time: bad format",
            ),
            (Error::not_found("connection 7"), "Resource not found: connection 7"),
            (Error::Timeout { duration_ms: 5000 }, "Operation timed out after 5000ms"),
            (Error::configuration("bad url"), "Configuration error: bad url"),
            (Error::Other("other error".to_string()), "other error"),
        ];

        for (error, expected) in test_cases {
            assert_eq!(format!("{}", error), expected);
        }
    }
}
