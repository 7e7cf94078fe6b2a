//! Credential values that must never reach logs

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[redacted]";

/// A credential held as plain text.
///
/// Serializes transparently so the backend receives the real value, while
/// `Debug` and `Display` print a redaction marker.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no value has been entered
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(\"\")")
        } else {
            write!(f, "Secret({REDACTED})")
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// `validator` hook: a secret is present when it is non-empty
///
/// # Errors
///
/// Returns a `required` validation error for an empty secret.
pub fn validate_present(secret: &Secret) -> Result<(), validator::ValidationError> {
    if secret.is_empty() {
        return Err(validator::ValidationError::new("required"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = Secret::new("ya29.token-value");
        assert_eq!(format!("{secret:?}"), "Secret([redacted])");
        assert_eq!(format!("{secret}"), "[redacted]");
        assert_eq!(secret.expose(), "ya29.token-value");
    }

    #[test]
    fn test_serializes_transparently() {
        let secret = Secret::from("abc");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"abc\"");

        let back: Secret = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_validate_present() {
        assert!(validate_present(&Secret::default()).is_err());
        assert!(validate_present(&Secret::from("x")).is_ok());
    }
}
