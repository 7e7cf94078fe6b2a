//! Dashboard user accounts and the payloads used to manage them

use crate::secret::{Secret, validate_present};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

const fn default_active() -> bool {
    true
}

/// A dashboard account as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric id, when the backend exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Whether the account may log in
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Whether the account may manage other users
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    /// The reference the backend accepts for this account
    #[must_use]
    pub fn user_ref(&self) -> UserRef {
        self.id
            .map_or_else(|| UserRef::Email(self.email.clone()), UserRef::Id)
    }

    /// Whether `target` designates this account
    #[must_use]
    pub fn matches(&self, target: &UserRef) -> bool {
        match target {
            UserRef::Id(id) => self.id == Some(*id),
            UserRef::Email(email) => self.email.eq_ignore_ascii_case(email),
        }
    }
}

/// Identifies a user in `DELETE /users/{idOrEmail}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRef {
    /// Numeric id
    Id(i64),
    /// Email address
    Email(String),
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Email(email) => f.write_str(email),
        }
    }
}

impl FromStr for UserRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("user reference", ["id_or_email"]));
        }
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Email(s.to_string()), Self::Id))
    }
}

/// Payload for `POST /users/`
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct NewUser {
    /// Login name
    #[validate(length(min = 1))]
    pub username: String,

    /// Email address
    #[validate(email)]
    pub email: String,

    /// Initial password
    #[validate(custom(function = "validate_present"))]
    pub password: Secret,

    /// Grant administrator rights
    pub is_admin: bool,
}

/// Payload for `POST /users/change-password`
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct PasswordChange {
    /// Current password
    #[validate(custom(function = "validate_present"))]
    pub old_password: Secret,

    /// Replacement password
    #[validate(custom(function = "validate_present"))]
    pub new_password: Secret,
}

/// Form body for `POST /token`
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Credentials {
    /// Login name
    #[validate(length(min = 1))]
    pub username: String,

    /// Password
    #[validate(custom(function = "validate_present"))]
    pub password: Secret,
}

impl Credentials {
    /// Build a credentials pair
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Successful `POST /token` response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token
    pub access_token: Secret,

    /// Token type, normally `bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}
