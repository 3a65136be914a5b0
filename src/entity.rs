//! Domain records shared by the key generator, the stores and the linker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque short unique identifier.
///
/// Used as a URL alias and as a user ID. Callers must not rely on any
/// internal structure: keys are neither sortable nor decodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wrap a raw key string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the raw string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Identity asserted by an external single-sign-on provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoUser {
    /// Provider-scoped user ID.
    pub id: String,
    /// Email address reported by the provider (may be empty).
    #[serde(default)]
    pub email: String,
    /// Display name reported by the provider.
    #[serde(default)]
    pub name: String,
}

impl SsoUser {
    /// Build an SSO identity.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Permanent ID, drawn from the key generator at creation time.
    pub id: Key,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Persisted correspondence between one SSO identity and one local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMapping {
    /// The external identity.
    pub sso_user: SsoUser,
    /// The account it controls.
    pub user: User,
    /// When the mapping was recorded.
    pub linked_at: DateTime<Utc>,
}

impl AccountMapping {
    /// Record a mapping as of now.
    #[must_use]
    pub fn new(sso_user: SsoUser, user: User) -> Self {
        Self {
            sso_user,
            user,
            linked_at: Utc::now(),
        }
    }
}
