//! Audit logging for account linking.
//!
//! Every event is emitted via `tracing::info!` with a JSON payload in the
//! `audit` field.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `account.already_linked` | The SSO identity was already mapped |
//! | `account.linked_existing` | Mapped to an existing account with the same email |
//! | `account.created` | A new account was minted and mapped |
//! | `account.partial_link` | Account created, mapping failed (needs reconciliation) |
//! | `account.link_failed` | Linking failed before any account was created |

use serde::Serialize;

use crate::entity::{SsoUser, User};

/// Structured audit event for one linking attempt.
#[derive(Debug, Serialize)]
pub struct AccountEvent {
    /// Event type string (e.g. `"account.created"`).
    pub event: &'static str,
    /// Provider-scoped SSO user ID.
    pub sso_user_id: String,
    /// Email asserted by the provider.
    pub email: String,
    /// Local account involved, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccountEvent {
    fn base(event: &'static str, sso_user: &SsoUser) -> Self {
        Self {
            event,
            sso_user_id: sso_user.id.clone(),
            email: sso_user.email.clone(),
            user_id: None,
            reason: None,
        }
    }

    /// Construct an `account.already_linked` event.
    #[must_use]
    pub fn already_linked(sso_user: &SsoUser, user: &User) -> Self {
        Self {
            user_id: Some(user.id.to_string()),
            ..Self::base("account.already_linked", sso_user)
        }
    }

    /// Construct an `account.linked_existing` event.
    #[must_use]
    pub fn linked_existing(sso_user: &SsoUser, user: &User) -> Self {
        Self {
            user_id: Some(user.id.to_string()),
            ..Self::base("account.linked_existing", sso_user)
        }
    }

    /// Construct an `account.created` event.
    #[must_use]
    pub fn created(sso_user: &SsoUser, user: &User) -> Self {
        Self {
            user_id: Some(user.id.to_string()),
            ..Self::base("account.created", sso_user)
        }
    }

    /// Construct an `account.partial_link` event.
    #[must_use]
    pub fn partial_link(sso_user: &SsoUser, user: &User, reason: impl Into<String>) -> Self {
        Self {
            user_id: Some(user.id.to_string()),
            reason: Some(reason.into()),
            ..Self::base("account.partial_link", sso_user)
        }
    }

    /// Construct an `account.link_failed` event.
    #[must_use]
    pub fn link_failed(sso_user: &SsoUser, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base("account.link_failed", sso_user)
        }
    }
}

/// Emit an audit event via `tracing`.
///
/// Partial links are logged at `warn` so operators can find orphaned
/// accounts.
pub fn emit(event: &AccountEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) if event.event == "account.partial_link" => {
            tracing::warn!(audit = %json, "account audit");
        }
        Ok(ref json) => tracing::info!(audit = %json, "account audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
