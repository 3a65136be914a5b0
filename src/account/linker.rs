//! Links SSO identities to local accounts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use super::audit::{self, AccountEvent};
use crate::entity::{Key, SsoUser, User};
use crate::keygen::KeyGenerator;
use crate::store::{AccountMappingStore, UserStore};
use crate::{Error, Result};

/// Result of a successful linking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "user", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// A mapping already existed; nothing was written.
    AlreadyLinked(User),
    /// An account with the same email existed; only a mapping was written.
    LinkedExisting(User),
    /// A new account was created with a fresh key, then mapped.
    Created(User),
}

impl LinkOutcome {
    /// The account the SSO identity now controls.
    #[must_use]
    pub fn user(&self) -> &User {
        match self {
            Self::AlreadyLinked(u) | Self::LinkedExisting(u) | Self::Created(u) => u,
        }
    }

    /// Consume the outcome, returning the account.
    #[must_use]
    pub fn into_user(self) -> User {
        match self {
            Self::AlreadyLinked(u) | Self::LinkedExisting(u) | Self::Created(u) => u,
        }
    }

    /// Whether this attempt created a new account.
    #[must_use]
    pub fn is_new_account(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Decides whether an SSO identity reuses an account or gets a new one.
///
/// Holds no lock between the email lookup and account creation: two
/// concurrent first sign-ins for the same new email can both create an
/// account. Each still gets a distinct key.
pub struct AccountLinker {
    keygen: Arc<KeyGenerator>,
    users: Arc<dyn UserStore>,
    mappings: Arc<dyn AccountMappingStore>,
}

impl AccountLinker {
    /// Create a linker over the given generator and stores.
    #[must_use]
    pub fn new(
        keygen: Arc<KeyGenerator>,
        users: Arc<dyn UserStore>,
        mappings: Arc<dyn AccountMappingStore>,
    ) -> Self {
        Self {
            keygen,
            users,
            mappings,
        }
    }

    /// Whether a mapping exists for `sso_user.id`.
    #[instrument(skip(self, sso_user), fields(sso_user_id = %sso_user.id))]
    pub async fn is_account_linked(&self, sso_user: &SsoUser) -> Result<bool> {
        Ok(self.mappings.find_by_sso_user_id(&sso_user.id).await?.is_some())
    }

    /// Make sure `sso_user` is linked to an account, creating one if needed.
    ///
    /// 1. Existing mapping: no-op, [`LinkOutcome::AlreadyLinked`].
    /// 2. Account with the same (non-empty) email: write the mapping only.
    /// 3. Otherwise: draw a key, create the account, then write the mapping.
    ///
    /// The account is always persisted before its mapping. If the mapping
    /// write fails after the account was created, the account is kept and
    /// [`Error::PartialLink`] names it so the caller can [`relink`](Self::relink).
    ///
    /// # Errors
    ///
    /// Store and key source errors are returned as-is; a failed key
    /// allocation performs no writes.
    #[instrument(skip(self, sso_user), fields(sso_user_id = %sso_user.id))]
    pub async fn create_and_link_account(&self, sso_user: &SsoUser) -> Result<LinkOutcome> {
        let result = self.link(sso_user).await;
        if let Err(ref e) = result
            && !matches!(e, Error::PartialLink { .. })
        {
            audit::emit(&AccountEvent::link_failed(sso_user, e.to_string()));
        }
        result
    }

    /// Record only the mapping from `sso_user` to the existing account `user_id`.
    ///
    /// Used to reconcile an [`Error::PartialLink`].
    ///
    /// # Errors
    ///
    /// [`Error::Store`] if no account has that ID; mapping store errors as-is.
    #[instrument(skip(self, sso_user), fields(sso_user_id = %sso_user.id, user_id = %user_id))]
    pub async fn relink(&self, sso_user: &SsoUser, user_id: &Key) -> Result<LinkOutcome> {
        if let Some(user) = self.mappings.find_by_sso_user_id(&sso_user.id).await? {
            return Ok(LinkOutcome::AlreadyLinked(user));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::Store(format!("user {user_id} not found")))?;

        self.mappings.create(sso_user, &user).await?;
        audit::emit(&AccountEvent::linked_existing(sso_user, &user));
        Ok(LinkOutcome::LinkedExisting(user))
    }

    /// A concurrent call mapped `sso_user` after our pre-check; report that
    /// mapping instead of `err`.
    async fn linked_meanwhile(&self, sso_user: &SsoUser, err: Error) -> Result<LinkOutcome> {
        match self.mappings.find_by_sso_user_id(&sso_user.id).await? {
            Some(user) => {
                debug!(user_id = %user.id, "SSO user linked by a concurrent call");
                audit::emit(&AccountEvent::already_linked(sso_user, &user));
                Ok(LinkOutcome::AlreadyLinked(user))
            }
            None => Err(err),
        }
    }

    async fn link(&self, sso_user: &SsoUser) -> Result<LinkOutcome> {
        if let Some(user) = self.mappings.find_by_sso_user_id(&sso_user.id).await? {
            debug!(user_id = %user.id, "SSO user already linked");
            audit::emit(&AccountEvent::already_linked(sso_user, &user));
            return Ok(LinkOutcome::AlreadyLinked(user));
        }

        if !sso_user.email.is_empty()
            && let Some(user) = self.users.find_by_email(&sso_user.email).await?
        {
            return match self.mappings.create(sso_user, &user).await {
                Ok(()) => {
                    audit::emit(&AccountEvent::linked_existing(sso_user, &user));
                    Ok(LinkOutcome::LinkedExisting(user))
                }
                Err(e @ Error::AlreadyExists(_)) => self.linked_meanwhile(sso_user, e).await,
                Err(e) => Err(e),
            };
        }

        let key = self.keygen.new_key().await?;
        let user = User {
            id: key,
            email: sso_user.email.clone(),
            name: sso_user.name.clone(),
        };
        self.users.create(&user).await?;

        if let Err(e) = self.mappings.create(sso_user, &user).await {
            audit::emit(&AccountEvent::partial_link(sso_user, &user, e.to_string()));
            return Err(Error::PartialLink {
                user_id: user.id,
                source: Box::new(e),
            });
        }

        audit::emit(&AccountEvent::created(sso_user, &user));
        Ok(LinkOutcome::Created(user))
    }
}
