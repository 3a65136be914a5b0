//! In-memory stores backed by `DashMap`.
//!
//! - `InMemoryUserStore`: user ID → `User`, scanned for email lookups
//! - `InMemoryAccountMappingStore`: SSO user ID → `AccountMapping`

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::{AccountMappingStore, UserStore};
use crate::entity::{AccountMapping, Key, SsoUser, User};
use crate::{Error, Result};

/// In-memory account store.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<Key, User>,
}

impl InMemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        for user in users {
            store.users.insert(user.id.clone(), user);
        }
        store
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// `true` when no account is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|e| e.value().email == email)
            .map(|e| e.value().clone()))
    }

    async fn find_by_id(&self, id: &Key) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|e| e.value().clone()))
    }

    async fn create(&self, user: &User) -> Result<()> {
        match self.users.entry(user.id.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("user {}", user.id))),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                debug!(user_id = %user.id, "Stored user");
                Ok(())
            }
        }
    }
}

/// In-memory mapping store.
#[derive(Default)]
pub struct InMemoryAccountMappingStore {
    by_sso_user: DashMap<String, AccountMapping>,
}

impl InMemoryAccountMappingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `(sso_user, user)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if two pairs share an SSO user ID.
    pub fn with_mappings(pairs: impl IntoIterator<Item = (SsoUser, User)>) -> Result<Self> {
        let store = Self::new();
        for (sso_user, user) in pairs {
            store.insert(AccountMapping::new(sso_user, user))?;
        }
        Ok(store)
    }

    /// Whether `sso_user_id` is mapped to the account `user_id`.
    #[must_use]
    pub fn is_linked_to(&self, sso_user_id: &str, user_id: &Key) -> bool {
        self.by_sso_user
            .get(sso_user_id)
            .is_some_and(|m| &m.user.id == user_id)
    }

    /// Number of stored mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_sso_user.len()
    }

    /// `true` when no mapping is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_sso_user.is_empty()
    }

    fn insert(&self, mapping: AccountMapping) -> Result<()> {
        match self.by_sso_user.entry(mapping.sso_user.id.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!(
                "mapping for SSO user {}",
                mapping.sso_user.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(mapping);
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl AccountMappingStore for InMemoryAccountMappingStore {
    async fn find_by_sso_user_id(&self, sso_user_id: &str) -> Result<Option<User>> {
        Ok(self.by_sso_user.get(sso_user_id).map(|m| m.user.clone()))
    }

    async fn create(&self, sso_user: &SsoUser, user: &User) -> Result<()> {
        self.insert(AccountMapping::new(sso_user.clone(), user.clone()))?;
        debug!(sso_user_id = %sso_user.id, user_id = %user.id, "Stored account mapping");
        Ok(())
    }
}
