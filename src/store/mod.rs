//! Persistence interfaces for accounts and SSO mappings.
//!
//! [`UserStore`] owns [`User`] records; [`AccountMappingStore`] owns the
//! SSO-identity-to-account correspondences. The two are independent: there is
//! no transaction spanning both.

pub mod file;
pub mod memory;

use crate::Result;
use crate::entity::{Key, SsoUser, User};

pub use file::FileAccountStore;
pub use memory::{InMemoryAccountMappingStore, InMemoryUserStore};

/// Account records.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Look up an account by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up an account by ID.
    async fn find_by_id(&self, id: &Key) -> Result<Option<User>>;

    /// Persist a new account.
    ///
    /// Fails with [`Error::AlreadyExists`](crate::Error::AlreadyExists) if an
    /// account with the same ID is already stored.
    async fn create(&self, user: &User) -> Result<()>;
}

/// SSO identity to account correspondences.
#[async_trait::async_trait]
pub trait AccountMappingStore: Send + Sync + 'static {
    /// Return the account linked to the given SSO user ID, if any.
    async fn find_by_sso_user_id(&self, sso_user_id: &str) -> Result<Option<User>>;

    /// Record that `sso_user` controls `user`.
    ///
    /// Fails with [`Error::AlreadyExists`](crate::Error::AlreadyExists) if
    /// `sso_user.id` is already mapped: an SSO user maps to at most one account.
    async fn create(&self, sso_user: &SsoUser, user: &User) -> Result<()>;
}
