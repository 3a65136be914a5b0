//! File-backed account store.
//!
//! Keeps users and SSO mappings in a single JSON document so accounts survive
//! restarts. Every write rewrites the whole document through a temporary file
//! and a rename; a failed write leaves both the file and the in-memory state
//! as they were.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AccountMappingStore, UserStore};
use crate::entity::{AccountMapping, Key, SsoUser, User};
use crate::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountDocument {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    mappings: Vec<AccountMapping>,
}

/// JSON-file store implementing both [`UserStore`] and [`AccountMappingStore`].
pub struct FileAccountStore {
    path: PathBuf,
    doc: Mutex<AccountDocument>,
}

impl FileAccountStore {
    /// Open the store at `path`, loading existing records if the file exists.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let doc = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let doc: AccountDocument = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                users = doc.users.len(),
                mappings = doc.mappings.len(),
                "Loaded account store"
            );
            doc
        } else {
            debug!(path = %path.display(), "Starting empty account store");
            AccountDocument::default()
        };

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// IDs of every stored account.
    #[must_use]
    pub fn user_ids(&self) -> Vec<Key> {
        self.doc.lock().users.iter().map(|u| u.id.clone()).collect()
    }

    fn persist(&self, doc: &AccountDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for FileAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.doc.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &Key) -> Result<Option<User>> {
        Ok(self.doc.lock().users.iter().find(|u| &u.id == id).cloned())
    }

    async fn create(&self, user: &User) -> Result<()> {
        let mut doc = self.doc.lock();
        if doc.users.iter().any(|u| u.id == user.id) {
            return Err(Error::AlreadyExists(format!("user {}", user.id)));
        }

        doc.users.push(user.clone());
        if let Err(e) = self.persist(&doc) {
            doc.users.pop();
            return Err(e);
        }
        debug!(user_id = %user.id, "Stored user");
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountMappingStore for FileAccountStore {
    async fn find_by_sso_user_id(&self, sso_user_id: &str) -> Result<Option<User>> {
        Ok(self
            .doc
            .lock()
            .mappings
            .iter()
            .find(|m| m.sso_user.id == sso_user_id)
            .map(|m| m.user.clone()))
    }

    async fn create(&self, sso_user: &SsoUser, user: &User) -> Result<()> {
        let mut doc = self.doc.lock();
        if doc.mappings.iter().any(|m| m.sso_user.id == sso_user.id) {
            return Err(Error::AlreadyExists(format!(
                "mapping for SSO user {}",
                sso_user.id
            )));
        }

        doc.mappings
            .push(AccountMapping::new(sso_user.clone(), user.clone()));
        if let Err(e) = self.persist(&doc) {
            doc.mappings.pop();
            return Err(e);
        }
        debug!(sso_user_id = %sso_user.id, user_id = %user.id, "Stored account mapping");
        Ok(())
    }
}
