//! In-process key authority.
//!
//! Stands in for the remote key-generation service during development and
//! behind the `serve` command. Keys are base62 strings drawn from UUIDv4
//! entropy; every issued key is remembered so batches stay disjoint for the
//! lifetime of the source.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::KeyBatchSource;
use crate::entity::Key;
use crate::{Error, Result};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Longest key a single UUID can fill (62^21 < 2^128).
pub const MAX_KEY_LENGTH: usize = 21;

/// Generates random base62 keys and never reissues one.
pub struct LocalKeySource {
    key_length: usize,
    issued: Mutex<HashSet<String>>,
}

impl LocalKeySource {
    /// Create a source producing keys of `key_length` characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless
    /// `1 <= key_length <= MAX_KEY_LENGTH`.
    pub fn new(key_length: usize) -> Result<Self> {
        if key_length == 0 || key_length > MAX_KEY_LENGTH {
            return Err(Error::InvalidConfiguration(format!(
                "key length must be between 1 and {MAX_KEY_LENGTH}, got {key_length}"
            )));
        }
        Ok(Self {
            key_length,
            issued: Mutex::new(HashSet::new()),
        })
    }

    /// Like [`new`](Self::new), but treats `reserved` as already issued.
    ///
    /// Lets a fresh process avoid keys that earlier runs handed out and that
    /// are still in use, such as account IDs in a persistent store.
    pub fn with_reserved(
        key_length: usize,
        reserved: impl IntoIterator<Item = Key>,
    ) -> Result<Self> {
        let source = Self::new(key_length)?;
        source
            .issued
            .lock()
            .extend(reserved.into_iter().map(Key::into_inner));
        Ok(source)
    }

    /// Total keys issued so far.
    pub fn issued(&self) -> usize {
        self.issued.lock().len()
    }

    /// Size of the key space for the configured length.
    fn capacity(&self) -> u128 {
        62u128.pow(u32::try_from(self.key_length).unwrap_or(u32::MAX))
    }

    fn random_key(&self) -> String {
        let mut n = Uuid::new_v4().as_u128();
        let mut out = String::with_capacity(self.key_length);
        for _ in 0..self.key_length {
            out.push(ALPHABET[(n % 62) as usize] as char);
            n /= 62;
        }
        out
    }
}

#[async_trait::async_trait]
impl KeyBatchSource for LocalKeySource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<Key>> {
        let mut issued = self.issued.lock();

        let available = self.capacity().saturating_sub(issued.len() as u128);
        if (count as u128) > available {
            return Err(Error::SourceUnavailable(format!(
                "key space exhausted: {available} keys left, {count} requested"
            )));
        }

        let mut batch = Vec::with_capacity(count);
        while batch.len() < count {
            let candidate = self.random_key();
            if issued.insert(candidate.clone()) {
                batch.push(Key::from(candidate));
            }
        }

        debug!(count, total_issued = issued.len(), "Issued local key batch");
        Ok(batch)
    }
}
