//! Fixed-pool key source for tests and fixtures.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::KeyBatchSource;
use crate::entity::Key;
use crate::{Error, Result};

/// Serves keys from a fixed pool, in order.
///
/// Counts every `fetch_batch` call and can be told to fail on specific call
/// numbers (1-based). When fewer keys remain than requested it returns what
/// is left, so short-batch handling can be exercised; once the pool is empty
/// every call fails with [`Error::SourceUnavailable`].
pub struct InMemoryKeySource {
    pool: Mutex<VecDeque<Key>>,
    calls: AtomicUsize,
    failing_calls: HashSet<usize>,
}

impl InMemoryKeySource {
    /// Create a source over the given pool.
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            pool: Mutex::new(keys.into_iter().collect()),
            calls: AtomicUsize::new(0),
            failing_calls: HashSet::new(),
        }
    }

    /// Make the `call`-th fetch (1-based) fail without touching the pool.
    #[must_use]
    pub fn failing_on(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Number of `fetch_batch` calls so far, failed ones included.
    pub fn fetch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys not yet handed out.
    pub fn remaining(&self) -> usize {
        self.pool.lock().len()
    }
}

#[async_trait::async_trait]
impl KeyBatchSource for InMemoryKeySource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<Key>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&call) {
            return Err(Error::SourceUnavailable(format!(
                "scripted failure on fetch #{call}"
            )));
        }

        let mut pool = self.pool.lock();
        if pool.is_empty() {
            return Err(Error::SourceUnavailable("key pool exhausted".to_string()));
        }
        let take = count.min(pool.len());
        Ok(pool.drain(..take).collect())
    }
}
