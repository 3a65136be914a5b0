//! Buffered key generator.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::KeyBatchSource;
use crate::entity::Key;
use crate::{Error, Result};

/// Dispenses unique keys from a buffered batch, refilling on exhaustion.
///
/// The buffer sits behind an async mutex that is held across the refill
/// round-trip, so a second caller that finds the buffer empty waits for the
/// in-flight refill instead of issuing its own fetch.
pub struct KeyGenerator {
    batch_size: usize,
    source: Arc<dyn KeyBatchSource>,
    buffer: Mutex<VecDeque<Key>>,
}

impl KeyGenerator {
    /// Create a generator and prefetch its first batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when `batch_size` is zero, and
    /// the source error (or [`Error::SourceExhausted`] for a short batch) when
    /// the initial fetch does not deliver a full batch. There is no
    /// partially-initialised generator.
    pub async fn new(batch_size: usize, source: Arc<dyn KeyBatchSource>) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "key batch size must be at least 1".to_string(),
            ));
        }

        let first = fetch_full_batch(source.as_ref(), batch_size).await?;
        debug!(batch_size, "Key generator primed");

        Ok(Self {
            batch_size,
            source,
            buffer: Mutex::new(first.into()),
        })
    }

    /// Hand out the next unused key.
    ///
    /// Keys come out in the order the source delivered them. When the buffer
    /// is empty a fresh batch is fetched before returning; if that fetch
    /// fails the buffer is left untouched and the next call tries again.
    ///
    /// Dropping the returned future mid-refill releases the lock without
    /// changing the buffer.
    pub async fn new_key(&self) -> Result<Key> {
        let mut buffer = self.buffer.lock().await;

        if buffer.is_empty() {
            debug!(batch_size = self.batch_size, "Key buffer empty, refilling");
            let batch = fetch_full_batch(self.source.as_ref(), self.batch_size).await?;
            buffer.extend(batch);
        }

        buffer
            .pop_front()
            .ok_or_else(|| Error::SourceExhausted {
                requested: self.batch_size,
                received: 0,
            })
    }

    /// Number of keys currently buffered.
    pub async fn remaining(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Configured refill batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Fetch a batch and reject anything short of `count` keys.
async fn fetch_full_batch(source: &dyn KeyBatchSource, count: usize) -> Result<Vec<Key>> {
    let batch = source.fetch_batch(count).await?;
    if batch.len() < count {
        warn!(
            requested = count,
            received = batch.len(),
            "Key source returned a short batch, discarding"
        );
        return Err(Error::SourceExhausted {
            requested: count,
            received: batch.len(),
        });
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::InMemoryKeySource;

    fn pool(keys: &[&str]) -> Arc<InMemoryKeySource> {
        Arc::new(InMemoryKeySource::new(keys.iter().copied().map(Key::from)))
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected_without_fetching() {
        // GIVEN: a source with plenty of keys
        let source = pool(&["a", "b"]);

        // WHEN: we construct with batch size 0
        let result = KeyGenerator::new(0, source.clone()).await;

        // THEN: InvalidConfiguration, and the source was never contacted
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert_eq!(source.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn construction_prefetches_one_batch() {
        let source = pool(&["a", "b", "c"]);

        let generator = KeyGenerator::new(2, source.clone()).await.unwrap();

        assert_eq!(source.fetch_calls(), 1);
        assert_eq!(generator.remaining().await, 2);
        assert_eq!(generator.batch_size(), 2);
    }

    #[tokio::test]
    async fn construction_fails_on_short_initial_batch() {
        // GIVEN: a pool with fewer keys than the batch size
        let source = pool(&["a"]);

        // WHEN: construct with batch size 2
        let result = KeyGenerator::new(2, source).await;

        // THEN: SourceExhausted reporting what was delivered
        assert!(matches!(
            result,
            Err(Error::SourceExhausted {
                requested: 2,
                received: 1
            })
        ));
    }

    #[tokio::test]
    async fn construction_fails_when_source_errors() {
        let source = Arc::new(InMemoryKeySource::new(vec![Key::from("a")]).failing_on(1));

        let result = KeyGenerator::new(1, source).await;

        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn keys_are_dispensed_in_source_order() {
        let source = pool(&["k1", "k2", "k3", "k4"]);
        let generator = KeyGenerator::new(2, source).await.unwrap();

        let mut keys = Vec::new();
        for _ in 0..4 {
            keys.push(generator.new_key().await.unwrap().into_inner());
        }

        assert_eq!(keys, vec!["k1", "k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn refill_happens_only_when_buffer_is_empty() {
        let source = pool(&["k1", "k2", "k3", "k4"]);
        let generator = KeyGenerator::new(2, source.clone()).await.unwrap();

        generator.new_key().await.unwrap();
        generator.new_key().await.unwrap();
        assert_eq!(source.fetch_calls(), 1);

        generator.new_key().await.unwrap();
        assert_eq!(source.fetch_calls(), 2);
        assert_eq!(generator.remaining().await, 1);
    }

    #[tokio::test]
    async fn failed_refill_leaves_generator_usable() {
        // GIVEN: second fetch fails, third succeeds
        let source = Arc::new(
            InMemoryKeySource::new(["k1", "k2", "k3"].map(Key::from)).failing_on(2),
        );
        let generator = KeyGenerator::new(1, source.clone()).await.unwrap();
        assert_eq!(generator.new_key().await.unwrap().as_str(), "k1");

        // WHEN: the refill fails
        let err = generator.new_key().await.unwrap_err();

        // THEN: the error surfaces, the buffer is still empty, the next call retries
        assert!(err.is_source_error());
        assert_eq!(generator.remaining().await, 0);
        assert_eq!(generator.new_key().await.unwrap().as_str(), "k2");
        assert_eq!(source.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn short_refill_is_discarded() {
        // GIVEN: three keys, batch size 2
        let source = pool(&["k1", "k2", "k3"]);
        let generator = KeyGenerator::new(2, source).await.unwrap();
        generator.new_key().await.unwrap();
        generator.new_key().await.unwrap();

        // WHEN: the refill only finds one key
        let err = generator.new_key().await.unwrap_err();

        // THEN: nothing is half-consumed
        assert!(matches!(
            err,
            Error::SourceExhausted {
                requested: 2,
                received: 1
            }
        ));
        assert_eq!(generator.remaining().await, 0);
    }
}
