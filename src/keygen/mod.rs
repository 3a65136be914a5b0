//! Unique key allocation.
//!
//! A [`KeyGenerator`] buffers a batch of keys drawn from a remote
//! [`KeyBatchSource`] and hands them out one at a time, refilling on demand
//! when the buffer runs dry.
//!
//! # Uniqueness
//!
//! The generator never dispenses a buffered key twice, even under concurrent
//! callers. Cross-process uniqueness is delegated to the source: every batch
//! it issues must be disjoint from every other batch it has ever issued.
//!
//! ```text
//! new_key()
//!   -> lock buffer
//!   -> buffer non-empty? pop front
//!   -> buffer empty?     fetch_batch(batch_size) while still holding the lock
//!                         -> full batch: store, pop front
//!                         -> error / short batch: buffer untouched, return Err
//! ```
//!
//! # Sources
//!
//! | Source | Use |
//! |--------|-----|
//! | [`HttpKeySource`] | Remote key authority over HTTP |
//! | [`LocalKeySource`] | In-process authority for development |
//! | [`InMemoryKeySource`] | Deterministic fixed pool for tests |

pub mod generator;
pub mod http;
pub mod local;
pub mod memory;
pub mod retry;

use std::sync::Arc;

use crate::Result;
use crate::config::{SourceConfig, SourceKind};
use crate::entity::Key;

pub use generator::KeyGenerator;
pub use http::HttpKeySource;
pub use local::LocalKeySource;
pub use memory::InMemoryKeySource;
pub use retry::{RetryPolicy, new_key_with_retry};

/// A remote authority issuing disjoint batches of unused keys.
///
/// Implementations must be `Send + Sync` because one source is shared by
/// every generator in the process.
#[async_trait::async_trait]
pub trait KeyBatchSource: Send + Sync + 'static {
    /// Return exactly `count` distinct, never-before-issued keys.
    ///
    /// Returning fewer keys is a contract violation that the generator
    /// treats as failure.
    async fn fetch_batch(&self, count: usize) -> Result<Vec<Key>>;
}

/// Build the source described by `config`.
pub fn source_from_config(config: &SourceConfig) -> Result<Arc<dyn KeyBatchSource>> {
    source_from_config_reserving(config, std::iter::empty())
}

/// Build the source described by `config`, keeping a local source away from
/// the `reserved` keys. A remote authority tracks its own issued keys, so
/// `reserved` is ignored for it.
pub fn source_from_config_reserving(
    config: &SourceConfig,
    reserved: impl IntoIterator<Item = Key>,
) -> Result<Arc<dyn KeyBatchSource>> {
    let source: Arc<dyn KeyBatchSource> = match config.kind {
        SourceKind::Local => Arc::new(LocalKeySource::with_reserved(
            config.key_length,
            reserved,
        )?),
        SourceKind::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                crate::Error::InvalidConfiguration("http key source requires a url".to_string())
            })?;
            Arc::new(HttpKeySource::new(url, config.timeout)?)
        }
    };
    Ok(source)
}
