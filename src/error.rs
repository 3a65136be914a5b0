//! Error types for short-keygen

use std::io;

use thiserror::Error;

use crate::entity::Key;

/// Result type alias for short-keygen
pub type Result<T> = std::result::Result<T, Error>;

/// Key allocation and account linking errors
#[derive(Error, Debug)]
pub enum Error {
    /// Construction-time misuse (e.g. a zero batch size)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The key batch source failed to answer
    #[error("Key source unavailable: {0}")]
    SourceUnavailable(String),

    /// The key batch source delivered fewer keys than requested
    #[error("Key source exhausted: requested {requested} keys, received {received}")]
    SourceExhausted {
        /// Keys asked for
        requested: usize,
        /// Keys actually delivered
        received: usize,
    },

    /// A store refused to create a record that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(String),

    /// The account was created but its mapping could not be recorded.
    ///
    /// The user record is not rolled back; retry the mapping with
    /// [`AccountLinker::relink`](crate::account::AccountLinker::relink).
    #[error("Account {user_id} created but not linked: {source}")]
    PartialLink {
        /// ID of the orphaned account
        user_id: Key,
        /// Mapping store failure
        #[source]
        source: Box<Error>,
    },

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller may reasonably try the same operation again.
    ///
    /// Only key source failures qualify; configuration and store errors
    /// will not change on their own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_source_error()
    }

    /// Key source failure (`SourceUnavailable` or `SourceExhausted`)
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::SourceExhausted { .. })
    }

    /// Store failure, including the partial-link state
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists(_) | Self::Store(_) | Self::PartialLink { .. } | Self::Io(_) | Self::Json(_)
        )
    }
}
