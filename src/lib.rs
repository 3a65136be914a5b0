//! short-keygen
//!
//! Unique short-key allocation and SSO account linking.
//!
//! # Features
//!
//! - **Batched key allocation**: [`keygen::KeyGenerator`] buffers keys drawn
//!   from a remote authority and dispenses each exactly once, refilling on
//!   demand under a single lock
//! - **Pluggable sources**: HTTP authority, in-process authority, fixed pool
//! - **Account linking**: [`account::AccountLinker`] reuses an account by
//!   email or mints one with a fresh key, and records the SSO mapping
//! - **Stores**: in-memory and JSON-file implementations of the user and
//!   mapping stores

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod authority;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod keygen;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
