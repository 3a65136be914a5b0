//! Account linking for single-sign-on identities.
//!
//! When an SSO identity first appears, [`AccountLinker`] decides whether it
//! controls an existing account (matched by email) or needs a new one, whose
//! ID is drawn from the [`KeyGenerator`](crate::keygen::KeyGenerator).
//!
//! ```text
//! SSO user
//!   -> mapping exists?          -> AlreadyLinked (no writes)
//!   -> account with same email? -> write mapping -> LinkedExisting
//!   -> new_key -> create account -> write mapping -> Created
//!                                   (fails: PartialLink, account kept)
//! ```

pub mod audit;
pub mod linker;

pub use audit::AccountEvent;
pub use linker::{AccountLinker, LinkOutcome};
