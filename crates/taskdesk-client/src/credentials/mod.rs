//! Credential persistence.
//!
//! - [`CredentialRecord`]: access token, refresh token and cached user profile
//! - [`CredentialStore`]: synchronous, all-or-nothing persistence trait
//! - [`MemoryCredentialStore`]: in-process store for tests and embedding
//! - [`FileCredentialStore`]: durable JSON file that survives restarts

mod store;
mod types;

pub(crate) use types::{opt_string_or_number, string_or_number};

pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{CredentialRecord, PerformanceMetrics, UserProfile};
