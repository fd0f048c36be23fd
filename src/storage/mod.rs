// Credential storage
// Durable key-value store for the session's tokens, privileges and profile

mod memory;
mod sqlite;

use async_trait::async_trait;

pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

use crate::error::StorageError;

/// Keys under which the credential record is kept
pub mod keys {
    /// Current access token
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Current refresh token
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// JSON-encoded array of privilege strings
    pub const USER_PRIVILEGES: &str = "user_privileges";
    /// JSON-encoded profile object
    pub const USER_DETAILS: &str = "user_details";
}

/// Key-value store that survives process restarts
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value. Absence is a normal result; backend failures are logged and read as absent.
    async fn get(&self, key: &str) -> Option<String>;

    /// Overwrite a value
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a single key
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key
    async fn clear(&self) -> Result<(), StorageError>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Option<String> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
