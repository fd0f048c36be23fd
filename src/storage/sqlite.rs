// SQLite-backed credential store
// Keeps the credential record in a single `auth_kv` table

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::CredentialStore;
use crate::error::StorageError;

/// Durable credential store in a SQLite database file
///
/// Statements run on the blocking thread pool, one at a time.
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteCredentialStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Backend(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        tracing::info!("Opening credential store: {}", path.display());
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// In-memory database, same schema. Used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Default location: `<data dir>/fieldops/session.sqlite3`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("fieldops").join("session.sqlite3"))
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;

        #[cfg(unix)]
        if let Some(path) = &path {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path, perms) {
                tracing::warn!(path = %path.display(), error = %e, "Could not restrict credential store permissions");
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            // a panic mid-statement leaves no partial row behind, so the connection stays usable
            let conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            op(&conn)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, key: &str) -> Option<String> {
        let owned = key.to_string();
        let result = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row("SELECT value FROM auth_kv WHERE key = ?", [&owned], |row| {
                        row.get(0)
                    })
                    .optional()?)
            })
            .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Failed to read from credential store");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [&key, &value],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM auth_kv WHERE key = ?", [&key])?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let removed = self
            .with_conn(|conn| Ok(conn.execute("DELETE FROM auth_kv", [])?))
            .await?;
        tracing::debug!(removed = removed, "Credential store cleared");
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
