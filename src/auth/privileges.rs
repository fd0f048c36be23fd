// In-memory privilege cache
// Mirrors the `user_privileges` entry of the credential store for fast feature checks

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, cloneable view of the current session's privileges
#[derive(Clone, Default)]
pub struct PrivilegeCache {
    inner: Arc<RwLock<Vec<String>>>,
}

impl PrivilegeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the privilege list. Previous entries are dropped, never merged.
    pub async fn set(&self, privileges: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(privileges.len());
        for privilege in privileges {
            if !deduped.contains(&privilege) {
                deduped.push(privilege);
            }
        }
        *self.inner.write().await = deduped;
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.read().await.clone()
    }

    pub async fn contains(&self, privilege: &str) -> bool {
        self.inner.read().await.iter().any(|p| p == privilege)
    }
}
