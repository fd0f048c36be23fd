// Credential record loading and persistence

use serde_json::Value;

use super::privileges::PrivilegeCache;
use super::types::{Credentials, TokenGrant};
use crate::error::StorageError;
use crate::storage::{keys, CredentialStore};

impl Credentials {
    /// Load the credential record from the store.
    ///
    /// Malformed privilege or profile entries are logged and read as empty.
    pub async fn load(store: &dyn CredentialStore) -> Self {
        let privileges = match store.get(keys::USER_PRIVILEGES).await {
            Some(raw) => parse_privileges(&raw),
            None => Vec::new(),
        };

        let user_profile = store
            .get(keys::USER_DETAILS)
            .await
            .and_then(|raw| match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed user details in credential store");
                    None
                }
            });

        Credentials {
            access_token: store.get(keys::AUTH_TOKEN).await,
            refresh_token: store.get(keys::REFRESH_TOKEN).await,
            privileges,
            user_profile,
        }
    }

    /// A refresh token alone does not make a session
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Make the store hold exactly this record: present fields are written,
    /// absent ones removed. Privileges always overwrite.
    pub async fn persist(&self, store: &dyn CredentialStore) -> Result<(), StorageError> {
        write_or_remove(store, keys::AUTH_TOKEN, self.access_token.as_deref()).await?;
        write_or_remove(store, keys::REFRESH_TOKEN, self.refresh_token.as_deref()).await?;
        store
            .set(
                keys::USER_PRIVILEGES,
                &serde_json::to_string(&self.privileges)?,
            )
            .await?;
        let profile = match &self.user_profile {
            Some(profile) => Some(serde_json::to_string(profile)?),
            None => None,
        };
        write_or_remove(store, keys::USER_DETAILS, profile.as_deref()).await?;
        Ok(())
    }
}

async fn write_or_remove(
    store: &dyn CredentialStore,
    key: &str,
    value: Option<&str>,
) -> Result<(), StorageError> {
    match value {
        Some(value) => store.set(key, value).await,
        None => store.remove(key).await,
    }
}

impl From<TokenGrant> for Credentials {
    fn from(grant: TokenGrant) -> Self {
        Credentials {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            privileges: grant.privileges.unwrap_or_default(),
            user_profile: grant.user,
        }
    }
}

/// Commit a refresh grant: the new access token, plus privileges, a rotated
/// refresh token and profile data when the backend sent them.
pub async fn apply_grant(
    store: &dyn CredentialStore,
    cache: &PrivilegeCache,
    grant: &TokenGrant,
) -> Result<(), StorageError> {
    store.set(keys::AUTH_TOKEN, &grant.access_token).await?;

    if let Some(privileges) = &grant.privileges {
        store
            .set(keys::USER_PRIVILEGES, &serde_json::to_string(privileges)?)
            .await?;
        cache.set(privileges.clone()).await;
        tracing::debug!(count = privileges.len(), "Privileges updated");
    }

    if let Some(refresh_token) = &grant.refresh_token {
        store.set(keys::REFRESH_TOKEN, refresh_token).await?;
        tracing::debug!("Refresh token rotated");
    }

    if let Some(user) = &grant.user {
        store
            .set(keys::USER_DETAILS, &serde_json::to_string(user)?)
            .await?;
    }

    Ok(())
}

/// Decode the stored privilege array; anything malformed reads as no privileges
pub fn parse_privileges(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(privileges) => privileges,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed privileges in credential store");
            Vec::new()
        }
    }
}
