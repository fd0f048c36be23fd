use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::{Arc, Mutex, MutexGuard};

use super::credentials;
use super::privileges::PrivilegeCache;
use super::refresh;
use super::session::SessionExpiry;
use super::token;
use crate::error::RefreshError;
use crate::http_client::Transport;
use crate::storage::{keys, CredentialStore};

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Token lifecycle manager
/// Decides whether the held access token is usable and refreshes it at most once per need
pub struct TokenManager {
    /// Credential store holding the tokens
    store: Arc<dyn CredentialStore>,

    /// Transport for refresh requests
    transport: Arc<dyn Transport>,

    /// Unrecoverable-failure path
    session: Arc<SessionExpiry>,

    /// In-memory mirror of the stored privileges
    privileges: PrivilegeCache,

    /// Full URL of the refresh endpoint
    refresh_url: String,

    /// Margin before the embedded expiry at which a token counts as expired
    expiry_skew: Duration,

    /// The refresh currently in flight; every concurrent caller awaits this one
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        session: Arc<SessionExpiry>,
        privileges: PrivilegeCache,
        base_url: &str,
        expiry_skew_secs: i64,
    ) -> Self {
        Self {
            store,
            transport,
            session,
            privileges,
            refresh_url: refresh::refresh_url(base_url),
            expiry_skew: Duration::seconds(expiry_skew_secs),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// True when the token is within the expiry skew of its `exp` claim, or undecodable
    pub fn is_expired(&self, token: &str) -> bool {
        token::is_expired(token, self.expiry_skew)
    }

    /// Currently stored access token, without any refresh
    pub async fn access_token(&self) -> Option<String> {
        self.store.get(keys::AUTH_TOKEN).await
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock_in_flight().is_some()
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// Concurrent callers share one refresh and all observe its outcome. On failure
    /// the session has already been cleared by the time this returns.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let shared = {
            let mut slot = self.lock_in_flight();
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let future = self.start_refresh();
                    *slot = Some(future.clone());
                    future
                }
            }
        };

        let result = shared.clone().await;

        {
            let mut slot = self.lock_in_flight();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
                *slot = None;
            }
        }

        result
    }

    /// Headers for an authenticated request.
    ///
    /// Refreshes first when the stored token is expired. Authorization is omitted
    /// when no usable token can be obtained.
    pub async fn auth_headers(&self) -> HeaderMap {
        let mut token = self.access_token().await;

        if let Some(current) = &token {
            if self.is_expired(current) {
                tracing::info!("Access token expired or expiring soon, refreshing");
                token = self.refresh().await.ok();
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            if let Some(value) = bearer(&token) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn start_refresh(&self) -> RefreshFuture {
        let store = self.store.clone();
        let transport = self.transport.clone();
        let session = self.session.clone();
        let privileges = self.privileges.clone();
        let url = self.refresh_url.clone();

        async move {
            let result = async {
                let refresh_token = store
                    .get(keys::REFRESH_TOKEN)
                    .await
                    .ok_or(RefreshError::MissingRefreshToken)?;

                let grant =
                    refresh::exchange_refresh_token(transport.as_ref(), &url, &refresh_token)
                        .await?;

                credentials::apply_grant(store.as_ref(), &privileges, &grant)
                    .await
                    .map_err(|e| RefreshError::Storage(e.to_string()))?;

                Ok::<_, RefreshError>(grant.access_token)
            }
            .await;

            if let Err(e) = &result {
                tracing::error!("Token refresh failed: {}", e);
                session.handle_auth_error().await;
            }

            result
        }
        .boxed()
        .shared()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `Bearer <token>` header value, marked sensitive
pub(crate) fn bearer(token: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Access token contains characters not allowed in a header");
            None
        }
    }
}
