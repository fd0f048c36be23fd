// Session client
// Wires the credential store, token manager, session-expiry path and request
// pipeline together, and owns login and logout

use serde::Serialize;
use std::sync::Arc;

use crate::auth::{Credentials, PrivilegeCache, SessionExpiry, TokenGrant, TokenManager};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::http_client::{HttpResponse, RequestDescriptor, ReqwestTransport, Transport};
use crate::navigation::{HistoryNavigator, Navigator, Notification, Notifier, TracingNotifier};
use crate::pipeline::AuthPipeline;
use crate::storage::{CredentialStore, SqliteCredentialStore};

/// Path of the login endpoint, relative to the backend base URL
pub const LOGIN_PATH: &str = "/api/login";

const LOGIN_FAILED: &str = "Login failed";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Authenticated session against the backend
pub struct SessionClient {
    config: Config,
    store: Arc<dyn CredentialStore>,
    privileges: PrivilegeCache,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    pipeline: AuthPipeline,
}

impl SessionClient {
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let privileges = PrivilegeCache::new();

        let session = Arc::new(SessionExpiry::new(
            store.clone(),
            privileges.clone(),
            navigator.clone(),
            notifier.clone(),
            config.login_route.clone(),
            config.redirect_cooldown,
        ));

        let tokens = Arc::new(TokenManager::new(
            store.clone(),
            transport.clone(),
            session.clone(),
            privileges.clone(),
            &config.base_url,
            config.expiry_skew_secs,
        ));

        let pipeline = AuthPipeline::new(transport, tokens, session);

        Self {
            config,
            store,
            privileges,
            navigator,
            notifier,
            pipeline,
        }
    }

    /// Production wiring: SQLite store, reqwest transport, in-process navigation,
    /// notifications through tracing. Privileges are restored from the store.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteCredentialStore::open(&config.store_file)?);
        let transport = Arc::new(ReqwestTransport::new(
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?);
        let navigator = Arc::new(HistoryNavigator::new(config.home_route.clone()));

        let client = Self::new(config, store, transport, navigator, Arc::new(TracingNotifier));
        client.restore().await;
        Ok(client)
    }

    /// Load the stored credential record and seed the privilege cache from it
    pub async fn restore(&self) -> Credentials {
        let credentials = Credentials::load(self.store.as_ref()).await;
        self.privileges.set(credentials.privileges.clone()).await;
        tracing::debug!(
            authenticated = credentials.is_authenticated(),
            privileges = credentials.privileges.len(),
            "Session restored"
        );
        credentials
    }

    /// Log in with username and password.
    ///
    /// On success the credential record replaces whatever was stored and navigation
    /// moves to the home route.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let body = serde_json::to_value(LoginRequest { username, password })
            .map_err(|e| ApiError::Internal(e.into()))?;
        let request = RequestDescriptor::post(self.url(LOGIN_PATH)).json(body);
        let response = self.pipeline.request(request).await?;

        let grant = match TokenGrant::from_response(&response.data, LOGIN_FAILED) {
            Ok(grant) if response.is_success() => grant,
            Ok(_) => return Err(self.login_rejected(&response, LOGIN_FAILED.to_string())),
            Err(message) => return Err(self.login_rejected(&response, message)),
        };

        let credentials = Credentials::from(grant);
        credentials.persist(self.store.as_ref()).await?;
        self.privileges.set(credentials.privileges.clone()).await;

        tracing::info!(
            username = username,
            privileges = credentials.privileges.len(),
            "Login successful"
        );
        self.notifier.notify(Notification::success("Login successful"));
        self.navigator.navigate(&self.config.home_route, true);

        Ok(credentials)
    }

    /// Drop the session and return to the login route
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        self.privileges.clear().await;
        self.navigator.navigate(&self.config.login_route, true);
        tracing::info!("Logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        Credentials::load(self.store.as_ref())
            .await
            .is_authenticated()
    }

    pub async fn privileges(&self) -> Vec<String> {
        self.privileges.snapshot().await
    }

    pub async fn has_privilege(&self, privilege: &str) -> bool {
        self.privileges.contains(privilege).await
    }

    pub async fn credentials(&self) -> Credentials {
        Credentials::load(self.store.as_ref()).await
    }

    pub fn pipeline(&self) -> &AuthPipeline {
        &self.pipeline
    }

    /// Absolute URL for a backend path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Authenticated request to a backend path
    pub async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        self.pipeline.request(request).await
    }

    fn login_rejected(&self, response: &HttpResponse, message: String) -> ApiError {
        let status = if response.is_success() {
            401
        } else {
            response.status
        };
        tracing::warn!(status = status, "Login rejected: {}", message);
        self.notifier.notify(Notification::failure(message.clone()));
        ApiError::auth(status, message, Some(response.data.clone()))
    }
}
