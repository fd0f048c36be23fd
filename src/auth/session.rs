// Session expiry handling
// The single path taken when authentication cannot be recovered: clear the
// credential store, tell the user, and send navigation back to the login route

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::privileges::PrivilegeCache;
use crate::navigation::{Navigator, Notification, Notifier};
use crate::storage::CredentialStore;

/// Message shown when the session is cleared
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Default time before a new redirect can be triggered
pub const DEFAULT_REDIRECT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Clears the session on unrecoverable authentication failures
pub struct SessionExpiry {
    store: Arc<dyn CredentialStore>,
    privileges: PrivilegeCache,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,

    /// Set while a redirect is in progress; reset after `cooldown`
    redirecting: Arc<AtomicBool>,

    login_route: String,
    cooldown: Duration,
}

impl SessionExpiry {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        privileges: PrivilegeCache,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        login_route: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            privileges,
            navigator,
            notifier,
            redirecting: Arc::new(AtomicBool::new(false)),
            login_route: login_route.into(),
            cooldown,
        }
    }

    /// Clear credentials, notify and redirect to login.
    ///
    /// No-op while a previous redirect is cooling down or when the login route
    /// is already displayed.
    pub async fn handle_auth_error(&self) {
        if self.redirecting.load(Ordering::SeqCst) {
            tracing::debug!("Redirect to login already in progress");
            return;
        }

        let current = self.navigator.current_route();
        if current.starts_with(&self.login_route) {
            tracing::debug!(route = %current, "Already on login route, not redirecting");
            return;
        }

        if self
            .redirecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        tracing::warn!(route = %current, "Session expired, clearing credentials");

        if let Err(e) = self.store.clear().await {
            tracing::error!(store = self.store.name(), error = %e, "Failed to clear credential store");
        }
        self.privileges.clear().await;

        self.notifier
            .notify(Notification::warning(SESSION_EXPIRED_MESSAGE));
        self.navigator.navigate(&self.login_route, true);

        let redirecting = self.redirecting.clone();
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            redirecting.store(false, Ordering::SeqCst);
        });
    }

    /// Whether a redirect happened within the last cooldown window
    pub fn is_redirecting(&self) -> bool {
        self.redirecting.load(Ordering::SeqCst)
    }
}
