// Navigation and user notification collaborators
// The pipeline only signals "go to login" and "tell the user"; how the host app
// renders either is up to the implementations of these traits

use std::sync::RwLock;
use std::time::Duration;

use crate::storage::{keys, CredentialStore};

/// Route-level navigation as seen by the session layer
pub trait Navigator: Send + Sync {
    /// Route currently displayed
    fn current_route(&self) -> String;

    /// Move to `route`. With `replace_history`, earlier entries become unreachable by going back.
    fn navigate(&self, route: &str, replace_history: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Danger,
}

/// Transient user-visible message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub duration: Duration,
}

impl Notification {
    const DEFAULT_DURATION: Duration = Duration::from_millis(2000);

    fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            duration: Self::DEFAULT_DURATION,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Danger)
    }
}

/// Shows transient notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes to the log. Used by the CLI.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!("{}", notification.message),
            NotificationLevel::Warning => tracing::warn!("{}", notification.message),
            NotificationLevel::Danger => tracing::error!("{}", notification.message),
        }
    }
}

/// In-process route history
pub struct HistoryNavigator {
    history: RwLock<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(initial_route: impl Into<String>) -> Self {
        Self {
            history: RwLock::new(vec![initial_route.into()]),
        }
    }

    /// Whether going back would leave the current route
    pub fn can_go_back(&self) -> bool {
        self.history
            .read()
            .map(|history| history.len() > 1)
            .unwrap_or(false)
    }

    /// Pop the current route; returns the route now displayed
    pub fn back(&self) -> Option<String> {
        let mut history = self.history.write().ok()?;
        if history.len() > 1 {
            history.pop();
        }
        history.last().cloned()
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .read()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

impl Navigator for HistoryNavigator {
    fn current_route(&self) -> String {
        self.history
            .read()
            .ok()
            .and_then(|history| history.last().cloned())
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, route: &str, replace_history: bool) {
        let mut history = match self.history.write() {
            Ok(history) => history,
            Err(poisoned) => poisoned.into_inner(),
        };
        if replace_history {
            history.clear();
        }
        history.push(route.to_string());
        tracing::debug!(route = route, replace_history = replace_history, "Navigated");
    }
}

/// Route guard for authenticated screens.
///
/// Allows entry when an access token is stored; otherwise sends the user to the
/// login route and refuses.
pub async fn auth_guard(
    store: &dyn CredentialStore,
    navigator: &dyn Navigator,
    login_route: &str,
) -> bool {
    if store.get(keys::AUTH_TOKEN).await.is_some() {
        return true;
    }

    tracing::debug!(route = %navigator.current_route(), "No access token, redirecting to login");
    navigator.navigate(login_route, false);
    false
}
