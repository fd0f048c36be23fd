// Response classification
// The backend signals a dead session through status codes and through message
// wording; every wording check lives here

use serde_json::Value;

/// Phrases the backend uses in `message` when the session is no longer valid
const SESSION_EXPIRED_PHRASES: &[&str] = &[
    "session expired",
    "not authenticated",
    "unauthorized",
    "token expired",
    "invalid token",
    "please login again",
];

/// URL fragments of endpoints that are called without a session
const PUBLIC_ENDPOINTS: &[&str] = &["/login", "/refresh", "/register"];

/// 401 and 403 both mean the bearer token was not accepted
pub fn is_auth_status(status: u16) -> bool {
    status == 401 || status == 403
}

/// Login, refresh and registration bypass header injection and the retry logic
pub fn is_public_endpoint(url: &str) -> bool {
    PUBLIC_ENDPOINTS.iter().any(|fragment| url.contains(fragment))
}

/// Case-insensitive phrase match against a message
pub fn is_session_expired_message(message: &str) -> bool {
    let message = message.to_lowercase();
    SESSION_EXPIRED_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

/// Whether a response body carries a session-expired message, either at the
/// top level or inside a nested `data` object
pub fn is_session_expired_body(body: &Value) -> bool {
    [body.get("message"), body.get("data").and_then(|d| d.get("message"))]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .any(is_session_expired_message)
}
