// Authentication types

use serde_json::Value;

/// Complete credential record held in the credential store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Authorization scopes of the current session; order is irrelevant
    pub privileges: Vec<String>,
    /// Cached display data, never used for authorization
    pub user_profile: Option<Value>,
}

/// Token data granted by the login or refresh endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the backend rotates the refresh token
    pub refresh_token: Option<String>,
    /// Present when the backend sends an updated privilege list
    pub privileges: Option<Vec<String>>,
    pub user: Option<Value>,
}

impl TokenGrant {
    /// Extract a grant from a response body.
    ///
    /// Accepts `{success, data: {access_token, ...}}`, optionally wrapped in one more
    /// `{data: ...}` envelope. Only a truthy `success` and a non-empty `data.access_token`
    /// are required; optional fields of an unexpected shape are dropped. On failure
    /// returns the backend's message when it sent one.
    pub fn from_response(body: &Value, fallback_message: &str) -> Result<Self, String> {
        let body = unwrap_envelope(body);
        let failure = || {
            body.get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(fallback_message)
                .to_string()
        };

        if !body.get("success").is_some_and(is_truthy) {
            return Err(failure());
        }

        let payload = match body.get("data").filter(|d| d.is_object()) {
            Some(payload) => payload,
            None => return Err(failure()),
        };

        let access_token = match payload
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            Some(token) => token.to_string(),
            None => return Err(failure()),
        };

        let refresh_token = match payload.get("refresh_token") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) if !token.is_empty() => Some(token.clone()),
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring refresh_token of unexpected shape");
                None
            }
        };

        let user = payload
            .get("user")
            .or_else(|| payload.get("user_details"))
            .filter(|u| !u.is_null())
            .cloned();

        Ok(TokenGrant {
            access_token,
            refresh_token,
            privileges: payload.get("privileges").and_then(privilege_list),
            user,
        })
    }
}

/// Unwrap one outer `{data: {success, ...}}` envelope when the body has no `success` of its own
fn unwrap_envelope(body: &Value) -> &Value {
    if body.get("success").is_none() {
        if let Some(inner) = body.get("data").filter(|d| d.get("success").is_some()) {
            return inner;
        }
    }
    body
}

/// JSON truthiness: false, null, 0 and "" are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Privileges are only taken from a JSON array; anything else is ignored
fn privilege_list(value: &Value) -> Option<Vec<String>> {
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            if !value.is_null() {
                tracing::warn!(value = %value, "Ignoring privileges of unexpected shape");
            }
            return None;
        }
    };
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
    )
}
