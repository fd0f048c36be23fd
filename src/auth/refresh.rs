// Token refresh exchange

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;

use super::types::TokenGrant;
use crate::error::RefreshError;
use crate::http_client::{RequestDescriptor, Transport};

/// Path of the refresh endpoint, relative to the backend base URL
pub const REFRESH_PATH: &str = "/api/refresh";

/// Refresh URL for a backend base URL
pub fn refresh_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH)
}

/// Exchange a refresh token for a new access token.
///
/// Does not touch storage; committing the grant is the caller's job.
pub async fn exchange_refresh_token(
    transport: &dyn Transport,
    url: &str,
    refresh_token: &str,
) -> Result<TokenGrant, RefreshError> {
    tracing::info!("Refreshing access token...");

    let mut request = RequestDescriptor::new(Method::POST, url)
        .json(json!({ "refresh_token": refresh_token }));
    request
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let response = transport
        .send(&request)
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    if !response.is_success() {
        let message = response
            .data
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| response.data.to_string());
        tracing::error!(
            status = response.status,
            body = %message,
            "Token refresh rejected"
        );
        return Err(RefreshError::Rejected {
            status: response.status,
            message,
        });
    }

    let grant = TokenGrant::from_response(&response.data, "Failed to refresh token")
        .map_err(RefreshError::InvalidResponse)?;

    match super::token::expires_at(&grant.access_token) {
        Some(exp) => tracing::info!("Token refreshed, expires: {}", exp.to_rfc3339()),
        None => tracing::info!("Token refreshed"),
    }

    Ok(grant)
}
