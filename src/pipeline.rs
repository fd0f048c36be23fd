// Authenticated request pipeline
// Every authenticated backend call passes through here: bearer headers are
// injected, authentication failures are classified, one refresh-and-retry is
// attempted, and unrecoverable failures clear the session

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Method;
use std::sync::Arc;
use tracing::Instrument;

use crate::auth::{bearer, SessionExpiry, TokenManager};
use crate::classify;
use crate::error::{ApiError, Result};
use crate::http_client::{HttpResponse, RequestDescriptor, Transport};

const NO_TOKEN_MESSAGE: &str = "No token available";
const SESSION_EXPIRED: &str = "Session expired";
const AUTH_FAILED: &str = "Authentication failed";

/// The single choke point for authenticated backend calls
pub struct AuthPipeline {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    session: Arc<SessionExpiry>,
}

impl AuthPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenManager>,
        session: Arc<SessionExpiry>,
    ) -> Self {
        Self {
            transport,
            tokens,
            session,
        }
    }

    /// Perform a request.
    ///
    /// Returns the backend's response unmodified unless it signals an authentication
    /// failure that a single refresh cannot fix; in that case the session is cleared
    /// and [`ApiError::Auth`] is returned.
    pub async fn request(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let span = tracing::debug_span!(
            "request",
            id = %request_id,
            method = %request.method,
            url = %request.url
        );
        self.execute(request).instrument(span).await
    }

    pub async fn get(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        self.request(request.with_method(Method::GET)).await
    }

    pub async fn post(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        self.request(request.with_method(Method::POST)).await
    }

    pub async fn put(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        self.request(request.with_method(Method::PUT)).await
    }

    pub async fn delete(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        self.request(request.with_method(Method::DELETE)).await
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    async fn execute(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        if classify::is_public_endpoint(&request.url) {
            tracing::debug!("Public endpoint, sending without credentials");
            return Ok(self.transport.send(&request).await?);
        }

        if self.tokens.access_token().await.is_none() {
            tracing::warn!("No access token available");
            self.session.handle_auth_error().await;
            return Err(ApiError::auth(401, NO_TOKEN_MESSAGE, None));
        }

        let mut authorized = request;
        let auth_headers = self.tokens.auth_headers().await;
        authorized.headers = merge_headers(auth_headers, &authorized.headers);

        if !authorized.headers.contains_key(AUTHORIZATION) {
            // the access token expired and could not be refreshed
            self.session.handle_auth_error().await;
            return Err(ApiError::auth(401, SESSION_EXPIRED, None));
        }

        let response = self.send(&authorized).await?;

        if classify::is_auth_status(response.status) {
            return self.retry_after_refresh(authorized, response).await;
        }

        if classify::is_session_expired_body(&response.data) {
            tracing::warn!(
                status = response.status,
                "Response reports an expired session"
            );
            self.session.handle_auth_error().await;
            return Err(ApiError::auth(401, SESSION_EXPIRED, Some(response.data)));
        }

        Ok(response)
    }

    /// Refresh once and re-issue the same request with the new token
    async fn retry_after_refresh(
        &self,
        mut request: RequestDescriptor,
        response: HttpResponse,
    ) -> Result<HttpResponse> {
        tracing::warn!(
            status = response.status,
            "Received {}, refreshing token and retrying...",
            response.status
        );

        let token = match self.tokens.refresh().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                self.session.handle_auth_error().await;
                return Err(ApiError::auth(
                    response.status,
                    AUTH_FAILED,
                    Some(response.data),
                ));
            }
        };

        match bearer(&token) {
            Some(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            None => {
                self.session.handle_auth_error().await;
                return Err(ApiError::auth(
                    response.status,
                    AUTH_FAILED,
                    Some(response.data),
                ));
            }
        }

        let retried = self.send(&request).await?;

        let rejected = classify::is_auth_status(retried.status);
        if rejected || classify::is_session_expired_body(&retried.data) {
            tracing::error!(status = retried.status, "Request still rejected after token refresh");
            self.session.handle_auth_error().await;
            let status = if rejected { retried.status } else { 401 };
            return Err(ApiError::auth(status, AUTH_FAILED, Some(retried.data)));
        }

        tracing::debug!(status = retried.status, "Retry after token refresh succeeded");
        Ok(retried)
    }

    /// Send through the transport; failures that look like authentication
    /// failures clear the session before being re-raised unchanged
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
        match self.transport.send(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let auth_failure = e.status.is_some_and(classify::is_auth_status)
                    || e
                        .data
                        .as_ref()
                        .is_some_and(classify::is_session_expired_body);
                if auth_failure {
                    tracing::warn!(error = %e, "Transport error signals an authentication failure");
                    self.session.handle_auth_error().await;
                }
                Err(e.into())
            }
        }
    }
}

/// Caller headers win on collision; names compare case-insensitively
fn merge_headers(mut base: HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    for name in overrides.keys() {
        base.remove(name);
        for value in overrides.get_all(name) {
            base.append(name.clone(), value.clone());
        }
    }
    base
}
