// HTTP transport for backend calls
// The pipeline talks to the backend through the `Transport` trait; `ReqwestTransport`
// is the production implementation with connection pooling and timeouts

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How the response body should be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Parse as JSON, falling back to a string body when parsing fails
    #[default]
    Json,
    /// Keep the raw body as a string
    Text,
}

/// A single outgoing request. Never persisted.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    /// Header names are case-insensitive
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub response_type: ResponseType,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
            response_type: ResponseType::Json,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add or replace a header. Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid request header"),
        }
        self
    }

    /// Attach a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// How the response body is decoded
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Same request with a different method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// Response as seen by the pipeline and its callers
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Decoded body; `Value::Null` when empty
    pub data: Value,
    pub url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Category of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionFailed,
    Request,
    Body,
    Decode,
    Unknown,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionFailed => "connection_failed",
            TransportErrorKind::Request => "request_error",
            TransportErrorKind::Body => "body_error",
            TransportErrorKind::Decode => "decode_error",
            TransportErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A request that never produced a usable response
#[derive(Error, Debug, Clone)]
#[error("{message} (kind: {kind})")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Status carried by the failure, if the transport saw one
    pub status: Option<u16>,
    pub message: String,
    /// Payload carried by the failure, if any
    pub data: Option<Value>,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::ConnectionFailed
        } else if e.is_request() {
            TransportErrorKind::Request
        } else if e.is_body() {
            TransportErrorKind::Body
        } else if e.is_decode() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Unknown
        };

        TransportError {
            kind,
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            data: None,
        }
    }
}

/// Something that can perform a request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request. Error statuses are returned as responses, not errors.
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Transport backed by a pooled reqwest client
pub struct ReqwestTransport {
    /// Shared HTTP client with connection pooling
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport
    pub fn new(max_connections: usize, connect_timeout: u64, request_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            "Sending HTTP request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = TransportError::from(e);
            tracing::warn!(
                error_kind = %err.kind,
                error = %err.message,
                url = %request.url,
                "HTTP request error"
            );
            err
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let bytes = response.bytes().await.map_err(TransportError::from)?;

        tracing::debug!(status = status, url = %url, "Received HTTP response");

        Ok(HttpResponse {
            status,
            data: decode_body(&bytes, request.response_type, &headers),
            headers,
            url,
        })
    }
}

/// Decode a response body according to the requested type
fn decode_body(bytes: &[u8], response_type: ResponseType, headers: &HeaderMap) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }

    let text = String::from_utf8_lossy(bytes);
    match response_type {
        ResponseType::Text => Value::String(text.into_owned()),
        ResponseType::Json => match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => value,
            Err(e) => {
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if content_type.contains("json") {
                    tracing::warn!(error = %e, "Response declared JSON but could not be parsed");
                }
                Value::String(text.into_owned())
            }
        },
    }
}
