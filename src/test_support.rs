// Shared helpers for unit tests

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

use crate::http_client::{HttpResponse, RequestDescriptor, Transport, TransportError};
use crate::navigation::{Notification, Notifier};

/// Unsigned JWT with the given `exp` claim
pub fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "42", "exp": exp }).to_string());
    format!("{}.{}.sig", header, payload)
}

/// JWT valid for another hour
pub fn fresh_jwt() -> String {
    jwt(chrono::Utc::now().timestamp() + 3600)
}

/// JWT that expired ten seconds ago
pub fn stale_jwt() -> String {
    jwt(chrono::Utc::now().timestamp() - 10)
}

pub fn response(status: u16, data: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        data,
        url: String::new(),
    }
}

type Handler =
    Box<dyn Fn(&RequestDescriptor, usize) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Transport answering through a closure; the closure also gets the number of
/// earlier requests to the same URL
pub struct ScriptedTransport {
    handler: Handler,
    seen: Mutex<Vec<RequestDescriptor>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&RequestDescriptor, usize) -> Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Hold every response for `latency` instead of a single yield
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.seen.lock().unwrap().clone()
    }

    /// Requests whose URL ends with `path`
    pub fn requests_to(&self, path: &str) -> Vec<RequestDescriptor> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let previous = {
            let mut seen = self.seen.lock().unwrap();
            let previous = seen.iter().filter(|r| r.url == request.url).count();
            seen.push(request.clone());
            previous
        };
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        (self.handler)(request, previous)
    }
}

/// Notifier that keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
