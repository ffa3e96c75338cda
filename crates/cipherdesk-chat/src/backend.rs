//! Query collaborators: the trait the session talks to and its HTTP client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use cipherdesk_core::config::ServerConfig;
use cipherdesk_core::error::{CipherError, Result};

use crate::wire::{
    ChatRequest, ChatResponse, HealthStatus, RawQueryRequest, RawQueryResponse,
};

/// The server side of a session.
///
/// `Err` means the exchange itself failed. Errors the server reports about the
/// query come back inside `Ok` responses.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn converse(&self, message: &str) -> Result<ChatResponse>;

    async fn raw_query(&self, query: &str) -> Result<RawQueryResponse>;

    async fn health(&self) -> Result<HealthStatus>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Backend speaking JSON over HTTP to the query server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    chat_url: String,
    raw_query_url: String,
    raw_query_field: String,
    health_url: String,
}

impl HttpBackend {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .build()
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, server))
    }

    pub fn with_client(client: reqwest::Client, server: &ServerConfig) -> Self {
        Self {
            client,
            chat_url: server.endpoint(&server.chat_path),
            raw_query_url: server.endpoint(&server.raw_query_path),
            raw_query_field: server.raw_query_field.clone(),
            health_url: server.endpoint(&server.health_path),
        }
    }

    /// POST `body` and decode the reply.
    ///
    /// A non-2xx reply is accepted only when `reports_error` says the decoded
    /// body carries the server's own error text.
    async fn post<B, R>(&self, url: &str, body: &B, reports_error: fn(&R) -> bool) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        debug!(url, status = status.as_u16(), bytes = text.len(), "Query server replied");

        match serde_json::from_str::<R>(&text) {
            Ok(parsed) if status.is_success() || reports_error(&parsed) => Ok(parsed),
            Ok(_) => {
                warn!(url, status = %status, "Query server failed without an error body");
                Err(CipherError::Transport(format!(
                    "Query server returned HTTP {}",
                    status
                )))
            }
            Err(e) if status.is_success() => Err(CipherError::Serialization(e.to_string())),
            Err(_) => Err(CipherError::Transport(format!(
                "Query server returned HTTP {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn converse(&self, message: &str) -> Result<ChatResponse> {
        let request = ChatRequest {
            message: message.to_string(),
        };
        self.post(&self.chat_url, &request, |r: &ChatResponse| {
            r.upstream_error().is_some()
        })
        .await
    }

    async fn raw_query(&self, query: &str) -> Result<RawQueryResponse> {
        let request = RawQueryRequest::new(self.raw_query_field.as_str(), query);
        self.post(&self.raw_query_url, &request, |r: &RawQueryResponse| {
            r.error.as_ref().is_some_and(|e| !e.is_empty())
        })
        .await
    }

    async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        // The server answers 500 with a body when the database is down.
        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| CipherError::Serialization(e.to_string()))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted backend that records every request it receives.
#[derive(Debug, Default)]
pub struct MockBackend {
    chat: Mutex<Option<std::result::Result<ChatResponse, String>>>,
    raw: Mutex<Option<std::result::Result<RawQueryResponse, String>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(self, response: ChatResponse) -> Self {
        self.set(&self.chat, Ok(response));
        self
    }

    pub fn with_raw(self, response: RawQueryResponse) -> Self {
        self.set(&self.raw, Ok(response));
        self
    }

    /// Every request fails at the transport level.
    pub fn unreachable(self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.set(&self.chat, Err(reason.clone()));
        self.set(&self.raw, Err(reason));
        self
    }

    /// Hold each reply for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn set<T>(&self, slot: &Mutex<Option<T>>, value: T) {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(value);
        }
    }

    async fn record(&self, request: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn reply<T: Clone + Default>(
        slot: &Mutex<Option<std::result::Result<T, String>>>,
    ) -> Result<T> {
        let scripted = slot.lock().ok().and_then(|s| s.clone());
        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(CipherError::Transport(reason)),
            None => Ok(T::default()),
        }
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn converse(&self, message: &str) -> Result<ChatResponse> {
        self.record(message).await;
        Self::reply(&self.chat)
    }

    async fn raw_query(&self, query: &str) -> Result<RawQueryResponse> {
        self.record(query).await;
        Self::reply(&self.raw)
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            database_connected: true,
            database_error: None,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_requests() {
        let backend = MockBackend::new().with_chat(ChatResponse {
            response: Some("hi".into()),
            ..ChatResponse::default()
        });
        let reply = backend.converse("hello").await.unwrap();
        assert_eq!(reply.response.as_deref(), Some("hi"));
        backend.raw_query("SELECT 1").await.unwrap();
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.requests(), vec!["hello", "SELECT 1"]);
    }

    #[tokio::test]
    async fn test_mock_unreachable() {
        let backend = MockBackend::new().unreachable("connection refused");
        let err = backend.converse("hello").await.unwrap_err();
        assert!(matches!(err, CipherError::Transport(ref m) if m == "connection refused"));
        assert!(backend.raw_query("SELECT 1").await.is_err());
    }
}
