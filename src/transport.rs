use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;
use crate::models::{ChatRequest, InitializeRequest};

const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    HealthCheck(u16),
    #[error("session initialization failed: HTTP {0}")]
    Initialize(u16),
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn health_check(&self) -> Result<(), TransportError>;
    async fn initialize_session(&self) -> Result<String, TransportError>;
    async fn send_chat(&self, request: &ChatRequest) -> Result<Value, TransportError>;
}

pub struct HttpChatTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatTransport {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn health_check(&self) -> Result<(), TransportError> {
        let resp = self.client.get(format!("{}/health", self.base_url)).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::HealthCheck(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn initialize_session(&self) -> Result<String, TransportError> {
        let resp = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .header("Accept", "application/json, text/event-stream")
            .json(&InitializeRequest::new())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TransportError::Initialize(resp.status().as_u16()));
        }
        // header lookup is case-insensitive, covering both observed spellings
        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(synthesize_session_id);
        debug!(%session_id, "session initialized");
        Ok(session_id)
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<Value, TransportError> {
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), detail });
        }
        Ok(resp.json().await?)
    }
}

fn synthesize_session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}

pub fn cloud_session_id() -> String {
    format!("assistant_bot_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ids_carry_timestamp_and_suffix() {
        let id = synthesize_session_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);

        assert!(cloud_session_id().starts_with("assistant_bot_"));
    }
}
