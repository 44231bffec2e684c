use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::extract::{DecodedResponse, decode_response, extract_customer_email};
use crate::models::{ChatRequest, ProductRecord};
use crate::session::{ChatMessage, MessageMetadata};
use crate::transport::{ChatTransport, HttpChatTransport, TransportError, cloud_session_id};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("assistant backend error: {0}")]
    Backend(String),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub narrative: String,
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

enum ExchangeKind {
    Text,
    Image,
}

impl ExchangeKind {
    fn fallback(&self) -> &'static str {
        match self {
            Self::Text => "I received your message but couldn't process it properly.",
            Self::Image => "I received your image but couldn't process it properly.",
        }
    }

    fn apology(&self, error: &str) -> String {
        match self {
            Self::Text => {
                format!("I apologize, but I encountered an error: {error}. Please try again.")
            }
            Self::Image => format!(
                "I apologize, but I encountered an error analyzing your image: {error}. \
                 Please try again with a different image."
            ),
        }
    }
}

pub struct AssistantClient {
    transport: Box<dyn ChatTransport>,
    cloud_function: bool,
    state: ConnectionState,
    session_id: Option<String>,
    last_error: Option<String>,
    messages: Vec<ChatMessage>,
    cancel: CancellationToken,
}

impl AssistantClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_transport(
            Box::new(HttpChatTransport::new(config)),
            config.is_cloud_function(),
        )
    }

    pub fn with_transport(transport: Box<dyn ChatTransport>, cloud_function: bool) -> Self {
        Self {
            transport,
            cloud_function,
            state: ConnectionState::Disconnected,
            session_id: None,
            last_error: None,
            messages: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    // Tie this to the owning scope's lifetime; cancelling it discards any
    // in-flight exchange instead of merging a stale response.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // Single attempt, no retry; a failure leaves the client disconnected with
    // the error text in state.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.state = ConnectionState::Connecting;
        self.last_error = None;
        match self.establish_session().await {
            Ok(session_id) => {
                info!(%session_id, "connection established");
                self.session_id = Some(session_id);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "connection failed");
                self.last_error = Some(e.to_string());
                self.session_id = None;
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn establish_session(&self) -> Result<String, ClientError> {
        self.transport.health_check().await?;
        if self.cloud_function {
            // cloud functions have no session handshake
            return Ok(cloud_session_id());
        }
        Ok(self.transport.initialize_session().await?)
    }

    pub async fn ensure_connected(&mut self) -> Result<(), ClientError> {
        match self.state {
            ConnectionState::Disconnected => self.connect().await,
            _ => Ok(()),
        }
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.session_id = None;
    }

    pub async fn send_chat_message(&mut self, text: &str) -> Result<SendOutcome, ClientError> {
        let customer_email = extract_customer_email(text);
        self.messages.push(ChatMessage::user(text));
        let request_id = Uuid::new_v4();
        self.messages
            .push(ChatMessage::pending_assistant(request_id, None));

        let request = ChatRequest {
            message: text.to_string(),
            customer_email: customer_email.clone(),
            session_id: self.session_id.clone(),
            ..Default::default()
        };
        self.exchange(request_id, request, customer_email, ExchangeKind::Text)
            .await
    }

    // Images always go through the HTTP chat endpoint, connected or not.
    pub async fn send_image_message(
        &mut self,
        image: &ImageAttachment,
        prompt: Option<&str>,
    ) -> Result<SendOutcome, ClientError> {
        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());
        let user_content = match prompt {
            Some(p) => format!("[Image: {}] {}", image.name, p),
            None => format!("[Image: {}]", image.name),
        };
        self.messages.push(ChatMessage::user(user_content));
        let request_id = Uuid::new_v4();
        self.messages.push(ChatMessage::pending_assistant(
            request_id,
            Some("Analyzing image...".into()),
        ));

        let request = ChatRequest {
            message: prompt
                .map(str::to_string)
                .unwrap_or_else(|| format!("Analyze this image: {}", image.name)),
            session_id: self.session_id.clone(),
            image_data: Some(BASE64_STANDARD.encode(&image.data)),
            image_type: Some(image.media_type.clone()),
            image_name: Some(image.name.clone()),
            ..Default::default()
        };
        self.exchange(request_id, request, None, ExchangeKind::Image)
            .await
    }

    async fn exchange(
        &mut self,
        request_id: Uuid,
        request: ChatRequest,
        customer_email: Option<String>,
        kind: ExchangeKind,
    ) -> Result<SendOutcome, ClientError> {
        let cancel = self.cancel.clone();
        let outcome = {
            let fut = self.transport.send_chat(&request);
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = fut => Some(result),
            }
        };
        let Some(result) = outcome else {
            self.messages.retain(|m| m.id != request_id);
            return Err(ClientError::Cancelled);
        };

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                let e = ClientError::from(e);
                self.resolve_placeholder(request_id, kind.apology(&e.to_string()), None);
                return Err(e);
            }
        };

        match decode_response(&body) {
            DecodedResponse::Reply(reply) => {
                let narrative = reply
                    .narrative
                    .unwrap_or_else(|| kind.fallback().to_string());
                let metadata = MessageMetadata {
                    tool_calls: reply.tool_call_names,
                    confidence: reply.confidence,
                    session_id: reply.session_id,
                    context_size: reply.tool_call_count,
                    customer_email,
                    workflow_completed: reply.workflow_completed,
                    products: reply.products.clone(),
                };
                self.resolve_placeholder(request_id, narrative.clone(), Some(metadata));
                Ok(SendOutcome {
                    narrative,
                    products: reply.products,
                })
            }
            DecodedResponse::Failure(error) => {
                self.resolve_placeholder(request_id, kind.apology(&error), None);
                Err(ClientError::Backend(error))
            }
        }
    }

    fn resolve_placeholder(
        &mut self,
        request_id: Uuid,
        content: String,
        metadata: Option<MessageMetadata>,
    ) {
        if let Some(msg) = self
            .messages
            .iter_mut()
            .find(|m| m.id == request_id && m.pending)
        {
            msg.content = Some(content);
            msg.metadata = metadata;
            msg.pending = false;
            msg.created_at = Utc::now();
        }
    }
}
