use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ProductRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageMetadata {
    pub tool_calls: Vec<String>,
    pub confidence: Option<f64>,
    pub session_id: Option<String>,
    pub context_size: usize,
    pub customer_email: Option<String>,
    pub workflow_completed: Option<bool>,
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pending: bool,
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: Some(content.into()),
            created_at: Utc::now(),
            pending: false,
            metadata: None,
        }
    }

    // The placeholder's id doubles as the request correlation id; its
    // replacement is matched by this id, never by the pending flag.
    pub fn pending_assistant(id: Uuid, content: Option<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content,
            created_at: Utc::now(),
            pending: true,
            metadata: None,
        }
    }
}
