use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

const MAX_PROMPT_CHARS: usize = 100_000;

/// Message role enum for strict validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One prompt/response pair as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Expand into the user/assistant message pair the model sees
    pub fn to_messages(&self) -> [Message; 2] {
        [
            Message::user(self.prompt.clone()),
            Message::assistant(self.response.clone()),
        ]
    }
}

/// Stored form of a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: String,
    pub conversation_id: String,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// New record with a fresh id, stamped now
    pub fn new(
        conversation_id: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            prompt: prompt.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }

    pub fn turn(&self) -> ConversationTurn {
        ConversationTurn {
            prompt: self.prompt.clone(),
            response: self.response.clone(),
            created_at: self.created_at,
        }
    }
}

/// How detection flags are turned into a rationale
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReasonMode {
    /// Rationale of the highest-priority flagged category only
    #[default]
    FirstMatch,
    /// Rationales of every flagged category, in priority order
    AllMatches,
}

/// Language of the rationale texts shown to users
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RationaleLocale {
    #[default]
    En,
    De,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Validate the request and return the prompt text
    pub fn validate(&self) -> Result<&str> {
        let prompt = self
            .prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::BadRequest("Prompt is required in the request body".into()))?;

        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(Error::BadRequest("Prompt too long (max 100k chars)".into()));
        }

        if let Some(id) = &self.conversation_id {
            if id.trim().is_empty() {
                return Err(Error::BadRequest("conversation_id cannot be blank".into()));
            }
        }

        Ok(prompt)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub safety_enabled: bool,
    /// Model the backend generates with
    pub model: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health status enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but without safety scanning
    Degraded,
}
