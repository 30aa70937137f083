use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type SessionId = uuid::Uuid;

// ===== CONVERSATION MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when flattening turns into prompt text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLanguage {
    Vietnamese,
    English,
}

impl ResponseLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vietnamese => "Vietnamese",
            Self::English => "English",
        }
    }
}

impl fmt::Display for ResponseLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session generation preferences. Only read when a request is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfiguration {
    pub temperature: f32,
    pub model: String,
    pub language: ResponseLanguage,
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub language: Option<ResponseLanguage>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub config: SessionConfiguration,
    pub turns: Vec<Turn>,
    /// Greeting shown while no turn is visible yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PersonaInfo {
    pub assistant_name: String,
    pub title: String,
    pub icon: String,
    pub about: String,
    pub disclaimers: Vec<String>,
    pub input_placeholder: String,
    pub footer: String,
    pub user_display_name: String,
    pub models: Vec<String>,
    pub languages: Vec<ResponseLanguage>,
    pub defaults: SessionConfiguration,
}

// ===== STREAM EVENT MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The request could not be issued or failed before any content.
    Setup,
    /// The request succeeded but produced no text.
    EmptyResult,
    /// The fragment sequence broke off after it started.
    Interrupted,
}

/// One update of a submission, sent to the client as an SSE event named after `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamUpdate {
    Thinking { message: String },
    Frame { content: String },
    Completed { content: String },
    Failed { reason: FailureReason, message: String },
}

impl StreamUpdate {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Frame { .. } => "frame",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
