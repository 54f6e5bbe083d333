use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One appended chat message. Agent content may carry Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Creates a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Utc::now())
    }

    /// Creates an agent message stamped with the current time.
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content, Utc::now())
    }

    /// Content normalized for display. Stored content is left verbatim.
    pub fn display_content(&self) -> &str {
        self.content.trim()
    }
}
