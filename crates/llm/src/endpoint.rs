use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use paychat_storage::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub endpoint: String,
    pub api_key: String,
    pub chatbot_id: String,
}

impl EndpointConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        chatbot_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            chatbot_id: chatbot_id.into().trim().to_string(),
        }
    }
}

/// Speaker names understood by the remote chatbot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Assistant,
}

impl From<Role> for WireRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Agent => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<WireRole>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub user_name: String,
}

/// JSON body of one non-streaming chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub chatbot_id: String,
    pub conversation_id: String,
    pub stream: bool,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

impl ChatRequest {
    pub fn new(
        chatbot_id: impl Into<String>,
        conversation_id: impl Into<String>,
        messages: Vec<WireMessage>,
    ) -> Self {
        Self {
            chatbot_id: chatbot_id.into(),
            conversation_id: conversation_id.into(),
            stream: false,
            messages,
            metadata: None,
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.metadata = Some(RequestMetadata {
            user_name: user_name.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ChatResponse {
    pub text: String,
}

pub type EndpointResult<T> = Result<T, EndpointError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EndpointError {
    #[snafu(display("missing API key for chatbot endpoint '{endpoint}'"))]
    MissingApiKey {
        stage: &'static str,
        endpoint: String,
    },
    #[snafu(display("missing chatbot id for chatbot endpoint '{endpoint}'"))]
    MissingChatbotId {
        stage: &'static str,
        endpoint: String,
    },
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("http transport failed on `{stage}`, {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chatbot endpoint returned status {status} ({reason}): {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        reason: String,
        body: String,
    },
    #[snafu(display("failed to decode chatbot response on `{stage}`, {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: serde_json::Error,
    },
}

/// Remote request/response chatbot.
pub trait ChatbotEndpoint: Send + Sync {
    fn id(&self) -> &str;
    fn chatbot_id(&self) -> &str;
    /// Performs exactly one call and yields the reply text.
    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, EndpointResult<String>>;
}
