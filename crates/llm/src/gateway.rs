use std::sync::Arc;

use paychat_storage::{ConversationId, Message, Role};

use super::endpoint::{ChatRequest, ChatbotEndpoint, EndpointError, WireMessage};
use super::notice::{Notice, Notifier};

/// Outcome of one gateway call. Failures carry a locally generated explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Failure(String),
}

impl Reply {
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Failure(text) => text,
        }
    }
}

/// Boundary between local messages and the remote chatbot wire format.
///
/// Never fails to its caller: endpoint errors become [`Reply::Failure`] plus one notice.
#[derive(Clone)]
pub struct MessageGateway {
    endpoint: Arc<dyn ChatbotEndpoint>,
    notifier: Arc<dyn Notifier>,
}

impl MessageGateway {
    pub fn new(endpoint: Arc<dyn ChatbotEndpoint>, notifier: Arc<dyn Notifier>) -> Self {
        Self { endpoint, notifier }
    }

    /// Maps prior history plus the new utterance into the endpoint request.
    pub fn build_request(
        &self,
        utterance: &str,
        history: &[Message],
        conversation_id: ConversationId,
        display_name: Option<&str>,
    ) -> ChatRequest {
        let mut messages = history
            .iter()
            .map(|message| WireMessage::new(message.role, message.content.clone()))
            .collect::<Vec<_>>();
        messages.push(WireMessage::new(Role::User, utterance));

        let request = ChatRequest::new(
            self.endpoint.chatbot_id(),
            conversation_id.to_string(),
            messages,
        );

        match display_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => request.with_user_name(name),
            None => request,
        }
    }

    pub async fn send(
        &self,
        utterance: &str,
        history: &[Message],
        conversation_id: ConversationId,
        display_name: Option<&str>,
    ) -> Reply {
        let request = self.build_request(utterance, history, conversation_id, display_name);
        tracing::debug!(
            endpoint_id = %self.endpoint.id(),
            conversation_id = %conversation_id,
            message_count = request.messages.len(),
            "sending chat request"
        );

        match self.endpoint.complete(request).await {
            Ok(text) => Reply::Answer(text),
            Err(error) => self.translate_failure(conversation_id, error),
        }
    }

    fn translate_failure(&self, conversation_id: ConversationId, error: EndpointError) -> Reply {
        tracing::error!(
            endpoint_id = %self.endpoint.id(),
            conversation_id = %conversation_id,
            error = %error,
            "chat request failed"
        );

        let (notice, text) = match &error {
            EndpointError::Status { reason, .. } => (Notice::send_failed(), format!("שגיאה: {reason}")),
            other => (
                Notice::connection_failed(),
                format!("שגיאה במהלך התקשורת: {other}"),
            ),
        };

        self.notifier.notify(notice);
        Reply::Failure(text)
    }
}
