use std::sync::Arc;

use snafu::{ResultExt, ensure};

use super::error::{InvalidDisplayNameSnafu, SerializeHistorySnafu, StorageResult};
use super::ids::ConversationId;
use super::kv::KeyValueStore;
use super::types::Message;

pub const CONVERSATION_ID_KEY: &str = "paychat.conversation_id";
pub const MESSAGES_KEY: &str = "paychat.messages";
pub const DISPLAY_NAME_KEY: &str = "paychat.display_name";

/// Persisted conversation: id, ordered message log and the user's display name.
///
/// Everything lives in the injected [`KeyValueStore`]; there is no server-side copy.
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the persisted conversation id, minting and persisting one if absent.
    pub fn get_id(&self) -> StorageResult<ConversationId> {
        if let Some(raw) = self.store.get(CONVERSATION_ID_KEY)? {
            match ConversationId::parse(&raw) {
                Ok(id) => return Ok(id),
                Err(error) => {
                    tracing::warn!(error = %error, "stored conversation id is malformed; minting a new one");
                }
            }
        }

        let id = ConversationId::new_v7();
        self.store.set(CONVERSATION_ID_KEY, &id.to_string())?;
        tracing::info!(conversation_id = %id, "started new conversation");
        Ok(id)
    }

    /// Returns the persisted log. Missing, unreadable or malformed data yields an empty log.
    pub fn load_history(&self) -> Vec<Message> {
        let raw = match self.store.get(MESSAGES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read message history; starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(error = %error, "stored message history is malformed; starting empty");
                Vec::new()
            }
        }
    }

    /// Replaces the persisted log with `messages`, preserving order.
    pub fn save_history(&self, messages: &[Message]) -> StorageResult<()> {
        let serialized = serde_json::to_string(messages).context(SerializeHistorySnafu {
            stage: "serialize-message-history",
        })?;
        self.store.set(MESSAGES_KEY, &serialized)
    }

    /// Forgets the conversation id and log. The display name is kept.
    pub fn reset(&self) -> StorageResult<()> {
        self.store.remove(MESSAGES_KEY)?;
        self.store.remove(CONVERSATION_ID_KEY)?;
        tracing::info!("conversation reset");
        Ok(())
    }

    pub fn get_display_name(&self) -> Option<String> {
        match self.store.get(DISPLAY_NAME_KEY) {
            Ok(name) => name.filter(|name| !name.trim().is_empty()),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read display name");
                None
            }
        }
    }

    pub fn set_display_name(&self, name: &str) -> StorageResult<String> {
        let name = name.trim();
        ensure!(
            !name.is_empty(),
            InvalidDisplayNameSnafu {
                stage: "set-display-name",
            }
        );

        self.store.set(DISPLAY_NAME_KEY, name)?;
        Ok(name.to_string())
    }

    pub fn clear_display_name(&self) -> StorageResult<()> {
        self.store.remove(DISPLAY_NAME_KEY)
    }
}
