pub mod conversation;
pub mod error;
pub mod ids;
pub mod kv;
pub mod types;

pub use conversation::ConversationStore;
pub use error::{StorageError, StorageResult};
pub use ids::ConversationId;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::{Message, Role};
