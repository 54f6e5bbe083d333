use std::fmt;
use std::str::FromStr;

use snafu::ResultExt;
use uuid::Uuid;

use super::error::{InvalidIdSnafu, StorageError, StorageResult};

/// Opaque identifier of one persisted conversation.
///
/// Minted once per client install and replaced only by an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new(raw: Uuid) -> Self {
        Self(raw)
    }

    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> StorageResult<Self> {
        let parsed = Uuid::parse_str(raw.trim()).context(InvalidIdSnafu {
            stage: "parse-conversation-id",
            id_type: "conversation-id",
            raw: raw.to_string(),
        })?;
        Ok(Self(parsed))
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<Uuid> for ConversationId {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl FromStr for ConversationId {
    type Err = StorageError;

    fn from_str(raw: &str) -> StorageResult<Self> {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_output_parses_back() {
        let id = ConversationId::new_v7();
        let parsed: ConversationId = id.to_string().parse().expect("id should parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn garbage_is_rejected_with_context() {
        let error = ConversationId::parse("not-a-uuid").expect_err("garbage must fail");
        assert!(matches!(
            error,
            StorageError::InvalidId {
                id_type: "conversation-id",
                ..
            }
        ));
    }
}
