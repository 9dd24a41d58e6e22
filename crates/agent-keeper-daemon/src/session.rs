//! Session-data collaborator contract.
//!
//! The transcript store lives outside this subsystem; we only model the
//! slice of a conversation entry the rate-limit path reads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionSourceError;

/// Message content as emitted by the agent: either a bare string or a list
/// of typed blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMessage {
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantEntry {
    #[serde(default)]
    pub is_api_error_message: bool,
    pub message: EntryMessage,
}

/// One transcript entry. Only assistant entries carry anything the monitor
/// inspects; every other entry type collapses to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEntry {
    Assistant(AssistantEntry),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub conversations: Vec<ConversationEntry>,
}

/// Read access to session transcripts. May fail; sessions appear on disk
/// asynchronously, so a not-yet-existing session is an expected condition.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn get_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<SessionData, SessionSourceError>;
}

impl AssistantEntry {
    /// Iterate the textual parts of the message, whatever shape the
    /// content takes.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        let parts: Vec<&str> = match &self.message.content {
            MessageContent::Text(text) => vec![text.as_str()],
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Other => None,
                })
                .collect(),
        };
        parts.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_assistant_with_block_content() {
        let json = r#"{
            "type": "assistant",
            "isApiErrorMessage": true,
            "message": {
                "content": [
                    {"type": "text", "text": "Session limit reached"},
                    {"type": "tool_use", "id": "t1"}
                ]
            }
        }"#;

        let entry: ConversationEntry = serde_json::from_str(json).unwrap();
        let ConversationEntry::Assistant(assistant) = &entry else {
            panic!("expected assistant entry");
        };
        assert!(assistant.is_api_error_message);
        assert_eq!(
            assistant.text_parts().collect::<Vec<_>>(),
            vec!["Session limit reached"]
        );
    }

    #[test]
    fn test_deserialize_assistant_with_string_content() {
        let json = r#"{"type":"assistant","message":{"content":"plain text"}}"#;

        let entry: ConversationEntry = serde_json::from_str(json).unwrap();
        let ConversationEntry::Assistant(assistant) = &entry else {
            panic!("expected assistant entry");
        };
        assert!(!assistant.is_api_error_message);
        assert_eq!(
            assistant.text_parts().collect::<Vec<_>>(),
            vec!["plain text"]
        );
    }

    #[test]
    fn test_non_assistant_entries_collapse_to_other() {
        let entry: ConversationEntry =
            serde_json::from_str(r#"{"type":"user","message":{"content":"hi"}}"#).unwrap();
        assert_eq!(entry, ConversationEntry::Other);

        let entry: ConversationEntry = serde_json::from_str(r#"{"type":"summary"}"#).unwrap();
        assert_eq!(entry, ConversationEntry::Other);
    }
}
