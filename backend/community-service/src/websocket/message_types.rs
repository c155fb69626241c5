use serde::{Deserialize, Serialize};

use crate::models::room::Message;

/// Chat frame exchanged in both directions: `{"message": ..., "user": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub message: String,
    pub user: String,
}

impl ChatFrame {
    /// Parse an inbound text frame; blank messages are refused
    pub fn parse(text: &str) -> Result<Self, String> {
        let frame: ChatFrame =
            serde_json::from_str(text).map_err(|e| format!("malformed frame: {}", e))?;
        if frame.message.trim().is_empty() {
            return Err("empty message".to_string());
        }
        Ok(frame)
    }
}

/// Outbound frame for a stored message, attributed to its author
impl From<&Message> for ChatFrame {
    fn from(stored: &Message) -> Self {
        Self {
            message: stored.content.clone(),
            user: stored.username.clone(),
        }
    }
}
