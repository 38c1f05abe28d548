//! Chat message model shared by the chat service and the game state's
//! bounded `chat_log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::principal::SYSTEM_USER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Party,
    Dm,
    Private,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    pub content: String,
    pub channel: ChannelKind,
    /// Present only for `private`, and for `system` with targeted delivery.
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether `user_id` may see this message in history.
    ///
    /// `private` messages are visible only to the author and the listed
    /// recipients; targeted `system` messages likewise. Everything else is
    /// room-visible.
    pub fn visible_to(&self, user_id: &str) -> bool {
        match self.channel {
            ChannelKind::Party | ChannelKind::Dm => true,
            ChannelKind::Private | ChannelKind::System => match &self.recipients {
                Some(recipients) => {
                    self.user_id == user_id || recipients.iter().any(|r| r == user_id)
                }
                None => true,
            },
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_USER
    }
}
