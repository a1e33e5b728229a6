use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::turn::Turn;

/// Events delivered to the interactive surface from background work
#[derive(Debug)]
pub enum AppEvent {
    /// Text fragment of the reply currently being streamed
    Fragment(String),

    /// The in-flight turn finished; carries the session back
    TurnFinished(Box<Turn>),
}

/// Role of a message in the conversation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// Individual message in a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: ConversationRole,
    pub content: String,
}

impl Message {
    pub fn new(role: ConversationRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ConversationRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ConversationRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ConversationRole::Assistant, content)
    }
}
