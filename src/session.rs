use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::events::{ConversationRole, Message};

/// Whether a session remembers earlier exchanges
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MemoryPolicy {
    /// Every submission starts from the seed; only the latest exchange is kept
    #[default]
    SingleTurn,
    /// Exchanges accumulate and are all sent with the next request
    MultiTurn,
}

/// Message history for one interactive run.
///
/// Owned by whoever is handling the current turn; handed to the turn
/// handler by value and returned with the result.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    policy: MemoryPolicy,
    seed: Option<Message>,
    messages: Vec<Message>,
}

impl Session {
    /// Create a session. With a seed, the session always starts with that
    /// system message.
    pub fn new(policy: MemoryPolicy, seed: Option<String>) -> Self {
        let seed = seed.map(Message::system);
        let messages = seed.iter().cloned().collect();
        Self {
            id: Uuid::new_v4(),
            policy,
            seed,
            messages,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: MemoryPolicy) {
        self.policy = policy;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything but the seed
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.extend(self.seed.iter().cloned());
    }

    /// Start a new exchange with the user's text
    pub fn begin_turn(&mut self, user_text: impl Into<String>) {
        if self.policy == MemoryPolicy::SingleTurn {
            self.reset();
        }
        self.messages.push(Message::user(user_text));
    }

    /// Store the model's answer to the current exchange
    pub fn record_reply(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// The last user message has no answer after it
    pub fn awaiting_reply(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.role == ConversationRole::User)
    }

    /// Messages to send to the model. The system instruction is prepended
    /// unless the session already starts with a system message.
    pub fn request_messages(&self, system_prompt: &str) -> Vec<Message> {
        let has_system = self
            .messages
            .first()
            .is_some_and(|m| m.role == ConversationRole::System);

        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !has_system {
            out.push(Message::system(system_prompt));
        }
        // A reply that never arrived leaves a dangling user message behind;
        // only the newest user message is sent without its answer.
        let last = self.messages.len().saturating_sub(1);
        for (i, message) in self.messages.iter().enumerate() {
            let unanswered = message.role == ConversationRole::User
                && i < last
                && self.messages[i + 1].role == ConversationRole::User;
            if !unanswered {
                out.push(message.clone());
            }
        }
        out
    }
}
