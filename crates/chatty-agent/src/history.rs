//! Conversation history normalization.
//!
//! Chat front ends hand over their history as a list of `(user, assistant)`
//! pairs in which either side may be missing.  [`normalize`] turns that list,
//! the system directive and the new prompt into the role-tagged message
//! sequence a chat-completion request expects.

use serde::{Deserialize, Serialize};

use crate::llm::types::Message;

/// One prior exchange: the user's text and the assistant's reply.
///
/// Serializes as a two-element array (`["hi", "hello!"]`, `[null, "..."]`),
/// which is the shape chat widgets usually keep their history in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn(pub Option<String>, pub Option<String>);

impl Turn {
    /// A complete exchange with both sides present.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self(Some(user.into()), Some(assistant.into()))
    }

    /// The user side, if present and non-empty.
    pub fn user_text(&self) -> Option<&str> {
        non_empty(self.0.as_deref())
    }

    /// The assistant side, if present and non-empty.
    pub fn assistant_text(&self) -> Option<&str> {
        non_empty(self.1.as_deref())
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

/// Build the ordered message list for one request.
///
/// The result always starts with a single system message (even when
/// `system_message` is empty) and always ends with a user message carrying
/// `prompt`.  Each turn contributes zero, one or two messages depending on
/// which of its sides are non-empty.
pub fn normalize(system_message: &str, history: &[Turn], prompt: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(Message::system(system_message));

    for turn in history {
        if let Some(user) = turn.user_text() {
            messages.push(Message::user(user));
        }
        if let Some(assistant) = turn.assistant_text() {
            messages.push(Message::assistant(assistant));
        }
    }

    messages.push(Message::user(prompt));
    messages
}
