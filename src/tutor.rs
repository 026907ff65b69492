//! Ephemeral chat transcript for the tutor
//!
//! The transcript lives in memory only and is never persisted. Each ask
//! passes the full prior history to the chat task explicitly.

use crate::generation::StructuredGenerator;
use crate::models::{ChatMessage, MessageRole};
use crate::Result;

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user turn, ask the tutor, and append the answer on
    /// success. On failure the transcript keeps the user turn and the
    /// caller decides what to show.
    pub async fn ask(&mut self, generator: &StructuredGenerator, query: &str) -> Result<String> {
        let history = self.messages.clone();

        self.messages.push(ChatMessage {
            role: MessageRole::User,
            content: query.to_string(),
        });

        let answer = generator.chat(query, &history).await?;

        self.messages.push(ChatMessage {
            role: MessageRole::Model,
            content: answer.answer.clone(),
        });

        Ok(answer.answer)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
