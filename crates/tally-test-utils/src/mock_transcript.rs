// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory mock of the host chat transcript.

use std::sync::Mutex;

use async_trait::async_trait;
use tally_core::{ChatId, TallyError, TranscriptAccessor, TranscriptMessage};

#[derive(Default)]
struct Inner {
    chat: Option<ChatId>,
    messages: Vec<TranscriptMessage>,
    streaming: Option<String>,
}

/// Scriptable transcript: push messages, switch chats, set the streaming
/// buffer.
#[derive(Default)]
pub struct MockTranscript {
    inner: Mutex<Inner>,
}

impl MockTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a chat (replacing the message list).
    pub fn open_chat(&self, chat: ChatId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.chat = Some(chat);
        inner.messages.clear();
        inner.streaming = None;
    }

    /// Append a message and return its index.
    pub fn push_message(&self, message: TranscriptMessage) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.messages.push(message);
        inner.messages.len() - 1
    }

    /// Replace the message at `index`.
    pub fn set_message(&self, index: usize, message: TranscriptMessage) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.messages[index] = message;
    }

    /// Set or clear the partial streaming buffer.
    pub fn set_streaming(&self, text: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.streaming = text.map(str::to_string);
    }
}

#[async_trait]
impl TranscriptAccessor for MockTranscript {
    fn active_chat(&self) -> Option<ChatId> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .chat
            .clone()
    }

    async fn message_at(&self, index: usize) -> Result<Option<TranscriptMessage>, TallyError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .get(index)
            .cloned())
    }

    async fn last_message(&self) -> Result<Option<TranscriptMessage>, TallyError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .last()
            .cloned())
    }

    fn streaming_text(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .streaming
            .clone()
    }
}
