// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accessor trait for the host's chat-message store.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::types::ChatId;

/// A message as seen through the host's transcript, with whatever metadata
/// the host has already computed.
#[derive(Debug, Clone, Default)]
pub struct TranscriptMessage {
    /// Rendered message text.
    pub text: String,
    /// Token count the host already computed for this message, if any.
    pub token_count: Option<u64>,
    /// Reasoning segment attached to the message, if any.
    pub reasoning: Option<String>,
    /// Whether `token_count` already includes the reasoning segment.
    pub count_includes_reasoning: bool,
}

/// Read-only view of the active chat transcript.
#[async_trait]
pub trait TranscriptAccessor: Send + Sync {
    /// Identifier of the currently open chat, if one is open.
    fn active_chat(&self) -> Option<ChatId>;

    /// Message at `index` in the active chat, or `None` when out of range.
    async fn message_at(&self, index: usize) -> Result<Option<TranscriptMessage>, TallyError>;

    /// The most recent message in the active chat.
    async fn last_message(&self) -> Result<Option<TranscriptMessage>, TallyError>;

    /// Partial text of an in-flight streamed response, when the host exposes
    /// a streaming buffer. `None` when nothing is streaming.
    fn streaming_text(&self) -> Option<String>;
}
