// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single in-flight generation context.
//!
//! Exactly one context is live at a time. Ownership is exclusive: lifecycle
//! handlers `take()` it out of the tracker on terminal events, and a new
//! generation start abandons any unfinished predecessor by aborting its
//! counting tasks. An abandoned context can never retroactively record.

use tally_core::{ChatId, GenerationKind, ModelId, SourceId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Token count of the response being extended by a `continue` generation,
/// captured before the continuation starts.
#[derive(Debug, Default)]
pub(crate) enum Baseline {
    /// Not a continue, or nothing to extend.
    #[default]
    None,
    /// The transcript already knew the count.
    Known(u64),
    /// A best-effort async measurement still in flight. The finalize path
    /// awaits this handle; completion order against the prompt count is not
    /// guaranteed.
    Pending(JoinHandle<u64>),
}

impl Baseline {
    /// Await the baseline, whichever way it was captured.
    pub(crate) async fn resolve(self) -> u64 {
        match self {
            Baseline::None => 0,
            Baseline::Known(count) => count,
            Baseline::Pending(handle) => match handle.await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "baseline measurement lost, treating as zero");
                    0
                }
            },
        }
    }

    fn abort(&self) {
        if let Baseline::Pending(handle) = self {
            handle.abort();
        }
    }
}

/// Mutable record of the exchange currently awaiting completion.
#[derive(Debug)]
pub(crate) struct GenerationContext {
    pub kind: GenerationKind,
    /// Chat the generation started under; a context never survives a chat
    /// switch, so this stays valid for its whole lifetime.
    pub chat: Option<ChatId>,
    pub model: Option<ModelId>,
    pub source: Option<SourceId>,
    /// In-flight full-prompt token count.
    pub input_task: Option<JoinHandle<u64>>,
    pub baseline: Baseline,
}

impl GenerationContext {
    pub(crate) fn new(kind: GenerationKind, chat: Option<ChatId>) -> Self {
        Self {
            kind,
            chat,
            model: None,
            source: None,
            input_task: None,
            baseline: Baseline::None,
        }
    }

    /// Discard this context, aborting any counting task still in flight so
    /// its result can never be double-counted later.
    pub(crate) fn abandon(self) {
        if let Some(handle) = &self.input_task {
            handle.abort();
        }
        self.baseline.abort();
        debug!(kind = %self.kind, "generation context abandoned");
    }

    /// Await the in-flight prompt count. Missing or aborted tasks count as
    /// zero so a partially observed exchange is undercounted, never dropped
    /// with an error.
    pub(crate) async fn resolve_input(input_task: Option<JoinHandle<u64>>) -> u64 {
        match input_task {
            None => 0,
            Some(handle) => match handle.await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "prompt count lost, treating as zero");
                    0
                }
            },
        }
    }
}
