// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generation-lifecycle state machine.
//!
//! Maps the host's lifecycle events, each carrying partial information, onto
//! at most one [`UsageStore::record`] call per logical exchange:
//! `Idle -> AwaitingCompletion -> {Recorded | Abandoned}`.
//!
//! Events fire in host order, but the counting tasks they start complete in
//! no particular order; finalization therefore awaits every task it depends
//! on (prompt count and continue baseline) before recording. Handlers are
//! infallible at the boundary: internal failures are logged and the
//! coordination state is cleared rather than left to double-count or wedge.

use std::sync::Arc;

use tally_core::counting::count_with_fallback;
use tally_core::{
    ActiveProvider, GenerationKind, MessageEventKind, TokenCounter, TranscriptAccessor,
    TranscriptMessage,
};
use tally_store::{UsageRecord, UsageStore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::context::{Baseline, GenerationContext};

/// Observable phase of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// No exchange in flight.
    Idle,
    /// A generation has started and its counts are being coordinated.
    AwaitingCompletion,
}

impl std::fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerPhase::Idle => write!(f, "idle"),
            TrackerPhase::AwaitingCompletion => write!(f, "awaiting-completion"),
        }
    }
}

/// Correlates overlapping async counting operations into single usage
/// records, exactly once per completed (or flushed) exchange.
pub struct LifecycleTracker {
    pub(crate) store: Arc<UsageStore>,
    pub(crate) counter: Arc<dyn TokenCounter>,
    pub(crate) transcript: Arc<dyn TranscriptAccessor>,
    pub(crate) provider: Arc<dyn ActiveProvider>,
    /// The single-owner coordination state. `None` is `Idle`.
    context: Mutex<Option<GenerationContext>>,
    /// Recursion guard for the background/quiet mini-protocol.
    pub(crate) quiet_flag: Arc<std::sync::atomic::AtomicBool>,
}

impl LifecycleTracker {
    pub fn new(
        store: Arc<UsageStore>,
        counter: Arc<dyn TokenCounter>,
        transcript: Arc<dyn TranscriptAccessor>,
        provider: Arc<dyn ActiveProvider>,
    ) -> Self {
        Self {
            store,
            counter,
            transcript,
            provider,
            context: Mutex::new(None),
            quiet_flag: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Current phase, for observability and tests.
    pub async fn phase(&self) -> TrackerPhase {
        if self.context.lock().await.is_some() {
            TrackerPhase::AwaitingCompletion
        } else {
            TrackerPhase::Idle
        }
    }

    /// `GENERATION_STARTED`: open a fresh context, implicitly abandoning any
    /// unfinished predecessor. Dry runs never open a context.
    ///
    /// For `continue`, the existing response's token count is snapshotted as
    /// the baseline: synchronously when the transcript already knows it,
    /// otherwise as a spawned measurement that finalization will await.
    pub async fn on_generation_started(&self, kind: GenerationKind, dry_run: bool) {
        if dry_run {
            debug!(kind = %kind, "dry-run generation ignored");
            return;
        }

        let mut context = GenerationContext::new(kind, self.transcript.active_chat());
        if kind == GenerationKind::Continue {
            context.baseline = self.capture_continue_baseline().await;
        }

        let mut slot = self.context.lock().await;
        if let Some(previous) = slot.take() {
            warn!(kind = %previous.kind, "new generation started over an unfinished one");
            previous.abandon();
        }
        *slot = Some(context);
        debug!(kind = %kind, "generation context opened");
    }

    /// `GENERATE_AFTER_DATA`: capture model/source synchronously and start
    /// the full-prompt count without waiting for it. Dry runs are ignored
    /// entirely; they are token-estimation calls, not real exchanges.
    pub async fn on_prompt_ready(&self, prompt: &str, dry_run: bool) {
        if dry_run {
            return;
        }

        let mut slot = self.context.lock().await;
        let Some(context) = slot.as_mut() else {
            debug!("prompt data with no generation in flight, ignoring");
            return;
        };

        context.model = Some(self.provider.model_id());
        context.source = Some(self.provider.source_id());

        if let Some(stale) = context.input_task.take() {
            stale.abort();
        }
        let counter = Arc::clone(&self.counter);
        let prompt = prompt.to_string();
        context.input_task = Some(tokio::spawn(async move {
            count_with_fallback(counter.as_ref(), &prompt).await
        }));
    }

    /// `MESSAGE_RECEIVED`: finalize the exchange from the stored message.
    ///
    /// Subtypes that are not real model output, and events with no context
    /// in flight (late or duplicate deliveries), are ignored.
    pub async fn on_message_received(&self, index: usize, kind: MessageEventKind) {
        if !kind.is_model_output() {
            debug!(kind = %kind, index, "non-model message event ignored");
            return;
        }

        let Some(context) = self.context.lock().await.take() else {
            debug!(index, "message received with no generation in flight, ignoring");
            return;
        };

        let message = match self.transcript.message_at(index).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!(index, "received message index not in transcript, abandoning");
                context.abandon();
                return;
            }
            Err(e) => {
                error!(error = %e, index, "transcript read failed, abandoning");
                context.abandon();
                return;
            }
        };

        self.finalize_with_message(context, &message).await;
    }

    /// `GENERATION_STOPPED`: alternate completion path. Whatever partial
    /// output the host streamed is the final output count; the prompt tokens
    /// were consumed regardless and must be recorded, not discarded.
    pub async fn on_generation_stopped(&self) {
        let Some(context) = self.context.lock().await.take() else {
            return;
        };

        let output = match self.transcript.streaming_text() {
            Some(partial) if !partial.is_empty() => {
                count_with_fallback(self.counter.as_ref(), &partial).await
            }
            _ => 0,
        };
        debug!(output, "generation stopped, recording partial exchange");
        self.finalize(context, output, 0).await;
    }

    /// `IMPERSONATE_READY`: finalize with output counted from the supplied
    /// text rather than a stored message.
    pub async fn on_impersonate_ready(&self, text: &str) {
        let Some(context) = self.context.lock().await.take() else {
            debug!("impersonate text with no generation in flight, ignoring");
            return;
        };

        let output = count_with_fallback(self.counter.as_ref(), text).await;
        self.finalize(context, output, 0).await;
    }

    /// `CHAT_CHANGED`: a context must never survive a chat switch.
    ///
    /// Quiet generations get one exception: their input tokens were already
    /// consumed, so an in-flight quiet context is flushed (recorded with
    /// whatever counts are available) instead of silently discarded.
    pub async fn on_chat_changed(&self) {
        let Some(context) = self.context.lock().await.take() else {
            return;
        };

        if context.kind == GenerationKind::Quiet {
            let output = match self.transcript.streaming_text() {
                Some(partial) if !partial.is_empty() => {
                    count_with_fallback(self.counter.as_ref(), &partial).await
                }
                _ => 0,
            };
            info!("flushing in-flight quiet generation before chat switch");
            self.finalize(context, output, 0).await;
        } else {
            warn!(kind = %context.kind, "chat switched mid-generation, abandoning context");
            context.abandon();
        }
    }

    /// Snapshot the token count of the response a `continue` will extend.
    async fn capture_continue_baseline(&self) -> Baseline {
        let message = match self.transcript.last_message().await {
            Ok(Some(message)) => message,
            Ok(None) => return Baseline::None,
            Err(e) => {
                warn!(error = %e, "could not read continue target, baseline unknown");
                return Baseline::None;
            }
        };

        if let Some(count) = message.token_count {
            return Baseline::Known(count);
        }

        let counter = Arc::clone(&self.counter);
        Baseline::Pending(tokio::spawn(async move {
            count_with_fallback(counter.as_ref(), &message.text).await
        }))
    }

    /// Determine output/reasoning counts from a stored message, then record.
    async fn finalize_with_message(&self, context: GenerationContext, message: &TranscriptMessage) {
        let reasoning = match message.reasoning.as_deref() {
            Some(segment) if !segment.is_empty() => {
                count_with_fallback(self.counter.as_ref(), segment).await
            }
            _ => 0,
        };

        let output = match message.token_count {
            // Subtract reasoning from a combined pre-computed count only when
            // the combined count exceeds it.
            Some(count) if message.count_includes_reasoning && count > reasoning => {
                count - reasoning
            }
            Some(count) => count,
            None => count_with_fallback(self.counter.as_ref(), &message.text).await,
        };

        self.finalize(context, output, reasoning).await;
    }

    /// Await every pending counting task, apply the continue delta, and make
    /// the single `record()` call for this exchange.
    async fn finalize(&self, context: GenerationContext, output: u64, reasoning: u64) {
        let GenerationContext {
            kind,
            chat,
            model,
            source,
            input_task,
            baseline,
        } = context;

        let input = GenerationContext::resolve_input(input_task).await;

        let output = if kind == GenerationKind::Continue {
            // Only the newly generated suffix counts, floored at zero.
            output.saturating_sub(baseline.resolve().await)
        } else {
            output
        };

        let mut record = UsageRecord::new(input, output).with_reasoning(reasoning);
        if let Some(chat) = chat {
            record = record.with_chat(chat);
        }
        if let Some(model) = model {
            record = record.with_model(model);
        }
        if let Some(source) = source {
            record = record.with_source(source);
        }

        if let Err(e) = self.store.record(record).await {
            error!(error = %e, kind = %kind, "failed to record exchange");
        } else {
            debug!(kind = %kind, "exchange recorded");
        }
    }
}
