// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identifiers and enums used across the Tally workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a chat (one conversation transcript in the host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

/// Identifier of the language model used for a generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

/// Identifier of the request source (provider backend) used for a generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub String);

macro_rules! impl_id_display {
    ($($ty:ty),*) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl $ty {
                /// Returns the identifier as a string slice.
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $ty {
                fn from(s: &str) -> Self {
                    Self(s.to_string())
                }
            }
        )*
    };
}

impl_id_display!(ChatId, ModelId, SourceId);

/// The kind of generation the host started.
///
/// `Continue` extends an existing response; only the newly produced suffix
/// is counted. `Quiet` is a background call not surfaced as a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Normal,
    Continue,
    Swipe,
    Regenerate,
    Quiet,
    Impersonate,
}

/// Subtype of a message-received event.
///
/// `UserEdit` and `CommandOutput` do not correspond to a real model call
/// and must not produce a usage record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageEventKind {
    Generated,
    Continued,
    Swiped,
    Regenerated,
    UserEdit,
    CommandOutput,
}

impl MessageEventKind {
    /// Whether this event subtype represents output from a real model call.
    pub fn is_model_output(self) -> bool {
        !matches!(self, Self::UserEdit | Self::CommandOutput)
    }
}

/// Strategy used when merging an imported snapshot into the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Add incoming counters onto existing buckets. Re-importing the same
    /// export file doubles all counts; this matches the original behavior.
    #[default]
    Add,
    /// Replace existing buckets with incoming ones on key conflict.
    Replace,
}

/// Freshness of the remote price catalog cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogHealth {
    /// Cache was fetched within the freshness threshold.
    Fresh,
    /// Cache exists but is older than the freshness threshold, or the last
    /// refresh attempt failed. Carries a human-readable reason.
    Stale(String),
    /// Catalog has never been fetched.
    Empty,
}
