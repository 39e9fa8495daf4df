// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tally usage meter.

use thiserror::Error;

/// The primary error type used across all Tally crates.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Token counting errors (host tokenizer failure, unavailable counter).
    #[error("counting error: {message}")]
    Counting {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Price catalog errors (fetch failure, malformed catalog payload).
    #[error("catalog error: {message}")]
    Catalog {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An import payload was rejected (malformed JSON, wrong version or identity).
    #[error("import rejected: {0}")]
    Import(String),

    /// Settings persistence errors (blob read/write, serialization).
    #[error("settings storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
