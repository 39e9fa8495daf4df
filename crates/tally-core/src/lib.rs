// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tally usage meter.
//!
//! This crate provides the error type, shared identifiers, the persisted
//! data model, and the host-service traits used throughout the Tally
//! workspace. Everything the meter consumes from its host application goes
//! through a trait defined here.

pub mod counting;
pub mod error;
pub mod model;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TallyError;
pub use model::{
    CatalogCache, MeterSettings, PriceEntry, RawPrice, UsageBucket, UsageTree, APP_NAME,
    SETTINGS_VERSION,
};
pub use types::{
    CatalogHealth, ChatId, GenerationKind, ImportStrategy, MessageEventKind, ModelId, SourceId,
};

// Re-export the host-service traits at crate root.
pub use traits::{ActiveProvider, SettingsStore, TokenCounter, TranscriptAccessor, TranscriptMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_error_has_all_variants() {
        let _config = TallyError::Config("test".into());
        let _counting = TallyError::Counting {
            message: "test".into(),
            source: None,
        };
        let _catalog = TallyError::Catalog {
            message: "test".into(),
            source: Some(Box::new(std::io::Error::other("test"))),
        };
        let _import = TallyError::Import("test".into());
        let _storage = TallyError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _internal = TallyError::Internal("test".into());
    }

    #[test]
    fn error_messages_are_prefixed() {
        assert!(TallyError::Import("bad version".into())
            .to_string()
            .starts_with("import rejected"));
        assert!(TallyError::Config("oops".into())
            .to_string()
            .starts_with("configuration error"));
    }

    #[test]
    fn settings_default_is_current_version() {
        let settings = MeterSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert!(settings.usage.all_time.is_consistent());
    }
}
