// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Price resolution for the Tally usage meter.
//!
//! This crate provides:
//! - **PriceResolver**: user override -> cached catalog price -> zero, plus
//!   exchange cost calculation
//! - **CatalogClient**: fetches the remote per-token price catalog
//! - **Refresh gating**: at most one fetch per freshness window, and only
//!   while the active request source matches the catalog's provider

pub mod catalog;
pub mod resolver;

pub use catalog::CatalogClient;
pub use resolver::PriceResolver;
