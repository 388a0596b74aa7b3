//! `Messmate` - a period-scoped ledger for shared-living groups
//!
//! This crate implements the accounting core of a meal/expense tracker for
//! shared households ("rooms"): bounded accounting periods with lock/archive
//! semantics that gate every financial mutation, four raw ledgers (meals,
//! guest meals, expenses, money transactions), and a balance aggregation
//! engine that derives meal rates, balances, and available balances from
//! them. A tag-invalidated cache sits in front of the expensive aggregations.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    // Security and correctness
    unsafe_code,
    unsafe_op_in_unsafe_fn,

    // Code quality - things that are almost always bugs
    unreachable_code,
    unreachable_patterns,
    unused_must_use,

    // Documentation - broken links are bugs
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    missing_docs,

    clippy::all,
    clippy::pedantic,

    // Performance
    clippy::inefficient_to_string,
    clippy::needless_pass_by_value,

    // Correctness
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::exit,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,

    // Style consistency
    clippy::enum_glob_use,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,

    // Future compatibility
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Will add gradually
    clippy::missing_panics_doc,        // Will add gradually
)]

/// Tag-invalidated memoization in front of period lookups and aggregations
pub mod cache;
/// Configuration management for database and role settings
pub mod config;
/// Core business logic - period lifecycle, ledger writes, balance aggregation
pub mod core;
/// SeaORM entity definitions for the period table and the four raw ledgers
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Permission gate adapter - role resolution and privilege tiers
pub mod gate;
/// Fire-and-forget room notifications
pub mod notify;

#[cfg(test)]
pub mod test_utils;
