//! Shared test utilities for `Messmate`.
//!
//! This module provides common helper functions for setting up in-memory
//! test databases and staging a room with members and a period.

use crate::{
    config,
    core::{Ledger, period},
    entities,
    errors::Result,
    gate::StaticGate,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// Room id used by all tests.
pub const ROOM: i64 = 1;
/// Privileged member (role "manager").
pub const ALICE: &str = "alice";
/// Ordinary member.
pub const BOB: &str = "bob";
/// Ordinary member.
pub const CAROL: &str = "carol";

/// Creates an in-memory `SQLite` database with all tables initialized and a
/// ledger handle whose gate knows a room with one manager (alice) and two
/// members (bob, carol).
pub async fn setup_ledger() -> Result<Ledger> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    config::database::create_tables(&db).await?;

    let gate = StaticGate::new();
    gate.add_member(ROOM, ALICE, "manager").await;
    gate.add_member(ROOM, BOB, "member").await;
    gate.add_member(ROOM, CAROL, "member").await;

    Ok(Ledger::new(db, Arc::new(gate)))
}

/// Shorthand for a calendar date; panics only on invalid test input.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Starts the standard test period: open-ended, ACTIVE, covering August 2026.
pub async fn start_test_period(ledger: &Ledger) -> Result<entities::period::Model> {
    period::start_period(
        ledger,
        ROOM,
        ALICE,
        period::NewPeriod {
            name: "August 2026".to_string(),
            start_date: d(2026, 8, 1),
            end_date: None,
        },
    )
    .await
}
