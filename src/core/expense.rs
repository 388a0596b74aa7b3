//! Expense ledger write path.
//!
//! Expenses (shopping purchases included) feed the period's meal rate, so a
//! successful write invalidates every cached aggregation derived from the
//! expense ledger before returning.

use crate::{
    cache::CacheTag,
    core::{Ledger, period},
    entities::{Expense, ExpenseKind, expense},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Input for [`add_expense`].
#[derive(Debug, Clone)]
pub struct ExpenseInput {
    /// Member who spent the money
    pub user_id: String,
    /// Day the money was spent
    pub date: NaiveDate,
    /// Amount, must be finite and > 0
    pub amount: f64,
    /// Expense category
    pub kind: ExpenseKind,
    /// Human-readable description
    pub description: String,
    /// Explicit period override; resolved from the date when None
    pub period_id: Option<i64>,
}

/// Records an expense against the room's shared fund.
pub async fn add_expense(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: ExpenseInput,
) -> Result<expense::Model> {
    ledger
        .require_self_or_privileged(actor_id, &input.user_id, room_id)
        .await?;
    if !input.amount.is_finite() || input.amount <= 0.0 {
        return Err(Error::validation(format!(
            "expense amount must be positive, got {}",
            input.amount
        )));
    }
    let p = period::resolve_mutable_period(ledger, room_id, input.period_id, input.date).await?;

    let model = expense::ActiveModel {
        room_id: Set(room_id),
        period_id: Set(p.id),
        user_id: Set(input.user_id.clone()),
        date: Set(input.date),
        amount: Set(input.amount),
        kind: Set(input.kind),
        description: Set(input.description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ledger.db)
    .await?;

    ledger.cache.invalidate(CacheTag::Expenses(room_id)).await;
    info!(
        room_id,
        user_id = %input.user_id,
        amount = input.amount,
        "expense recorded"
    );
    Ok(model)
}

/// Deletes an expense. Honors the lock of the period the record was stamped
/// with, not today's period.
pub async fn remove_expense(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    expense_id: i64,
) -> Result<()> {
    let existing = Expense::find_by_id(expense_id)
        .filter(expense::Column::RoomId.eq(room_id))
        .one(&ledger.db)
        .await?
        .ok_or_else(|| Error::not_found(format!("expense {expense_id} in room {room_id}")))?;

    ledger
        .require_self_or_privileged(actor_id, &existing.user_id, room_id)
        .await?;
    period::ensure_period_mutable(ledger, room_id, existing.period_id).await?;

    existing.delete(&ledger.db).await?;
    ledger.cache.invalidate(CacheTag::Expenses(room_id)).await;
    info!(room_id, expense_id, "expense removed");
    Ok(())
}

/// Lists a period's expenses, newest first.
pub async fn list_expenses(
    ledger: &Ledger,
    room_id: i64,
    period_id: i64,
) -> Result<Vec<expense::Model>> {
    Expense::find()
        .filter(expense::Column::RoomId.eq(room_id))
        .filter(expense::Column::PeriodId.eq(period_id))
        .order_by_desc(expense::Column::Date)
        .all(&ledger.db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::balance;
    use crate::core::meal::{self as meal_ops, MealInput};
    use crate::entities::MealType;
    use crate::test_utils::{ALICE, BOB, ROOM, d, setup_ledger, start_test_period};

    fn bazaar(amount: f64, day: u32) -> ExpenseInput {
        ExpenseInput {
            user_id: ALICE.to_string(),
            date: d(2026, 8, day),
            amount,
            kind: ExpenseKind::Shopping,
            description: "bazaar".to_string(),
            period_id: None,
        }
    }

    #[tokio::test]
    async fn test_add_expense_validates_amount() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = add_expense(&ledger, ROOM, ALICE, bazaar(bad, 1)).await;
            assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_expense_feeds_total() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        add_expense(&ledger, ROOM, ALICE, bazaar(120.0, 1)).await?;
        add_expense(&ledger, ROOM, ALICE, bazaar(80.0, 2)).await?;

        let total = balance::calculate_total_expenses(&ledger, ROOM, None).await?;
        assert_eq!(total, 200.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_group_summary() -> Result<()> {
        // Scenario: a cached summary must reflect a subsequent expense
        // write; no stale read after write-then-read in the same room.
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        meal_ops::add_meal(
            &ledger,
            ROOM,
            BOB,
            MealInput {
                user_id: BOB.to_string(),
                date: d(2026, 8, 1),
                meal_type: MealType::Lunch,
                period_id: None,
            },
        )
        .await?;

        // Prime the cache with a rate of 0 (no expenses yet).
        let before = balance::get_group_balance_summary(&ledger, ROOM, BOB, None, true).await?;
        assert_eq!(before.totals.total_expense, 0.0);

        add_expense(&ledger, ROOM, ALICE, bazaar(300.0, 1)).await?;

        let after = balance::get_group_balance_summary(&ledger, ROOM, BOB, None, true).await?;
        assert_eq!(after.totals.total_expense, 300.0);
        assert_eq!(after.totals.meal_rate, 300.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_expense_honors_stamped_period_lock() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        let recorded = add_expense(&ledger, ROOM, ALICE, bazaar(50.0, 1)).await?;

        crate::core::period::end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        crate::core::period::lock_period(&ledger, ROOM, ALICE, p.id).await?;

        let result = remove_expense(&ledger, ROOM, ALICE, recorded.id).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_expense_is_not_found() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let result = remove_expense(&ledger, ROOM, ALICE, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }
}
