//! Money transaction ledger write path.
//!
//! Deposits, withdrawals, and adjustments move member money through the
//! shared fund and are the sole input to balance computation. Recording a
//! transaction always requires the privileged tier: money moves on behalf
//! of other members.

use crate::{
    cache::CacheTag,
    core::{Ledger, period},
    entities::{MoneyTransaction, TransactionKind, money_transaction},
    errors::{Error, Result},
    notify,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Input for [`record_transaction`].
#[derive(Debug, Clone)]
pub struct TransactionInput {
    /// Member whose balance the money affects
    pub target_user_id: String,
    /// Day the money moved
    pub date: NaiveDate,
    /// Amount; positive for deposits/withdrawals, signed for adjustments
    pub amount: f64,
    /// Deposit, withdrawal, or adjustment
    pub kind: TransactionKind,
    /// Optional free-form note
    pub note: Option<String>,
    /// Explicit period override; resolved from the date when None
    pub period_id: Option<i64>,
}

/// Records a money transaction. Privileged only.
pub async fn record_transaction(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: TransactionInput,
) -> Result<money_transaction::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    ledger
        .gate
        .resolve_role(&input.target_user_id, room_id)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!(
                "user {} in room {room_id}",
                input.target_user_id
            ))
        })?;

    if !input.amount.is_finite() || input.amount == 0.0 {
        return Err(Error::validation(format!(
            "transaction amount must be a non-zero finite number, got {}",
            input.amount
        )));
    }
    // Only restart adjustments may carry a sign of their own.
    if input.kind != TransactionKind::Adjustment && input.amount < 0.0 {
        return Err(Error::validation(format!(
            "{:?} amounts must be positive; use a withdrawal to take money out",
            input.kind
        )));
    }

    let p = period::resolve_mutable_period(ledger, room_id, input.period_id, input.date).await?;

    let model = money_transaction::ActiveModel {
        room_id: Set(room_id),
        period_id: Set(p.id),
        user_id: Set(actor_id.to_string()),
        target_user_id: Set(input.target_user_id.clone()),
        date: Set(input.date),
        amount: Set(input.amount),
        kind: Set(input.kind),
        note: Set(input.note),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ledger.db)
    .await?;

    ledger.cache.invalidate(CacheTag::Transactions(room_id)).await;
    info!(
        room_id,
        target = %input.target_user_id,
        amount = input.amount,
        kind = ?input.kind,
        "transaction recorded"
    );
    notify::dispatch(
        &ledger.notifier,
        room_id,
        format!(
            "{:?} of {} recorded for {}",
            input.kind, input.amount, input.target_user_id
        ),
    );
    Ok(model)
}

/// Deletes a transaction. Honors the lock of the period the record was
/// stamped with.
pub async fn remove_transaction(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    transaction_id: i64,
) -> Result<()> {
    ledger.require_privileged(actor_id, room_id).await?;
    let existing = MoneyTransaction::find_by_id(transaction_id)
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .one(&ledger.db)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("transaction {transaction_id} in room {room_id}"))
        })?;

    period::ensure_period_mutable(ledger, room_id, existing.period_id).await?;

    existing.delete(&ledger.db).await?;
    ledger.cache.invalidate(CacheTag::Transactions(room_id)).await;
    info!(room_id, transaction_id, "transaction removed");
    Ok(())
}

/// Lists a period's transactions, newest first.
pub async fn list_transactions(
    ledger: &Ledger,
    room_id: i64,
    period_id: i64,
) -> Result<Vec<money_transaction::Model>> {
    MoneyTransaction::find()
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .filter(money_transaction::Column::PeriodId.eq(period_id))
        .order_by_desc(money_transaction::Column::Date)
        .order_by_desc(money_transaction::Column::Id)
        .all(&ledger.db)
        .await
        .map_err(Into::into)
}
