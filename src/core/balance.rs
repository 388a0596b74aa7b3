//! Balance aggregation engine.
//!
//! Pure computation over the four raw ledgers, scoped to one period:
//! total expense, meal rate, per-user meal counts, balances, available
//! balances, and the whole-room summary. The group summary is built from
//! one grouped pass per ledger, fanned out concurrently and joined in
//! memory, so its cost is O(members + records) and never
//! O(members × records).
//!
//! Money stays `f64` at full precision throughout; the display helpers at
//! the bottom round to two decimals at presentation time only.

use crate::{
    cache::{CacheKey, CacheScope, CacheTag},
    core::{Ledger, period},
    entities::{
        Expense, GuestMeal, Meal, MoneyTransaction, TransactionKind, expense, guest_meal, meal,
        money_transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// TTL for cached money aggregations. Short, because these denormalize
/// figures that writes invalidate by tag anyway.
const BALANCE_TTL: Duration = Duration::from_secs(60);

/// Meal rate figures for a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MealRateStats {
    /// Cost charged per meal: total expense ÷ total meals, 0 when no meals
    pub meal_rate: f64,
    /// Member meals plus guest meal counts
    pub total_meals: i64,
    /// Total expense the rate was derived from
    pub total_expense: f64,
}

/// Per-member spend figures, present only when details are requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceDetails {
    /// Own meals plus own guest meals
    pub meal_count: i64,
    /// The period's meal rate
    pub meal_rate: f64,
    /// `meal_count × meal_rate`
    pub total_spent: f64,
    /// `balance − total_spent`
    pub available_balance: f64,
}

/// One member's figures inside a group summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberBalance {
    /// Member's user id
    pub user_id: String,
    /// Raw role string as reported by the gate
    pub role: String,
    /// Net of transactions: credits targeting the member minus their debits
    pub balance: f64,
    /// Spend figures, when requested
    pub details: Option<BalanceDetails>,
}

/// Group-wide totals computed once for the whole summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupTotals {
    /// Sum of all expenses in the period
    pub total_expense: f64,
    /// Member meals plus guest meals in the period
    pub total_meals: i64,
    /// The period's meal rate
    pub meal_rate: f64,
    /// Sum of all member balances
    pub total_balance: f64,
}

/// Whole-room balance summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBalanceSummary {
    /// Period the summary was computed against, None when the room has none
    pub period_id: Option<i64>,
    /// Every member's figures
    pub users: Vec<MemberBalance>,
    /// Group-wide totals
    pub totals: GroupTotals,
}

/// Response shape for a single member's balance read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserBalanceResponse {
    /// Member the figures belong to
    pub user_id: String,
    /// Raw role string as reported by the gate
    pub role: String,
    /// Net transaction balance in the current period
    pub balance: f64,
    /// The room's current period, provisioned lazily if the month had none
    pub current_period: Option<crate::entities::period::Model>,
    /// Spend figures, present only when details were requested
    pub details: Option<BalanceDetails>,
}

/// Sum of all expense amounts (shopping purchases included) for the period.
///
/// Best-effort: returns 0 when the room has no current period and none was
/// named explicitly.
pub async fn calculate_total_expenses(
    ledger: &Ledger,
    room_id: i64,
    period_id: Option<i64>,
) -> Result<f64> {
    let Some(pid) = resolve_read_period(ledger, room_id, period_id).await? else {
        return Ok(0.0);
    };
    let key = CacheKey::room(room_id, Some(pid), CacheScope::TotalExpenses);
    let tags = [CacheTag::Room(room_id), CacheTag::Expenses(room_id)];
    ledger
        .cache
        .get_or_set(key, BALANCE_TTL, &tags, || async {
            sum_expenses(&ledger.db, room_id, pid).await
        })
        .await
}

/// Meal rate for the period: total expense ÷ total meals.
///
/// `total_meals` counts member meals plus guest meal counts. Division by
/// zero is an explicit branch: the rate is 0 whenever the period has no
/// meals. Pass `total_expense` to reuse an already-computed figure.
pub async fn calculate_meal_rate(
    ledger: &Ledger,
    room_id: i64,
    period_id: Option<i64>,
    total_expense: Option<f64>,
) -> Result<MealRateStats> {
    let Some(pid) = resolve_read_period(ledger, room_id, period_id).await? else {
        return Ok(MealRateStats {
            meal_rate: 0.0,
            total_meals: 0,
            total_expense: total_expense.unwrap_or(0.0),
        });
    };

    let compute = || async {
        let (meal_count, guest_count, expense) = tokio::try_join!(
            count_meals(&ledger.db, room_id, pid),
            sum_guest_meals(&ledger.db, room_id, pid),
            async {
                match total_expense {
                    Some(v) => Ok(v),
                    None => sum_expenses(&ledger.db, room_id, pid).await,
                }
            },
        )?;
        Ok(meal_rate_from(meal_count + guest_count, expense))
    };

    // A caller-supplied expense figure makes the result argument-dependent,
    // so only the canonical computation is memoized.
    if total_expense.is_some() {
        return compute().await;
    }
    let key = CacheKey::room(room_id, Some(pid), CacheScope::MealRate);
    let tags = [
        CacheTag::Room(room_id),
        CacheTag::Meals(room_id),
        CacheTag::GuestMeals(room_id),
        CacheTag::Expenses(room_id),
    ];
    ledger.cache.get_or_set(key, BALANCE_TTL, &tags, compute).await
}

/// One member's meal count: own meals plus own guest meals.
pub async fn calculate_user_meal_count(
    ledger: &Ledger,
    user_id: &str,
    room_id: i64,
    period_id: Option<i64>,
) -> Result<i64> {
    let Some(pid) = resolve_read_period(ledger, room_id, period_id).await? else {
        return Ok(0);
    };
    let key = CacheKey::user(room_id, Some(pid), CacheScope::MealCount, user_id);
    let tags = [
        CacheTag::Room(room_id),
        CacheTag::Meals(room_id),
        CacheTag::GuestMeals(room_id),
    ];
    ledger
        .cache
        .get_or_set(key, BALANCE_TTL, &tags, || async {
            let (meals, guests) = tokio::try_join!(
                count_meals_for_user(&ledger.db, room_id, pid, user_id),
                sum_guest_meals_for_user(&ledger.db, room_id, pid, user_id),
            )?;
            Ok(meals + guests)
        })
        .await
}

/// One member's net transaction balance in the period.
///
/// Credits are deposits and adjustments targeting the member; debits are
/// withdrawals they recorded. The result is the money the group currently
/// holds on the member's behalf.
pub async fn calculate_balance(
    ledger: &Ledger,
    user_id: &str,
    room_id: i64,
    period_id: Option<i64>,
) -> Result<f64> {
    let Some(pid) = resolve_read_period(ledger, room_id, period_id).await? else {
        return Ok(0.0);
    };
    let key = CacheKey::user(room_id, Some(pid), CacheScope::Balance, user_id);
    let tags = [CacheTag::Room(room_id), CacheTag::Transactions(room_id)];
    ledger
        .cache
        .get_or_set(key, BALANCE_TTL, &tags, || async {
            let (credits, debits) = tokio::try_join!(
                sum_credits_for_user(&ledger.db, room_id, pid, user_id),
                sum_debits_for_user(&ledger.db, room_id, pid, user_id),
            )?;
            Ok(credits - debits)
        })
        .await
}

/// Computes every member's figures in one pass per ledger.
///
/// Shared quantities (total expense, meal rate) are computed once; per-user
/// figures come from grouped aggregates fanned out concurrently, so the cost
/// is O(members + records). Requires the requester to be a room member.
pub async fn get_group_balance_summary(
    ledger: &Ledger,
    room_id: i64,
    requester_id: &str,
    period_id: Option<i64>,
    include_details: bool,
) -> Result<GroupBalanceSummary> {
    ledger.require_role(requester_id, room_id).await?;
    let members = ledger.gate.room_members(room_id).await?;
    if members.is_empty() {
        return Err(Error::not_found(format!("room {room_id}")));
    }

    let Some(pid) = resolve_read_period(ledger, room_id, period_id).await? else {
        // Best-effort read with no period: all zeros.
        return Ok(GroupBalanceSummary {
            period_id: None,
            users: members
                .into_iter()
                .map(|m| MemberBalance {
                    user_id: m.user_id,
                    role: m.role,
                    balance: 0.0,
                    details: include_details.then_some(BalanceDetails {
                        meal_count: 0,
                        meal_rate: 0.0,
                        total_spent: 0.0,
                        available_balance: 0.0,
                    }),
                })
                .collect(),
            totals: GroupTotals {
                total_expense: 0.0,
                total_meals: 0,
                meal_rate: 0.0,
                total_balance: 0.0,
            },
        });
    };

    let key = CacheKey::room(
        room_id,
        Some(pid),
        CacheScope::GroupSummary {
            details: include_details,
        },
    );
    let tags = [
        CacheTag::Room(room_id),
        CacheTag::Meals(room_id),
        CacheTag::GuestMeals(room_id),
        CacheTag::Expenses(room_id),
        CacheTag::Transactions(room_id),
    ];
    ledger
        .cache
        .get_or_set(key, BALANCE_TTL, &tags, || async {
            compute_group_summary(ledger, room_id, pid, members, include_details).await
        })
        .await
}

async fn compute_group_summary(
    ledger: &Ledger,
    room_id: i64,
    pid: i64,
    members: Vec<crate::gate::RoomMember>,
    include_details: bool,
) -> Result<GroupBalanceSummary> {
    let db = &ledger.db;

    // One grouped pass per ledger, all in flight at once.
    let (credits, debits, meals_by_user, guests_by_user, total_expense) = tokio::try_join!(
        sum_credits_by_user(db, room_id, pid),
        sum_debits_by_user(db, room_id, pid),
        count_meals_by_user(db, room_id, pid),
        sum_guest_meals_by_user(db, room_id, pid),
        sum_expenses(db, room_id, pid),
    )?;

    let total_meals: i64 = meals_by_user.values().sum::<i64>() + guests_by_user.values().sum::<i64>();
    let stats = meal_rate_from(total_meals, total_expense);

    let mut total_balance = 0.0;
    let users = members
        .into_iter()
        .map(|m| {
            let balance = credits.get(&m.user_id).copied().unwrap_or(0.0)
                - debits.get(&m.user_id).copied().unwrap_or(0.0);
            total_balance += balance;
            let details = include_details.then(|| {
                let meal_count = meals_by_user.get(&m.user_id).copied().unwrap_or(0)
                    + guests_by_user.get(&m.user_id).copied().unwrap_or(0);
                #[allow(clippy::cast_precision_loss)]
                let total_spent = meal_count as f64 * stats.meal_rate;
                BalanceDetails {
                    meal_count,
                    meal_rate: stats.meal_rate,
                    total_spent,
                    available_balance: balance - total_spent,
                }
            });
            MemberBalance {
                user_id: m.user_id,
                role: m.role,
                balance,
                details,
            }
        })
        .collect();

    Ok(GroupBalanceSummary {
        period_id: Some(pid),
        users,
        totals: GroupTotals {
            total_expense,
            total_meals,
            meal_rate: stats.meal_rate,
            total_balance,
        },
    })
}

/// Single-member balance read in the §6 response shape.
///
/// Reading another member's figures requires the privileged tier. As part of
/// the read contract this lazily provisions a period for the current month
/// when the room has none.
pub async fn get_user_balance(
    ledger: &Ledger,
    room_id: i64,
    requester_id: &str,
    user_id: &str,
    include_details: bool,
) -> Result<UserBalanceResponse> {
    ledger
        .require_self_or_privileged(requester_id, user_id, room_id)
        .await?;
    let role = ledger
        .gate
        .resolve_role(user_id, room_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {user_id} in room {room_id}")))?;

    // Reads trigger idempotent monthly provisioning (documented contract).
    let current_period = Some(
        period::ensure_monthly_period(ledger, room_id, requester_id, Utc::now().date_naive())
            .await?,
    );
    let pid = current_period.as_ref().map(|p| p.id);

    let balance = calculate_balance(ledger, user_id, room_id, pid).await?;
    let details = if include_details {
        let stats = calculate_meal_rate(ledger, room_id, pid, None).await?;
        let meal_count = calculate_user_meal_count(ledger, user_id, room_id, pid).await?;
        #[allow(clippy::cast_precision_loss)]
        let total_spent = meal_count as f64 * stats.meal_rate;
        Some(BalanceDetails {
            meal_count,
            meal_rate: stats.meal_rate,
            total_spent,
            available_balance: balance - total_spent,
        })
    } else {
        None
    };

    Ok(UserBalanceResponse {
        user_id: user_id.to_string(),
        role,
        balance,
        current_period,
        details,
    })
}

#[allow(clippy::cast_precision_loss)]
fn meal_rate_from(total_meals: i64, total_expense: f64) -> MealRateStats {
    // Explicit zero branch: a period with no meals has a rate of 0, never a
    // division error.
    let meal_rate = if total_meals > 0 {
        total_expense / total_meals as f64
    } else {
        0.0
    };
    MealRateStats {
        meal_rate,
        total_meals,
        total_expense,
    }
}

async fn resolve_read_period(
    ledger: &Ledger,
    room_id: i64,
    period_id: Option<i64>,
) -> Result<Option<i64>> {
    match period_id {
        // An explicit reference must resolve; silence here would mean
        // computing against the wrong data.
        Some(id) => Ok(Some(period::find_period(&ledger.db, room_id, id).await?.id)),
        None => Ok(period::get_current_period(ledger, room_id).await?.map(|p| p.id)),
    }
}

// --- Ledger scans. Each is one query; the grouped variants are the single
// --- pass the group summary is built from.

async fn sum_expenses(db: &DatabaseConnection, room_id: i64, pid: i64) -> Result<f64> {
    let total: Option<Option<f64>> = Expense::find()
        .select_only()
        .column_as(expense::Column::Amount.sum(), "total")
        .filter(expense::Column::RoomId.eq(room_id))
        .filter(expense::Column::PeriodId.eq(pid))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0.0))
}

async fn count_meals(db: &DatabaseConnection, room_id: i64, pid: i64) -> Result<i64> {
    let count: Option<i64> = Meal::find()
        .select_only()
        .column_as(meal::Column::Id.count(), "count")
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::PeriodId.eq(pid))
        .into_tuple()
        .one(db)
        .await?;
    Ok(count.unwrap_or(0))
}

async fn sum_guest_meals(db: &DatabaseConnection, room_id: i64, pid: i64) -> Result<i64> {
    let total: Option<Option<i64>> = GuestMeal::find()
        .select_only()
        .column_as(guest_meal::Column::Count.sum(), "total")
        .filter(guest_meal::Column::RoomId.eq(room_id))
        .filter(guest_meal::Column::PeriodId.eq(pid))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

async fn count_meals_for_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
    user_id: &str,
) -> Result<i64> {
    let count: Option<i64> = Meal::find()
        .select_only()
        .column_as(meal::Column::Id.count(), "count")
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::PeriodId.eq(pid))
        .filter(meal::Column::UserId.eq(user_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(count.unwrap_or(0))
}

async fn sum_guest_meals_for_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
    user_id: &str,
) -> Result<i64> {
    let total: Option<Option<i64>> = GuestMeal::find()
        .select_only()
        .column_as(guest_meal::Column::Count.sum(), "total")
        .filter(guest_meal::Column::RoomId.eq(room_id))
        .filter(guest_meal::Column::PeriodId.eq(pid))
        .filter(guest_meal::Column::UserId.eq(user_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

async fn sum_credits_for_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
    user_id: &str,
) -> Result<f64> {
    let total: Option<Option<f64>> = MoneyTransaction::find()
        .select_only()
        .column_as(money_transaction::Column::Amount.sum(), "total")
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .filter(money_transaction::Column::PeriodId.eq(pid))
        .filter(money_transaction::Column::TargetUserId.eq(user_id))
        .filter(money_transaction::Column::Kind.ne(TransactionKind::Withdrawal))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0.0))
}

async fn sum_debits_for_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
    user_id: &str,
) -> Result<f64> {
    let total: Option<Option<f64>> = MoneyTransaction::find()
        .select_only()
        .column_as(money_transaction::Column::Amount.sum(), "total")
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .filter(money_transaction::Column::PeriodId.eq(pid))
        .filter(money_transaction::Column::UserId.eq(user_id))
        .filter(money_transaction::Column::Kind.eq(TransactionKind::Withdrawal))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0.0))
}

async fn count_meals_by_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
) -> Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = Meal::find()
        .select_only()
        .column(meal::Column::UserId)
        .column_as(meal::Column::Id.count(), "count")
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::PeriodId.eq(pid))
        .group_by(meal::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn sum_guest_meals_by_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
) -> Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = GuestMeal::find()
        .select_only()
        .column(guest_meal::Column::UserId)
        .column_as(guest_meal::Column::Count.sum(), "total")
        .filter(guest_meal::Column::RoomId.eq(room_id))
        .filter(guest_meal::Column::PeriodId.eq(pid))
        .group_by(guest_meal::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn sum_credits_by_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
) -> Result<HashMap<String, f64>> {
    let rows: Vec<(String, f64)> = MoneyTransaction::find()
        .select_only()
        .column(money_transaction::Column::TargetUserId)
        .column_as(money_transaction::Column::Amount.sum(), "total")
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .filter(money_transaction::Column::PeriodId.eq(pid))
        .filter(money_transaction::Column::Kind.ne(TransactionKind::Withdrawal))
        .group_by(money_transaction::Column::TargetUserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn sum_debits_by_user(
    db: &DatabaseConnection,
    room_id: i64,
    pid: i64,
) -> Result<HashMap<String, f64>> {
    let rows: Vec<(String, f64)> = MoneyTransaction::find()
        .select_only()
        .column(money_transaction::Column::UserId)
        .column_as(money_transaction::Column::Amount.sum(), "total")
        .filter(money_transaction::Column::RoomId.eq(room_id))
        .filter(money_transaction::Column::PeriodId.eq(pid))
        .filter(money_transaction::Column::Kind.eq(TransactionKind::Withdrawal))
        .group_by(money_transaction::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Rounds a money value to two decimals for display. Internal computation
/// keeps full precision; call this only at the presentation edge.
#[must_use]
pub fn round_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats a money amount with sign, e.g. "+$50.00" or "-$25.50".
#[must_use]
pub fn format_money(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+${amount:.2}")
    } else {
        format!("-${:.2}", amount.abs())
    }
}
