//! Period lifecycle manager.
//!
//! The single authority on whether a period may currently accept ledger
//! mutations. Implements the state machine
//! `ACTIVE → ENDED → (LOCKED ⇄ unlocked) → ARCHIVED` with the lock flag
//! orthogonal to status, plus the idempotent monthly provisioning path and
//! period restarts with balance carry-forward.
//!
//! Every successful transition synchronously invalidates all cache entries
//! tagged with the room before the response is returned, so no balance
//! figure is ever served stale across a transition.

use crate::{
    cache::{CacheKey, CacheScope, CacheTag},
    core::{Ledger, balance},
    entities::{Period, TransactionKind, money_transaction, period, period::PeriodStatus},
    errors::{Error, Result},
    notify,
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use std::time::Duration;
use tracing::{debug, info};

/// TTL for the cached current-period lookup. Short, because the cache is
/// also invalidated explicitly on every transition.
const CURRENT_PERIOD_TTL: Duration = Duration::from_secs(30);

/// Input for [`start_period`].
#[derive(Debug, Clone)]
pub struct NewPeriod {
    /// Human-readable name
    pub name: String,
    /// First day covered
    pub start_date: NaiveDate,
    /// Last day covered, None for open-ended
    pub end_date: Option<NaiveDate>,
}

/// Returns the room's single ACTIVE period, or None.
///
/// Cached with a short TTL under the room tag; every lifecycle transition
/// for the room evicts it.
pub async fn get_current_period(ledger: &Ledger, room_id: i64) -> Result<Option<period::Model>> {
    let key = CacheKey::room(room_id, None, CacheScope::CurrentPeriod);
    ledger
        .cache
        .get_or_set(key, CURRENT_PERIOD_TTL, &[CacheTag::Room(room_id)], || async {
            find_active_period(&ledger.db, room_id).await
        })
        .await
}

/// Returns the period whose `[start_date, end_date ∨ ∞)` range contains
/// `date`, most recently created first on ties.
///
/// This is how meals can be retroactively filed under a past period.
pub async fn get_period_for_date(
    db: &DatabaseConnection,
    room_id: i64,
    date: NaiveDate,
) -> Result<Option<period::Model>> {
    Period::find()
        .filter(period::Column::RoomId.eq(room_id))
        .filter(period::Column::StartDate.lte(date))
        .filter(
            Condition::any()
                .add(period::Column::EndDate.is_null())
                .add(period::Column::EndDate.gte(date)),
        )
        .order_by_desc(period::Column::CreatedAt)
        .order_by_desc(period::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Starts a new ACTIVE period for the room.
///
/// Fails with `Validation` if another ACTIVE period already exists; callers
/// must end the prior period first. Requires a privileged role.
pub async fn start_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: NewPeriod,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;

    if input.name.trim().is_empty() {
        return Err(Error::validation("period name cannot be empty"));
    }
    if let Some(end) = input.end_date
        && end < input.start_date
    {
        return Err(Error::validation(format!(
            "period end date {end} precedes start date {}",
            input.start_date
        )));
    }
    if let Some(active) = find_active_period(&ledger.db, room_id).await? {
        return Err(Error::validation(format!(
            "room {room_id} already has an active period ({}); end it first",
            active.name
        )));
    }

    let created = insert_period(&ledger.db, room_id, actor_id, &input).await?;
    info!(room_id, period_id = created.id, name = %created.name, "period started");
    after_transition(ledger, room_id, format!("period '{}' started", created.name)).await;
    Ok(created)
}

/// Idempotent lazy provisioning: makes sure a period covers `today`.
///
/// A no-op returning the existing period when the room already has an ACTIVE
/// period or any period covering `today`'s month. Otherwise creates an
/// open-ended ACTIVE period starting on the first of the month. Read paths
/// call this, so it deliberately requires only membership.
pub async fn ensure_monthly_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    today: NaiveDate,
) -> Result<period::Model> {
    ledger.require_role(actor_id, room_id).await?;

    if let Some(active) = find_active_period(&ledger.db, room_id).await? {
        return Ok(active);
    }
    if let Some(existing) = get_period_for_date(&ledger.db, room_id, today).await? {
        return Ok(existing);
    }

    let first_of_month = today.with_day(1).unwrap_or(today);
    let input = NewPeriod {
        name: today.format("%B %Y").to_string(),
        start_date: first_of_month,
        end_date: None,
    };
    let created = insert_period(&ledger.db, room_id, actor_id, &input).await?;
    info!(
        room_id,
        period_id = created.id,
        name = %created.name,
        "monthly period auto-provisioned"
    );
    after_transition(ledger, room_id, format!("period '{}' started", created.name)).await;
    Ok(created)
}

/// Ends an ACTIVE period, setting its status to ENDED and its end date.
///
/// Fails with `InvalidState` if the period is not ACTIVE or is locked.
pub async fn end_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    period_id: i64,
    end_date: Option<NaiveDate>,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    let current = find_period(&ledger.db, room_id, period_id).await?;

    if current.is_locked || current.status != PeriodStatus::Active {
        return Err(invalid_state(&current, "ENDED"));
    }

    let end = end_date.unwrap_or_else(|| Utc::now().date_naive());
    if end < current.start_date {
        return Err(Error::validation(format!(
            "end date {end} precedes period start {}",
            current.start_date
        )));
    }

    let name = current.name.clone();
    let mut active: period::ActiveModel = current.into();
    active.status = Set(PeriodStatus::Ended);
    active.end_date = Set(Some(end));
    active.updated_at = Set(Utc::now());
    let updated = active.update(&ledger.db).await?;

    info!(room_id, period_id, "period ended");
    after_transition(ledger, room_id, format!("period '{name}' ended")).await;
    Ok(updated)
}

/// Locks an ENDED period, freezing every ledger record stamped with it.
///
/// Locking an already-locked period is a no-op success. Fails with
/// `InvalidState` for any status other than ENDED.
pub async fn lock_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    period_id: i64,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    let current = find_period(&ledger.db, room_id, period_id).await?;

    if current.is_locked {
        return Ok(current);
    }
    if current.status != PeriodStatus::Ended {
        return Err(invalid_state(&current, "LOCKED"));
    }

    let name = current.name.clone();
    let mut active: period::ActiveModel = current.into();
    active.is_locked = Set(true);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&ledger.db).await?;

    info!(room_id, period_id, "period locked");
    after_transition(ledger, room_id, format!("period '{name}' locked")).await;
    Ok(updated)
}

/// Unlocks a locked period; the caller chooses the resulting status.
///
/// `target_status` must be ACTIVE or ENDED. Unlocking into ACTIVE fails with
/// `Conflict` when another ACTIVE period exists in the room.
pub async fn unlock_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    period_id: i64,
    target_status: PeriodStatus,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    let current = find_period(&ledger.db, room_id, period_id).await?;

    if !current.is_locked {
        return Err(invalid_state(&current, "UNLOCKED"));
    }
    match target_status {
        PeriodStatus::Archived => {
            return Err(Error::validation(
                "unlock target must be ACTIVE or ENDED, not ARCHIVED",
            ));
        }
        PeriodStatus::Active => {
            if let Some(other) = find_active_period(&ledger.db, room_id).await?
                && other.id != period_id
            {
                return Err(Error::Conflict {
                    message: format!(
                        "cannot unlock period {period_id} into ACTIVE: period '{}' is already active in room {room_id}",
                        other.name
                    ),
                });
            }
        }
        PeriodStatus::Ended => {}
    }

    let name = current.name.clone();
    let mut active: period::ActiveModel = current.into();
    active.is_locked = Set(false);
    active.status = Set(target_status);
    if target_status == PeriodStatus::Active {
        // A reactivated period accepts "now"-scoped records again.
        active.end_date = Set(None);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&ledger.db).await?;

    info!(room_id, period_id, target = target_status.as_str(), "period unlocked");
    after_transition(ledger, room_id, format!("period '{name}' unlocked")).await;
    Ok(updated)
}

/// Archives an ENDED, unlocked period. Terminal: archived periods can never
/// be unlocked or reactivated.
pub async fn archive_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    period_id: i64,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    let current = find_period(&ledger.db, room_id, period_id).await?;

    if current.is_locked || current.status != PeriodStatus::Ended {
        return Err(invalid_state(&current, "ARCHIVED"));
    }

    let name = current.name.clone();
    let mut active: period::ActiveModel = current.into();
    active.status = Set(PeriodStatus::Archived);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&ledger.db).await?;

    info!(room_id, period_id, "period archived");
    after_transition(ledger, room_id, format!("period '{name}' archived")).await;
    Ok(updated)
}

/// Restarts from a closed period: creates a new ACTIVE period and, when
/// `with_data` is set, carries each member's available balance forward as an
/// opening adjustment transaction. The source period is never mutated.
pub async fn restart_period(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    period_id: i64,
    new_name: Option<String>,
    with_data: bool,
) -> Result<period::Model> {
    ledger.require_privileged(actor_id, room_id).await?;
    let source = find_period(&ledger.db, room_id, period_id).await?;

    if let Some(active) = find_active_period(&ledger.db, room_id).await? {
        return Err(Error::Conflict {
            message: format!(
                "cannot restart: period '{}' is still active in room {room_id}",
                active.name
            ),
        });
    }

    // Compute carry-forwards against the source period before opening the
    // new one, so the summary cannot include the new period's own records.
    let carry_forwards = if with_data {
        let summary =
            balance::get_group_balance_summary(ledger, room_id, actor_id, Some(source.id), true)
                .await?;
        summary
            .users
            .into_iter()
            .filter_map(|u| {
                let available = u.details.as_ref().map_or(u.balance, |d| d.available_balance);
                (available.abs() > f64::EPSILON).then_some((u.user_id, available))
            })
            .collect()
    } else {
        Vec::new()
    };

    let today = Utc::now().date_naive();
    let name = new_name.unwrap_or_else(|| format!("{} (restarted)", source.name));
    let now = Utc::now();

    let txn = ledger.db.begin().await?;
    let created = period::ActiveModel {
        room_id: Set(room_id),
        name: Set(name),
        start_date: Set(today),
        end_date: Set(None),
        status: Set(PeriodStatus::Active),
        is_locked: Set(false),
        created_by: Set(actor_id.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (user_id, amount) in &carry_forwards {
        money_transaction::ActiveModel {
            room_id: Set(room_id),
            period_id: Set(created.id),
            user_id: Set(actor_id.to_string()),
            target_user_id: Set(user_id.clone()),
            date: Set(today),
            amount: Set(*amount),
            kind: Set(TransactionKind::Adjustment),
            note: Set(Some(format!("carried forward from '{}'", source.name))),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    info!(
        room_id,
        source_period = period_id,
        new_period = created.id,
        carried = carry_forwards.len(),
        "period restarted"
    );
    after_transition(ledger, room_id, format!("period '{}' started", created.name)).await;
    Ok(created)
}

/// Resolves the period a ledger write should be stamped with and verifies it
/// currently accepts mutations.
///
/// Resolution order: explicit `period_id`, then the period containing
/// `date`, then the room's current ACTIVE period. Rejects with `Validation`
/// when no period exists, or when the resolved period is locked or archived.
pub(crate) async fn resolve_mutable_period(
    ledger: &Ledger,
    room_id: i64,
    period_id: Option<i64>,
    date: NaiveDate,
) -> Result<period::Model> {
    let resolved = match period_id {
        Some(id) => Some(find_period(&ledger.db, room_id, id).await?),
        None => match get_period_for_date(&ledger.db, room_id, date).await? {
            Some(p) => Some(p),
            None => get_current_period(ledger, room_id).await?,
        },
    };
    let Some(p) = resolved else {
        return Err(Error::validation(format!(
            "no accounting period covers {date} in room {room_id}; start a period first"
        )));
    };

    if p.is_locked {
        return Err(Error::validation(format!(
            "period '{}' is locked; its records cannot be changed",
            p.name
        )));
    }
    if p.status == PeriodStatus::Archived {
        return Err(Error::validation(format!(
            "period '{}' is archived; its records cannot be changed",
            p.name
        )));
    }
    debug!(room_id, period_id = p.id, %date, "resolved mutable period");
    Ok(p)
}

/// Verifies the stamped period of an existing ledger record still accepts
/// mutations. Used by delete paths, which must honor the lock of the period
/// the record was filed under, not today's period.
pub(crate) async fn ensure_period_mutable(
    ledger: &Ledger,
    room_id: i64,
    period_id: i64,
) -> Result<period::Model> {
    let p = find_period(&ledger.db, room_id, period_id).await?;
    if p.is_locked {
        return Err(Error::validation(format!(
            "period '{}' is locked; its records cannot be changed",
            p.name
        )));
    }
    if p.status == PeriodStatus::Archived {
        return Err(Error::validation(format!(
            "period '{}' is archived; its records cannot be changed",
            p.name
        )));
    }
    Ok(p)
}

/// Looks up a period by id, scoped to the room.
pub async fn find_period(
    db: &DatabaseConnection,
    room_id: i64,
    period_id: i64,
) -> Result<period::Model> {
    Period::find_by_id(period_id)
        .filter(period::Column::RoomId.eq(room_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("period {period_id} in room {room_id}")))
}

async fn find_active_period(
    db: &DatabaseConnection,
    room_id: i64,
) -> Result<Option<period::Model>> {
    Period::find()
        .filter(period::Column::RoomId.eq(room_id))
        .filter(period::Column::Status.eq(PeriodStatus::Active))
        .order_by_desc(period::Column::CreatedAt)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn insert_period(
    db: &DatabaseConnection,
    room_id: i64,
    actor_id: &str,
    input: &NewPeriod,
) -> Result<period::Model> {
    let now = Utc::now();
    period::ActiveModel {
        room_id: Set(room_id),
        name: Set(input.name.trim().to_string()),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        status: Set(PeriodStatus::Active),
        is_locked: Set(false),
        created_by: Set(actor_id.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

fn invalid_state(current: &period::Model, requested: &str) -> Error {
    Error::InvalidState {
        current: current.describe_state(),
        requested: requested.to_string(),
    }
}

/// Synchronous cache invalidation for the whole room, then fire-and-forget
/// notification. Runs before the transition's response is returned.
async fn after_transition(ledger: &Ledger, room_id: i64, event: String) {
    ledger.cache.invalidate(CacheTag::Room(room_id)).await;
    notify::dispatch(&ledger.notifier, room_id, event);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::MoneyTransaction;
    use crate::test_utils::{ALICE, BOB, ROOM, d, setup_ledger, start_test_period};

    #[tokio::test]
    async fn test_start_period_requires_privilege() -> Result<()> {
        let ledger = setup_ledger().await?;
        let result = start_period(
            &ledger,
            ROOM,
            BOB,
            NewPeriod {
                name: "August".to_string(),
                start_date: d(2026, 8, 1),
                end_date: None,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Authorization { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_only_one_active_period_per_room() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let result = start_period(
            &ledger,
            ROOM,
            ALICE,
            NewPeriod {
                name: "Second".to_string(),
                start_date: d(2026, 9, 1),
                end_date: None,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_monthly_period_is_idempotent() -> Result<()> {
        let ledger = setup_ledger().await?;

        let first = ensure_monthly_period(&ledger, ROOM, BOB, d(2026, 8, 15)).await?;
        assert_eq!(first.status, PeriodStatus::Active);
        assert_eq!(first.start_date, d(2026, 8, 1));

        // Second call is a no-op returning the same period.
        let second = ensure_monthly_period(&ledger, ROOM, BOB, d(2026, 8, 20)).await?;
        assert_eq!(second.id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_end_period_sets_status_and_end_date() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        let ended = end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        assert_eq!(ended.status, PeriodStatus::Ended);
        assert_eq!(ended.end_date, Some(d(2026, 8, 31)));

        // Ending again is an invalid transition.
        let again = end_period(&ledger, ROOM, ALICE, p.id, None).await;
        assert!(matches!(again.unwrap_err(), Error::InvalidState { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_requires_ended_status() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        // Scenario: locking an ACTIVE period is rejected with both states named.
        let result = lock_period(&ledger, ROOM, ALICE, p.id).await;
        match result.unwrap_err() {
            Error::InvalidState { current, requested } => {
                assert_eq!(current, "ACTIVE");
                assert_eq!(requested, "LOCKED");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_is_idempotent_once_ended() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;

        let locked = lock_period(&ledger, ROOM, ALICE, p.id).await?;
        assert!(locked.is_locked);
        assert_eq!(locked.status, PeriodStatus::Ended);

        let again = lock_period(&ledger, ROOM, ALICE, p.id).await?;
        assert!(again.is_locked);
        Ok(())
    }

    #[tokio::test]
    async fn test_unlock_into_active_conflicts_with_existing_active() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p1 = start_test_period(&ledger).await?;
        end_period(&ledger, ROOM, ALICE, p1.id, Some(d(2026, 8, 31))).await?;
        lock_period(&ledger, ROOM, ALICE, p1.id).await?;

        // A second period becomes the room's ACTIVE one.
        start_period(
            &ledger,
            ROOM,
            ALICE,
            NewPeriod {
                name: "September".to_string(),
                start_date: d(2026, 9, 1),
                end_date: None,
            },
        )
        .await?;

        let result =
            unlock_period(&ledger, ROOM, ALICE, p1.id, PeriodStatus::Active).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));

        // Unlocking back into ENDED is fine.
        let unlocked = unlock_period(&ledger, ROOM, ALICE, p1.id, PeriodStatus::Ended).await?;
        assert!(!unlocked.is_locked);
        assert_eq!(unlocked.status, PeriodStatus::Ended);
        Ok(())
    }

    #[tokio::test]
    async fn test_unlock_requires_locked() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;

        let result = unlock_period(&ledger, ROOM, ALICE, p.id, PeriodStatus::Ended).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidState { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_unlock_into_active_reopens_period() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        lock_period(&ledger, ROOM, ALICE, p.id).await?;

        let unlocked = unlock_period(&ledger, ROOM, ALICE, p.id, PeriodStatus::Active).await?;
        assert_eq!(unlocked.status, PeriodStatus::Active);
        assert!(!unlocked.is_locked);
        assert_eq!(unlocked.end_date, None);

        let current = get_current_period(&ledger, ROOM).await?.unwrap();
        assert_eq!(current.id, p.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_requires_ended_and_unlocked() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        // ACTIVE cannot be archived.
        let result = archive_period(&ledger, ROOM, ALICE, p.id).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidState { .. }));

        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        lock_period(&ledger, ROOM, ALICE, p.id).await?;

        // Locked cannot be archived.
        let result = archive_period(&ledger, ROOM, ALICE, p.id).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidState { .. }));

        unlock_period(&ledger, ROOM, ALICE, p.id, PeriodStatus::Ended).await?;
        let archived = archive_period(&ledger, ROOM, ALICE, p.id).await?;
        assert_eq!(archived.status, PeriodStatus::Archived);
        Ok(())
    }

    #[tokio::test]
    async fn test_archived_is_terminal() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        archive_period(&ledger, ROOM, ALICE, p.id).await?;

        assert!(matches!(
            end_period(&ledger, ROOM, ALICE, p.id, None).await.unwrap_err(),
            Error::InvalidState { .. }
        ));
        assert!(matches!(
            lock_period(&ledger, ROOM, ALICE, p.id).await.unwrap_err(),
            Error::InvalidState { .. }
        ));
        assert!(matches!(
            unlock_period(&ledger, ROOM, ALICE, p.id, PeriodStatus::Active)
                .await
                .unwrap_err(),
            Error::InvalidState { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_period_for_date_prefers_newest_on_overlap() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p1 = start_test_period(&ledger).await?; // starts 2026-08-01, open-ended
        end_period(&ledger, ROOM, ALICE, p1.id, Some(d(2026, 9, 15))).await?;
        let p2 = start_period(
            &ledger,
            ROOM,
            ALICE,
            NewPeriod {
                name: "September".to_string(),
                start_date: d(2026, 9, 1),
                end_date: None,
            },
        )
        .await?;

        // 2026-09-10 falls in both ranges; the newer period wins.
        let hit = get_period_for_date(&ledger.db, ROOM, d(2026, 9, 10))
            .await?
            .unwrap();
        assert_eq!(hit.id, p2.id);

        // 2026-08-10 only falls in the first.
        let hit = get_period_for_date(&ledger.db, ROOM, d(2026, 8, 10))
            .await?
            .unwrap();
        assert_eq!(hit.id, p1.id);

        assert!(
            get_period_for_date(&ledger.db, ROOM, d(2025, 1, 1))
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_current_period_cache_invalidated_on_transition() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        // Prime the cache.
        let current = get_current_period(&ledger, ROOM).await?.unwrap();
        assert_eq!(current.id, p.id);

        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;

        // The transition must not leave the stale ACTIVE lookup behind.
        assert!(get_current_period(&ledger, ROOM).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_with_data_carries_balances_forward() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        // Bob deposits 500 into the fund; no meals, so it all carries over.
        crate::core::money::record_transaction(
            &ledger,
            ROOM,
            ALICE,
            crate::core::money::TransactionInput {
                target_user_id: BOB.to_string(),
                date: d(2026, 8, 5),
                amount: 500.0,
                kind: TransactionKind::Deposit,
                note: None,
                period_id: None,
            },
        )
        .await?;

        end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        let restarted =
            restart_period(&ledger, ROOM, ALICE, p.id, Some("September".to_string()), true)
                .await?;
        assert_eq!(restarted.status, PeriodStatus::Active);
        assert_eq!(restarted.name, "September");

        // Bob's 500 arrives in the new period as an opening adjustment.
        let carried = MoneyTransaction::find()
            .filter(money_transaction::Column::PeriodId.eq(restarted.id))
            .filter(money_transaction::Column::Kind.eq(TransactionKind::Adjustment))
            .all(&ledger.db)
            .await?;
        assert_eq!(carried.len(), 1);
        assert_eq!(carried[0].target_user_id, BOB);
        assert!((carried[0].amount - 500.0).abs() < 1e-9);

        // The source period itself is untouched.
        let source = find_period(&ledger.db, ROOM, p.id).await?;
        assert_eq!(source.status, PeriodStatus::Ended);
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_conflicts_with_active_period() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        let result = restart_period(&ledger, ROOM, ALICE, p.id, None, false).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_period_scoped_to_room() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        let result = find_period(&ledger.db, 999, p.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }
}
