//! Meal and guest meal ledger write paths.
//!
//! Every write runs the same pipeline: permission check, period resolution
//! through the lifecycle manager (which rejects locked and archived
//! periods), the ledger mutation, then synchronous tag invalidation before
//! the response is returned.
//!
//! "Add meal" is an upsert on the (user, room, date, type) uniqueness key,
//! so two concurrent adds for the same slot leave exactly one record;
//! removals are range-deletes and naturally idempotent.

use crate::{
    cache::CacheTag,
    core::{Ledger, period},
    entities::{GuestMeal, Meal, MealType, guest_meal, meal},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Set, prelude::*};
use tracing::{debug, info};

/// Input for [`add_meal`] / [`remove_meal`].
#[derive(Debug, Clone)]
pub struct MealInput {
    /// Member the meal belongs to
    pub user_id: String,
    /// Day the meal was eaten
    pub date: NaiveDate,
    /// Breakfast, lunch, or dinner
    pub meal_type: MealType,
    /// Explicit period override; resolved from the date when None
    pub period_id: Option<i64>,
}

/// Input for [`add_guest_meal`].
#[derive(Debug, Clone)]
pub struct GuestMealInput {
    /// Hosting member
    pub user_id: String,
    /// Day the guests were served
    pub date: NaiveDate,
    /// Number of guest meals, at least 1
    pub count: i32,
    /// Explicit period override; resolved from the date when None
    pub period_id: Option<i64>,
}

/// Records a meal, or returns the existing record for the same
/// (user, room, date, type) slot.
///
/// Members may record their own meals; recording for another member
/// requires the privileged tier.
pub async fn add_meal(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: MealInput,
) -> Result<meal::Model> {
    ledger
        .require_self_or_privileged(actor_id, &input.user_id, room_id)
        .await?;
    let p = period::resolve_mutable_period(ledger, room_id, input.period_id, input.date).await?;

    // Upsert: the uniqueness slot may already be taken, by this request's
    // own retry or by a concurrent writer.
    if let Some(existing) = find_meal(&ledger.db, room_id, &input).await? {
        debug!(meal_id = existing.id, "meal already recorded; returning existing");
        return Ok(existing);
    }

    let inserted = meal::ActiveModel {
        room_id: Set(room_id),
        period_id: Set(p.id),
        user_id: Set(input.user_id.clone()),
        date: Set(input.date),
        meal_type: Set(input.meal_type),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ledger.db)
    .await;

    let model = match inserted {
        Ok(model) => model,
        // Lost the race against a concurrent writer for the same slot: the
        // surviving record is the result. Anything else is a real error.
        Err(err) => match find_meal(&ledger.db, room_id, &input).await? {
            Some(existing) => existing,
            None => return Err(err.into()),
        },
    };

    ledger.cache.invalidate(CacheTag::Meals(room_id)).await;
    info!(
        room_id,
        user_id = %input.user_id,
        date = %input.date,
        meal_type = input.meal_type.as_str(),
        "meal recorded"
    );
    Ok(model)
}

/// Removes the meal in the given slot. Removing a meal that does not exist
/// is a no-op success; returns how many records were deleted (0 or 1).
pub async fn remove_meal(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: MealInput,
) -> Result<u64> {
    ledger
        .require_self_or_privileged(actor_id, &input.user_id, room_id)
        .await?;
    let p = period::resolve_mutable_period(ledger, room_id, input.period_id, input.date).await?;

    let deleted = Meal::delete_many()
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::PeriodId.eq(p.id))
        .filter(meal::Column::UserId.eq(&input.user_id))
        .filter(meal::Column::Date.eq(input.date))
        .filter(meal::Column::MealType.eq(input.meal_type))
        .exec(&ledger.db)
        .await?
        .rows_affected;

    if deleted > 0 {
        ledger.cache.invalidate(CacheTag::Meals(room_id)).await;
        info!(room_id, user_id = %input.user_id, date = %input.date, "meal removed");
    }
    Ok(deleted)
}

/// Records guest meals hosted by a member.
pub async fn add_guest_meal(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    input: GuestMealInput,
) -> Result<guest_meal::Model> {
    ledger
        .require_self_or_privileged(actor_id, &input.user_id, room_id)
        .await?;
    if input.count < 1 {
        return Err(Error::validation(format!(
            "guest meal count must be at least 1, got {}",
            input.count
        )));
    }
    let p = period::resolve_mutable_period(ledger, room_id, input.period_id, input.date).await?;

    let model = guest_meal::ActiveModel {
        room_id: Set(room_id),
        period_id: Set(p.id),
        user_id: Set(input.user_id.clone()),
        date: Set(input.date),
        count: Set(input.count),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ledger.db)
    .await?;

    ledger.cache.invalidate(CacheTag::GuestMeals(room_id)).await;
    info!(
        room_id,
        user_id = %input.user_id,
        count = input.count,
        "guest meals recorded"
    );
    Ok(model)
}

/// Removes all guest meals a member hosted on a day. Idempotent; returns the
/// number of records deleted.
pub async fn remove_guest_meals(
    ledger: &Ledger,
    room_id: i64,
    actor_id: &str,
    user_id: &str,
    date: NaiveDate,
) -> Result<u64> {
    ledger
        .require_self_or_privileged(actor_id, user_id, room_id)
        .await?;
    let p = period::resolve_mutable_period(ledger, room_id, None, date).await?;

    let deleted = GuestMeal::delete_many()
        .filter(guest_meal::Column::RoomId.eq(room_id))
        .filter(guest_meal::Column::PeriodId.eq(p.id))
        .filter(guest_meal::Column::UserId.eq(user_id))
        .filter(guest_meal::Column::Date.eq(date))
        .exec(&ledger.db)
        .await?
        .rows_affected;

    if deleted > 0 {
        ledger.cache.invalidate(CacheTag::GuestMeals(room_id)).await;
        info!(room_id, user_id, %date, deleted, "guest meals removed");
    }
    Ok(deleted)
}

/// Lists a member's meals in a period, newest first.
pub async fn list_meals(
    ledger: &Ledger,
    room_id: i64,
    user_id: &str,
    period_id: i64,
) -> Result<Vec<meal::Model>> {
    use sea_orm::QueryOrder;
    Meal::find()
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::PeriodId.eq(period_id))
        .filter(meal::Column::UserId.eq(user_id))
        .order_by_desc(meal::Column::Date)
        .all(&ledger.db)
        .await
        .map_err(Into::into)
}

async fn find_meal(
    db: &DatabaseConnection,
    room_id: i64,
    input: &MealInput,
) -> Result<Option<meal::Model>> {
    Meal::find()
        .filter(meal::Column::RoomId.eq(room_id))
        .filter(meal::Column::UserId.eq(&input.user_id))
        .filter(meal::Column::Date.eq(input.date))
        .filter(meal::Column::MealType.eq(input.meal_type))
        .one(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::PeriodStatus;
    use crate::test_utils::{ALICE, BOB, CAROL, ROOM, d, setup_ledger, start_test_period};

    fn lunch(user: &str, day: u32) -> MealInput {
        MealInput {
            user_id: user.to_string(),
            date: d(2026, 8, day),
            meal_type: MealType::Lunch,
            period_id: None,
        }
    }

    #[tokio::test]
    async fn test_add_meal_is_idempotent() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let first = add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        let second = add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        assert_eq!(first.id, second.id);

        let all = Meal::find().all(&ledger.db).await?;
        assert_eq!(all.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_adds_leave_single_record() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        // Two writers race for the same slot; the loser's insert fails on the
        // unique index and adopts the winner's record.
        let (first, second) = tokio::join!(
            add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)),
            add_meal(&ledger, ROOM, BOB, lunch(BOB, 5))
        );
        let (first, second) = (first?, second?);
        assert_eq!(first.id, second.id);

        let all = Meal::find().all(&ledger.db).await?;
        assert_eq!(all.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_meal_is_noop_success() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let deleted = remove_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        assert_eq!(deleted, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_and_remove_meal_roundtrip() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;

        let meal = add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        assert_eq!(meal.period_id, p.id);

        let deleted = remove_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        assert_eq!(deleted, 1);
        assert!(Meal::find().all(&ledger.db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_member_cannot_record_for_others() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let result = add_meal(&ledger, ROOM, BOB, lunch(CAROL, 5)).await;
        assert!(matches!(result.unwrap_err(), Error::Authorization { .. }));

        // A privileged role may record on someone else's behalf.
        let meal = add_meal(&ledger, ROOM, ALICE, lunch(CAROL, 5)).await?;
        assert_eq!(meal.user_id, CAROL);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_period_rejects_write() -> Result<()> {
        let ledger = setup_ledger().await?;

        let result = add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_locked_period_rejects_meal_writes() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p = start_test_period(&ledger).await?;
        add_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;

        period::end_period(&ledger, ROOM, ALICE, p.id, Some(d(2026, 8, 31))).await?;
        period::lock_period(&ledger, ROOM, ALICE, p.id).await?;

        // Both add and remove are rejected regardless of status.
        let result = add_meal(&ledger, ROOM, BOB, lunch(BOB, 6)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        let result = remove_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // Unlocking back to ENDED re-opens the records.
        period::unlock_period(&ledger, ROOM, ALICE, p.id, PeriodStatus::Ended).await?;
        let deleted = remove_meal(&ledger, ROOM, BOB, lunch(BOB, 5)).await?;
        assert_eq!(deleted, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_guest_meal_count_validation() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        let result = add_guest_meal(
            &ledger,
            ROOM,
            BOB,
            GuestMealInput {
                user_id: BOB.to_string(),
                date: d(2026, 8, 5),
                count: 0,
                period_id: None,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_guest_meals_is_range_delete() -> Result<()> {
        let ledger = setup_ledger().await?;
        start_test_period(&ledger).await?;

        for count in [2, 3] {
            add_guest_meal(
                &ledger,
                ROOM,
                BOB,
                GuestMealInput {
                    user_id: BOB.to_string(),
                    date: d(2026, 8, 5),
                    count,
                    period_id: None,
                },
            )
            .await?;
        }

        let deleted = remove_guest_meals(&ledger, ROOM, BOB, BOB, d(2026, 8, 5)).await?;
        assert_eq!(deleted, 2);

        // Running it again is a no-op.
        let deleted = remove_guest_meals(&ledger, ROOM, BOB, BOB, d(2026, 8, 5)).await?;
        assert_eq!(deleted, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_meal_stamped_with_period_for_its_date() -> Result<()> {
        let ledger = setup_ledger().await?;
        let p1 = start_test_period(&ledger).await?;
        period::end_period(&ledger, ROOM, ALICE, p1.id, Some(d(2026, 8, 31))).await?;
        let p2 = period::start_period(
            &ledger,
            ROOM,
            ALICE,
            period::NewPeriod {
                name: "September".to_string(),
                start_date: d(2026, 9, 1),
                end_date: None,
            },
        )
        .await?;

        // A retroactive meal lands in the old period, not the current one.
        let old = add_meal(&ledger, ROOM, BOB, lunch(BOB, 10)).await?;
        assert_eq!(old.period_id, p1.id);

        let current = add_meal(
            &ledger,
            ROOM,
            BOB,
            MealInput {
                user_id: BOB.to_string(),
                date: d(2026, 9, 2),
                meal_type: MealType::Lunch,
                period_id: None,
            },
        )
        .await?;
        assert_eq!(current.period_id, p2.id);
        Ok(())
    }
}
