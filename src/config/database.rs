//! Database configuration module.
//!
//! Handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions via
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! struct definitions without hand-written SQL.

use crate::entities::{Expense, GuestMeal, Meal, MoneyTransaction, Period, meal};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, sea_query::Index};

/// Gets the database URL from the `DATABASE_URL` environment variable, or a
/// default local `SQLite` path when unset.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/messmate.sqlite".to_string())
}

/// Establishes a connection to the database.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions: periods plus the four raw
/// ledgers (meals, guest meals, expenses, money transactions), and the unique
/// index backing the one-meal-per-slot invariant.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let period_table = schema.create_table_from_entity(Period);
    let meal_table = schema.create_table_from_entity(Meal);
    let guest_meal_table = schema.create_table_from_entity(GuestMeal);
    let expense_table = schema.create_table_from_entity(Expense);
    let transaction_table = schema.create_table_from_entity(MoneyTransaction);

    db.execute(builder.build(&period_table)).await?;
    db.execute(builder.build(&meal_table)).await?;
    db.execute(builder.build(&guest_meal_table)).await?;
    db.execute(builder.build(&expense_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;

    // At most one meal per (user, room, date, type). Concurrent duplicate
    // adds lose at this constraint and adopt the surviving record.
    let meal_slot_index = Index::create()
        .name("idx_meals_user_room_date_type")
        .table(Meal)
        .col(meal::Column::UserId)
        .col(meal::Column::RoomId)
        .col(meal::Column::Date)
        .col(meal::Column::MealType)
        .unique()
        .to_owned();
    db.execute(builder.build(&meal_slot_index)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        expense::Model as ExpenseModel, guest_meal::Model as GuestMealModel,
        meal::Model as MealModel, money_transaction::Model as MoneyTransactionModel,
        period::Model as PeriodModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Tables exist if we can query each of them.
        let _: Vec<PeriodModel> = Period::find().limit(1).all(&db).await?;
        let _: Vec<MealModel> = Meal::find().limit(1).all(&db).await?;
        let _: Vec<GuestMealModel> = GuestMeal::find().limit(1).all(&db).await?;
        let _: Vec<ExpenseModel> = Expense::find().limit(1).all(&db).await?;
        let _: Vec<MoneyTransactionModel> = MoneyTransaction::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_meal_slot_rejected_by_index() -> Result<()> {
        use crate::entities::MealType;
        use crate::test_utils::d;
        use sea_orm::{ActiveModelTrait, Set};

        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Satisfy the meals.period_id foreign key before exercising the index.
        crate::entities::period::ActiveModel {
            id: Set(1),
            room_id: Set(1),
            name: Set("August 2026".to_string()),
            start_date: Set(d(2026, 8, 1)),
            end_date: Set(None),
            status: Set(crate::entities::period::PeriodStatus::Active),
            is_locked: Set(false),
            created_by: Set("alice".to_string()),
            created_at: Set(chrono::Utc::now()),
            updated_at: Set(chrono::Utc::now()),
        }
        .insert(&db)
        .await?;

        let slot = || meal::ActiveModel {
            room_id: Set(1),
            period_id: Set(1),
            user_id: Set("bob".to_string()),
            date: Set(d(2026, 8, 5)),
            meal_type: Set(MealType::Lunch),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        slot().insert(&db).await?;
        assert!(slot().insert(&db).await.is_err());
        Ok(())
    }
}
