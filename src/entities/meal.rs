//! Meal entity - one member meal on one day.
//!
//! At most one meal of a given type per user per day exists in a room; the
//! write path enforces this as an upsert, so concurrent adds for the same
//! slot leave exactly one surviving record.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which meal of the day a record represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MealType {
    /// Morning meal
    #[sea_orm(string_value = "breakfast")]
    Breakfast,
    /// Midday meal
    #[sea_orm(string_value = "lunch")]
    Lunch,
    /// Evening meal
    #[sea_orm(string_value = "dinner")]
    Dinner,
}

impl MealType {
    /// Stored string value, for messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }
}

/// Meal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meals")]
pub struct Model {
    /// Unique identifier for the meal record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Room the meal was eaten in
    pub room_id: i64,
    /// Period the record was stamped with at creation; never silently changed
    pub period_id: i64,
    /// Member who ate the meal
    pub user_id: String,
    /// Day the meal was eaten
    pub date: Date,
    /// Breakfast, lunch, or dinner
    pub meal_type: MealType,
    /// When the record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Meal and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each meal belongs to one period
    #[sea_orm(
        belongs_to = "super::period::Entity",
        from = "Column::PeriodId",
        to = "super::period::Column::Id"
    )]
    Period,
}

impl Related<super::period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Period.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
