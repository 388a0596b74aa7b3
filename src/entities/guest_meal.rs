//! Guest meal entity - meals served to non-members.
//!
//! Unlike member meals there is no one-per-day uniqueness; a record carries a
//! count (≥ 1) of guest meals hosted by a member on a given day. Guest meals
//! count toward the period's total meals and toward the hosting member's own
//! meal count when computing spend.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Guest meal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guest_meals")]
pub struct Model {
    /// Unique identifier for the guest meal record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Room the guests were hosted in
    pub room_id: i64,
    /// Period the record was stamped with at creation
    pub period_id: i64,
    /// Member hosting the guests; their spend absorbs these meals
    pub user_id: String,
    /// Day the guest meals were served
    pub date: Date,
    /// Number of guest meals, always ≥ 1
    pub count: i32,
    /// When the record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between GuestMeal and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each guest meal belongs to one period
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
