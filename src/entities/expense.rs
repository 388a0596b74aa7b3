//! Expense entity - money spent from the room's shared fund.
//!
//! Shopping purchases are expenses of kind `Shopping`, so the period's total
//! expense is a single sum over this table. Expense amounts feed the meal
//! rate; they do not move individual member balances (those live in the
//! money transaction ledger).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category of a shared expense.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ExpenseKind {
    /// Groceries and shopping items
    #[sea_orm(string_value = "shopping")]
    Shopping,
    /// Utility bills (gas, electricity, water)
    #[sea_orm(string_value = "utility")]
    Utility,
    /// Anything else charged to the shared fund
    #[sea_orm(string_value = "other")]
    Other,
}

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Room whose fund was spent
    pub room_id: i64,
    /// Period the record was stamped with at creation
    pub period_id: i64,
    /// Member who recorded the expense
    pub user_id: String,
    /// Day the money was spent
    pub date: Date,
    /// Amount in the room's currency, always > 0
    pub amount: f64,
    /// Expense category
    pub kind: ExpenseKind,
    /// Human-readable description (e.g. "weekly bazaar")
    pub description: String,
    /// When the record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one period
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
