//! Period entity - a bounded accounting window within a room.
//!
//! Every ledger record is stamped with the id of the period it was created
//! under; the period's status and lock flag gate whether those records may
//! still be mutated. At most one period per room is ACTIVE at any time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a period. The lock flag is orthogonal and lives on the
/// model itself: a period can be ENDED and locked, or ENDED and unlocked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PeriodStatus {
    /// The period currently accepting "now"-scoped records
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Closed by a privileged action; `end_date` is set
    #[sea_orm(string_value = "ENDED")]
    Ended,
    /// Terminal. Archived periods can never be unlocked or reactivated
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

impl PeriodStatus {
    /// Wire/display name, matching the stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
            Self::Archived => "ARCHIVED",
        }
    }
}

/// Period database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "periods")]
pub struct Model {
    /// Unique identifier for the period
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Room this period belongs to; the room exclusively owns its periods
    pub room_id: i64,
    /// Human-readable name (e.g. "August 2026")
    pub name: String,
    /// First day covered by the period
    pub start_date: Date,
    /// Last day covered, None while the period is open-ended
    pub end_date: Option<Date>,
    /// Lifecycle status
    pub status: PeriodStatus,
    /// When true, all ledger records stamped with this period are frozen,
    /// regardless of status
    pub is_locked: bool,
    /// User who created the period
    pub created_by: String,
    /// When the period was created; breaks date-range ties (newest wins)
    pub created_at: DateTimeUtc,
    /// Last lifecycle transition
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Period and the ledger entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One period has many meals
    #[sea_orm(has_many = "super::meal::Entity")]
    Meals,
    /// One period has many guest meals
    #[sea_orm(has_many = "super::guest_meal::Entity")]
    GuestMeals,
    /// One period has many expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
    /// One period has many money transactions
    #[sea_orm(has_many = "super::money_transaction::Entity")]
    Transactions,
}

impl Related<super::meal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meals.def()
    }
}

impl Related<super::guest_meal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuestMeals.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::money_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Human-readable state for error messages: status plus lock flag.
    #[must_use]
    pub fn describe_state(&self) -> String {
        if self.is_locked {
            format!("{} (locked)", self.status.as_str())
        } else {
            self.status.as_str().to_string()
        }
    }

    /// Whether `date` falls inside `[start_date, end_date ∨ ∞)`.
    #[must_use]
    pub fn contains_date(&self, date: Date) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }
}
