//! Money transaction entity - movements of member money in and out of the
//! shared fund.
//!
//! `user_id` is who recorded the transaction; `target_user_id` is whose
//! balance it affects. Deposits and adjustments credit the target, and
//! withdrawals debit the recording member, so a member's balance is the net
//! of "funds the group holds on their behalf".

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of money movement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TransactionKind {
    /// Member money handed into the shared fund; credits `target_user_id`
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Member money taken back out of the fund; debits `user_id`
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Opening-balance carry-forward written by a period restart; signed,
    /// credits (or charges) `target_user_id`
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

/// Money transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "money_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Room whose fund the money moved through
    pub room_id: i64,
    /// Period the record was stamped with at creation
    pub period_id: i64,
    /// Member who recorded the transaction
    pub user_id: String,
    /// Member whose balance the money affects
    pub target_user_id: String,
    /// Day the money moved
    pub date: Date,
    /// Amount; positive for deposits/withdrawals, signed for adjustments
    pub amount: f64,
    /// Deposit, withdrawal, or adjustment
    pub kind: TransactionKind,
    /// Optional free-form note
    pub note: Option<String>,
    /// When the record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between MoneyTransaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one period
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
