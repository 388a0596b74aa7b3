//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the period table and the four raw ledgers.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod expense;
pub mod guest_meal;
pub mod meal;
pub mod money_transaction;
pub mod period;

// Re-export specific types to avoid conflicts
pub use expense::{Entity as Expense, ExpenseKind};
pub use guest_meal::Entity as GuestMeal;
pub use meal::{Entity as Meal, MealType};
pub use money_transaction::{Entity as MoneyTransaction, TransactionKind};
pub use period::{Entity as Period, PeriodStatus};
