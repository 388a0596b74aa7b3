//! Unified error types for the ledger core.
//!
//! Every public operation returns `Result<T>`; failures are one of the small
//! structured variants below (kind + message), never an opaque panic. Cache
//! failures are not represented here because the cache degrades to direct
//! computation instead of erroring.

use thiserror::Error;

/// All failure modes surfaced past the component boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller lacks the required privilege for a mutation or cross-user read.
    #[error("not authorized: {message}")]
    Authorization {
        /// What was attempted and by whom
        message: String,
    },

    /// Missing or malformed input, or an operation that requires a period
    /// when none exists (or the period is locked).
    #[error("invalid request: {message}")]
    Validation {
        /// What was wrong with the request
        message: String,
    },

    /// A period lifecycle transition not permitted from the current state.
    #[error("invalid period transition: period is {current}, requested {requested}")]
    InvalidState {
        /// The period's current state (status plus lock flag)
        current: String,
        /// The state the caller asked for
        requested: String,
    },

    /// The operation would violate a room-level invariant, e.g. unlocking a
    /// period into ACTIVE while another ACTIVE period already exists.
    #[error("conflict: {message}")]
    Conflict {
        /// Which invariant the operation collided with
        message: String,
    },

    /// Room, user, period, or ledger record absent.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// Configuration loading or parsing failure.
    #[error("configuration error: {message}")]
    Config {
        /// What failed to load or parse
        message: String,
    },

    /// Persistence failure, surfaced as-is. Writes either fully commit their
    /// ledger mutation or not at all.
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (config file access and similar).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }
}
