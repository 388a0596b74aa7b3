//! Core business logic - framework-agnostic period lifecycle, ledger write,
//! and balance aggregation operations.
//!
//! Everything here is invoked through a shared [`Ledger`] handle that carries
//! the database connection, the tagged cache, the permission gate, and the
//! notifier. Route/UI layers are external consumers of these functions.

/// Balance aggregation engine - meal rates, balances, group summaries
pub mod balance;
/// Expense ledger write path
pub mod expense;
/// Meal and guest meal ledger write paths
pub mod meal;
/// Money transaction ledger write path
pub mod money;
/// Period lifecycle manager - the single authority on mutability
pub mod period;

use crate::cache::TaggedCache;
use crate::config::roles::RoleConfig;
use crate::errors::{Error, Result};
use crate::gate::{PermissionGate, PrivilegeTier};
use crate::notify::{LogNotifier, Notifier};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared handle available to all ledger operations.
///
/// Holds the database connection and the collaborators every operation
/// needs: cache, permission gate, notifier, and the role allow-list.
pub struct Ledger {
    /// Database connection for all persistence
    pub db: DatabaseConnection,
    /// Tag-invalidated memo in front of expensive aggregations
    pub cache: Arc<TaggedCache>,
    /// External membership/role lookup
    pub gate: Arc<dyn PermissionGate>,
    /// Fire-and-forget room notifications
    pub notifier: Arc<dyn Notifier>,
    /// Role-to-tier allow-list
    pub roles: RoleConfig,
}

impl Ledger {
    /// Creates a ledger handle with the default notifier and role config.
    #[must_use]
    pub fn new(db: DatabaseConnection, gate: Arc<dyn PermissionGate>) -> Self {
        Self {
            db,
            cache: Arc::new(TaggedCache::new()),
            gate,
            notifier: Arc::new(LogNotifier),
            roles: RoleConfig::default(),
        }
    }

    /// Replaces the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the role allow-list.
    #[must_use]
    pub fn with_roles(mut self, roles: RoleConfig) -> Self {
        self.roles = roles;
        self
    }

    /// Resolves the caller's role in the room, rejecting non-members.
    pub(crate) async fn require_role(&self, user_id: &str, room_id: i64) -> Result<String> {
        self.gate
            .resolve_role(user_id, room_id)
            .await?
            .ok_or_else(|| Error::Authorization {
                message: format!("user {user_id} is not a member of room {room_id}"),
            })
    }

    /// Resolves the caller's role and rejects non-privileged tiers.
    pub(crate) async fn require_privileged(&self, user_id: &str, room_id: i64) -> Result<String> {
        let role = self.require_role(user_id, room_id).await?;
        if self.roles.tier_for(&role) == PrivilegeTier::Privileged {
            Ok(role)
        } else {
            Err(Error::Authorization {
                message: format!(
                    "user {user_id} (role {role}) may not perform privileged actions in room {room_id}"
                ),
            })
        }
    }

    /// Allows acting on `target_user_id`'s records: members may act on their
    /// own, privileged roles on anyone's.
    pub(crate) async fn require_self_or_privileged(
        &self,
        actor_id: &str,
        target_user_id: &str,
        room_id: i64,
    ) -> Result<String> {
        if actor_id == target_user_id {
            self.require_role(actor_id, room_id).await
        } else {
            self.require_privileged(actor_id, room_id).await
        }
    }
}
