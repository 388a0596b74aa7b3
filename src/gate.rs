//! Permission gate adapter - the boundary to the external membership service.
//!
//! The core never inspects role strings at call sites. The gate resolves a
//! role once, the [`RoleConfig`](crate::config::roles::RoleConfig) allow-list
//! maps it to a [`PrivilegeTier`], and everything downstream branches on the
//! tier.

use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Privilege tier derived from a role string.
///
/// `Privileged` roles may mutate periods and act on behalf of other members;
/// `Member` roles may only write their own records and read their own
/// figures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrivilegeTier {
    /// Ordinary room member
    Member,
    /// Admin/manager-equivalent role
    Privileged,
}

/// A room member as reported by the membership service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomMember {
    /// Member's user id
    pub user_id: String,
    /// Raw role string; tier mapping happens at the gate boundary
    pub role: String,
}

/// Role lookup against the external membership service.
///
/// Implementations must be cheap to call repeatedly; the core consults the
/// gate before every mutation and before cross-user reads.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Returns the user's role in the room, or None if they are not a member.
    async fn resolve_role(&self, user_id: &str, room_id: i64) -> Result<Option<String>>;

    /// Returns all members of the room with their roles.
    async fn room_members(&self, room_id: i64) -> Result<Vec<RoomMember>>;
}

/// In-memory gate used by tests and the demo binary.
///
/// Membership is a plain map; mutations via [`StaticGate::add_member`] make
/// it easy to stage rooms in tests.
#[derive(Debug, Default)]
pub struct StaticGate {
    rooms: RwLock<HashMap<i64, Vec<RoomMember>>>,
}

impl StaticGate {
    /// Creates an empty gate with no rooms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user_id` in `room_id` with the given role.
    pub async fn add_member(&self, room_id: i64, user_id: &str, role: &str) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id).or_default().push(RoomMember {
            user_id: user_id.to_string(),
            role: role.to_string(),
        });
    }
}

#[async_trait]
impl PermissionGate for StaticGate {
    async fn resolve_role(&self, user_id: &str, room_id: i64) -> Result<Option<String>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&room_id).and_then(|members| {
            members
                .iter()
                .find(|m| m.user_id == user_id)
                .map(|m| m.role.clone())
        }))
    }

    async fn room_members(&self, room_id: i64) -> Result<Vec<RoomMember>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&room_id).cloned().unwrap_or_default())
    }
}
