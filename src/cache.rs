//! Tag-invalidated memoization for period lookups and balance aggregations.
//!
//! Keys are structured (room, period, scope, user) rather than concatenated
//! strings, and every entry carries a set of typed tags. A write to any
//! ledger invalidates by tag, which fans out to every dependent entry via a
//! tag→keys index instead of pattern matching on key substrings.
//!
//! The cache is an optimization, never a correctness dependency: entries
//! expire on a short TTL, a type-mismatched hit degrades to recompute, and
//! compute failures store nothing.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::errors::Result;

/// What a cached value represents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// The room's single ACTIVE period
    CurrentPeriod,
    /// Total expense of a period
    TotalExpenses,
    /// Meal rate + total meals of a period
    MealRate,
    /// One member's meal count in a period
    MealCount,
    /// One member's balance in a period
    Balance,
    /// Whole-room balance summary; keyed separately per detail level
    GroupSummary {
        /// Whether per-member spend details were included
        details: bool,
    },
}

/// Composite cache key: room, period, scope, and (for per-user reads) user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Room the value belongs to
    pub room_id: i64,
    /// Period the value was computed against, None for period-less lookups
    pub period_id: Option<i64>,
    /// What the value represents
    pub scope: CacheScope,
    /// User for per-user scopes, None for room-wide values
    pub user_id: Option<String>,
}

impl CacheKey {
    /// Key for a room-wide value.
    #[must_use]
    pub const fn room(room_id: i64, period_id: Option<i64>, scope: CacheScope) -> Self {
        Self {
            room_id,
            period_id,
            scope,
            user_id: None,
        }
    }

    /// Key for a per-user value.
    #[must_use]
    pub fn user(room_id: i64, period_id: Option<i64>, scope: CacheScope, user_id: &str) -> Self {
        Self {
            room_id,
            period_id,
            scope,
            user_id: Some(user_id.to_string()),
        }
    }
}

/// Invalidation tag. Ledger tags are room-scoped so a write in one room never
/// evicts another room's entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Everything belonging to a room; invalidated on lifecycle transitions
    Room(i64),
    /// Entries derived from the meal ledger
    Meals(i64),
    /// Entries derived from the guest meal ledger
    GuestMeals(i64),
    /// Entries derived from the expense ledger
    Expenses(i64),
    /// Entries derived from the money transaction ledger
    Transactions(i64),
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
    tags: Vec<CacheTag>,
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    by_tag: HashMap<CacheTag, HashSet<CacheKey>>,
}

/// In-process key/value memo with TTL and tag invalidation.
#[derive(Default)]
pub struct TaggedCache {
    state: RwLock<State>,
}

impl TaggedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if present, unexpired, and of the
    /// expected type. A type mismatch is treated as a miss.
    pub async fn get<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let state = self.state.read().await;
        let entry = state.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            trace!(?key, "cache entry expired");
            return None;
        }
        match entry.value.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                warn!(?key, "cached value has unexpected type; recomputing");
                None
            }
        }
    }

    /// Stores `value` under `key` with the given TTL and tags.
    pub async fn insert<T>(&self, key: CacheKey, value: T, ttl: Duration, tags: &[CacheTag])
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut state = self.state.write().await;
        // Drop the previous entry's tag links first so the index never holds
        // stale keys.
        remove_entry(&mut state, &key);
        for tag in tags {
            state.by_tag.entry(*tag).or_default().insert(key.clone());
        }
        state.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
                tags: tags.to_vec(),
            },
        );
    }

    /// Get-or-compute: returns the cached value on a hit, otherwise runs
    /// `compute`, stores a successful result, and returns it. Compute
    /// failures propagate and leave the cache untouched.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        tags: &[CacheTag],
        compute: F,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get::<T>(&key).await {
            trace!(?key, "cache hit");
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key, value.clone(), ttl, tags).await;
        Ok(value)
    }

    /// Removes every entry carrying `tag`.
    pub async fn invalidate(&self, tag: CacheTag) {
        let mut state = self.state.write().await;
        let Some(keys) = state.by_tag.remove(&tag) else {
            return;
        };
        debug!(?tag, count = keys.len(), "invalidating cache entries");
        for key in keys {
            remove_entry(&mut state, &key);
        }
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn remove_entry(state: &mut State, key: &CacheKey) {
    if let Some(entry) = state.entries.remove(key) {
        for tag in entry.tags {
            if let Some(keys) = state.by_tag.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    state.by_tag.remove(&tag);
                }
            }
        }
    }
}
