//! Fire-and-forget room notifications.
//!
//! Delivery is an external concern; the core only hands off an event string.
//! Dispatch happens on a spawned task so no lifecycle or aggregation path
//! ever awaits the notification backend.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Outbound notification dispatch.
///
/// Implementations must swallow their own delivery failures; the core treats
/// notification as best-effort and never observes the outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the members of `room_id` that `event` happened.
    async fn notify_room(&self, room_id: i64, event: &str);
}

/// Default notifier that just logs the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_room(&self, room_id: i64, event: &str) {
        info!(room_id, event, "room notification");
    }
}

/// Dispatches `event` without blocking the caller.
pub fn dispatch(notifier: &Arc<dyn Notifier>, room_id: i64, event: String) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        notifier.notify_room(room_id, &event).await;
    });
}
