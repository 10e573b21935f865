//! Session sync bus.
//!
//! SYSTEM CONTEXT
//! ==============
//! Mutations that change a user's plan or role (payment sync, trial
//! activation, admin grants and revocations) publish a typed event here.
//! The access gate subscribes per user and forces a recheck of its
//! authority flags when one arrives.
//!
//! DESIGN
//! ======
//! Backed by `tokio::sync::broadcast`. Subscribers filter by user id on
//! receive; a lagged subscriber skips the dropped events instead of
//! failing, since any later event triggers the same recheck.

use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// What changed on the server for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    SubscriptionSynced,
    TrialActivated,
    AdminSubscriptionCreated,
    AdminSubscriptionDeactivated,
}

impl SyncKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubscriptionSynced => "subscription_synced",
            Self::TrialActivated => "trial_activated",
            Self::AdminSubscriptionCreated => "admin_subscription_created",
            Self::AdminSubscriptionDeactivated => "admin_subscription_deactivated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub user_id: String,
    pub kind: SyncKind,
}

impl SyncEvent {
    #[must_use]
    pub fn new(user_id: impl Into<String>, kind: SyncKind) -> Self {
        Self { user_id: user_id.into(), kind }
    }
}

/// Application-scoped publish/subscribe channel for [`SyncEvent`]s.
#[derive(Clone)]
pub struct SyncBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: SyncEvent) -> usize {
        let kind = event.kind.as_str();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(kind, receivers, "sync event published");
                receivers
            }
            Err(broadcast::error::SendError(event)) => {
                debug!(kind, user_id = %event.user_id, "sync event dropped (no subscribers)");
                0
            }
        }
    }

    /// Subscribe to events addressed to `user_id`.
    #[must_use]
    pub fn subscribe_user(&self, user_id: impl Into<String>) -> SyncSubscription {
        SyncSubscription { receiver: self.sender.subscribe(), user_id: user_id.into() }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A per-user view of the bus. Dropping it unsubscribes.
pub struct SyncSubscription {
    receiver: broadcast::Receiver<SyncEvent>,
    user_id: String,
}

impl SyncSubscription {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Wait for the next event for this user. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, user_id = %self.user_id, "sync subscriber lagged");
                }
            }
        }
    }

    /// Take the next already-queued event for this user without waiting.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    debug!(lagged = count, user_id = %self.user_id, "sync subscriber lagged");
                }
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
