//! Paywall overlay and self-service trial activation.
//!
//! The backend write behind a trial activation is not immediately visible
//! to the subscription check, so the `TrialActivated` sync event is
//! published after a delay rather than right away.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::backend::{BackendError, SubscriptionService, TrialGrant};
use crate::events::{SyncBus, SyncEvent, SyncKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paywall {
    visible: bool,
}

impl Paywall {
    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    #[must_use]
    pub fn is_visible(self) -> bool {
        self.visible
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaywallError {
    #[error("trial activation requires a signed-in user")]
    NoUser,
    #[error("trial activation failed: {0}")]
    Activation(#[from] BackendError),
}

/// Activate a trial for `user_id` and schedule the gate recheck.
///
/// # Errors
///
/// Returns the backend error when activation fails; nothing is published
/// in that case.
pub async fn activate_trial(
    service: &dyn SubscriptionService,
    bus: &SyncBus,
    user_id: &str,
    recheck_delay: Duration,
) -> Result<TrialGrant, PaywallError> {
    let grant = service.activate_trial(user_id).await.map_err(|e| {
        error!(user_id, error = %e, "trial activation failed");
        e
    })?;
    info!(user_id, expires_at = ?grant.expires_at, "trial activated");
    schedule_sync_event(bus.clone(), SyncEvent::new(user_id, SyncKind::TrialActivated), recheck_delay);
    Ok(grant)
}

/// Publish `event` on `bus` after `delay`.
pub fn schedule_sync_event(bus: SyncBus, event: SyncEvent, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        bus.publish(event);
    })
}

#[cfg(test)]
#[path = "paywall_test.rs"]
mod tests;
