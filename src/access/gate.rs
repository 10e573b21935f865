//! Access gate: route guard over server-side authority flags.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation goes through `evaluate`. The gate keeps two flags
//! (admin role, active subscription) fetched from the backend and a
//! monotonic recheck counter. Sync events for the current user bump the
//! counter; the next evaluation re-fetches both flags once.
//!
//! ERROR HANDLING
//! ==============
//! A failed or null authority check keeps the flag's previous value and is
//! logged. Nothing is surfaced to the user. Row-level security on the
//! backend is the real enforcement; this gate is navigation UX.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::decision::{AccessFlags, Authority, Decision, SessionView, decide};
use super::paywall::{self, Paywall, PaywallError};
use super::policy::RoutePolicy;
use crate::backend::{AuthorityChecks, BackendError, Role, SubscriptionService, TrialGrant, User};
use crate::events::{SyncBus, SyncEvent, SyncKind, SyncSubscription};

pub struct AccessGate {
    checks: Arc<dyn AuthorityChecks>,
    policy: RoutePolicy,
    bus: SyncBus,
    events: Option<SyncSubscription>,
    user: Option<User>,
    auth_loading: bool,
    flags: AccessFlags,
    flags_loading: bool,
    recheck_seq: u64,
    fetched_seq: Option<u64>,
    paywall: Paywall,
}

impl AccessGate {
    /// New gate in the auth-loading state; call [`AccessGate::set_user`]
    /// once the auth provider has answered.
    #[must_use]
    pub fn new(checks: Arc<dyn AuthorityChecks>, policy: RoutePolicy, bus: SyncBus) -> Self {
        Self {
            checks,
            policy,
            bus,
            events: None,
            user: None,
            auth_loading: true,
            flags: AccessFlags::default(),
            flags_loading: false,
            recheck_seq: 0,
            fetched_seq: None,
            paywall: Paywall::default(),
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn flags(&self) -> AccessFlags {
        self.flags
    }

    #[must_use]
    pub fn paywall_visible(&self) -> bool {
        self.paywall.is_visible()
    }

    #[must_use]
    pub fn recheck_seq(&self) -> u64 {
        self.recheck_seq
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.user.is_some() && self.fetched_seq != Some(self.recheck_seq)
    }

    pub fn set_auth_loading(&mut self, loading: bool) {
        self.auth_loading = loading;
    }

    /// Record the auth provider's answer. A different user resets the
    /// flags, resubscribes to sync events and schedules a refresh.
    pub fn set_user(&mut self, user: Option<User>) {
        self.auth_loading = false;
        let same = match (&self.user, &user) {
            (Some(a), Some(b)) => a.id == b.id,
            (None, None) => true,
            _ => false,
        };
        if same {
            self.user = user;
            return;
        }

        self.flags = AccessFlags::default();
        self.fetched_seq = None;
        self.paywall.hide();
        self.events = user.as_ref().map(|u| self.bus.subscribe_user(u.id.clone()));
        match &user {
            Some(u) => {
                info!(user_id = %u.id, "gate user signed in");
                self.recheck_seq += 1;
            }
            None => info!("gate user signed out"),
        }
        self.user = user;
    }

    pub fn request_recheck(&mut self) {
        self.recheck_seq += 1;
        debug!(seq = self.recheck_seq, "gate recheck requested");
    }

    /// Apply one sync event. Returns whether it was for the current user.
    pub fn handle_event(&mut self, event: &SyncEvent) -> bool {
        let Some(user) = &self.user else {
            return false;
        };
        if user.id != event.user_id {
            return false;
        }
        info!(user_id = %event.user_id, kind = event.kind.as_str(), "gate sync event");
        if event.kind == SyncKind::TrialActivated {
            self.paywall.hide();
        }
        self.request_recheck();
        true
    }

    /// Apply all queued sync events without waiting.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.events.as_mut().and_then(SyncSubscription::try_recv) {
            if self.handle_event(&event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next sync event for the current user and apply it.
    /// Returns `None` when signed out or the bus is closed.
    pub async fn wait_for_event(&mut self) -> Option<SyncKind> {
        let event = self.events.as_mut()?.recv().await?;
        self.handle_event(&event);
        Some(event.kind)
    }

    /// Wait for the next sync event and re-decide `path` with fresh flags.
    /// Returns `None` when signed out or the bus is closed.
    pub async fn on_event(&mut self, path: &str) -> Option<(SyncKind, Decision)> {
        let kind = self.wait_for_event().await?;
        Some((kind, self.evaluate(path).await))
    }

    /// Fetch both authority flags concurrently and store them verbatim.
    pub async fn refresh(&mut self) -> AccessFlags {
        let Some(user) = self.user.clone() else {
            return self.flags;
        };
        let seq = self.recheck_seq;
        self.flags_loading = true;

        let (admin, subscription) = tokio::join!(
            self.checks.has_role(&user.id, Role::Admin),
            self.checks.is_subscription_active(&user.id)
        );
        self.flags.is_admin = merge_flag(self.flags.is_admin, admin, &user.id, "role check");
        self.flags.subscription_active =
            merge_flag(self.flags.subscription_active, subscription, &user.id, "subscription check");

        self.fetched_seq = Some(seq);
        self.flags_loading = false;
        debug!(user_id = %user.id, seq, flags = ?self.flags, "gate flags refreshed");
        self.flags
    }

    /// Decide what to do for `path`, refreshing flags first if stale.
    pub async fn evaluate(&mut self, path: &str) -> Decision {
        self.drain_events();
        if self.needs_refresh() {
            self.refresh().await;
        }
        let decision = self.decide(path);
        match decision {
            Decision::ShowPaywall => self.paywall.show(),
            Decision::Render => self.paywall.hide(),
            _ => {}
        }
        debug!(path, ?decision, "gate decision");
        decision
    }

    /// Decide with the flags currently held, without refreshing.
    #[must_use]
    pub fn decide(&self, path: &str) -> Decision {
        let view = SessionView {
            user: self.user.as_ref(),
            auth_loading: self.auth_loading,
            flags_loading: self.flags_loading || self.needs_refresh(),
            flags: self.flags,
        };
        decide(&self.policy, path, view)
    }

    /// Paywall action: start a trial, hide the overlay and schedule the
    /// recheck through the sync bus.
    ///
    /// # Errors
    ///
    /// Fails when no user is signed in or the backend refuses the trial.
    pub async fn activate_trial(
        &mut self,
        service: &dyn SubscriptionService,
        recheck_delay: Duration,
    ) -> Result<TrialGrant, PaywallError> {
        let user_id = self.user.as_ref().map(|u| u.id.clone()).ok_or(PaywallError::NoUser)?;
        let grant = paywall::activate_trial(service, &self.bus, &user_id, recheck_delay).await?;
        self.paywall.hide();
        Ok(grant)
    }
}

fn merge_flag(
    previous: Authority,
    result: Result<Option<bool>, BackendError>,
    user_id: &str,
    check: &'static str,
) -> Authority {
    match result {
        Ok(Some(value)) => Authority::from_bool(value),
        Ok(None) => {
            warn!(user_id, check, "authority check returned null; keeping previous value");
            previous
        }
        Err(e) if e.retryable() => {
            warn!(user_id, check, error = %e, "authority check unavailable; keeping previous value");
            previous
        }
        Err(e) => {
            error!(user_id, check, error = %e, "authority check failed; keeping previous value");
            previous
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
