//! Async driver for the PIX checkout.
//!
//! SYSTEM CONTEXT
//! ==============
//! Owns a [`CheckoutMachine`] plus the countdown and poller tasks for the
//! current attempt. Callers pull updates with `next_update` (or
//! `run_to_completion`) and render them.
//!
//! DESIGN
//! ======
//! Tasks send generation-stamped messages over one channel. Leaving the
//! waiting steps aborts both tasks, and anything still queued from an old
//! generation is discarded, so a slow poll can never revive a closed or
//! retried attempt.
//!
//! On approval the gateway status is not trusted on its own: after a
//! settle delay the subscription is synced, a `SubscriptionSynced` event is
//! published, and the newest active subscription is read back to describe
//! what was bought.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::form::{CheckoutForm, FormError};
use super::machine::{ApprovedSummary, CheckoutMachine, CheckoutStep, Effect, RejectReason, TransitionError};
use super::poller::{FlowInput, FlowMessage, spawn_countdown, spawn_status_poller};
use crate::backend::{BackendError, PaymentGateway, PixPayment, Plan, SubscriptionService};
use crate::config::CheckoutConfig;
use crate::events::{SyncBus, SyncEvent, SyncKind};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("payment request failed: {0}")]
    Payment(#[from] BackendError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Something the UI should reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutUpdate {
    Tick { time_left: u32 },
    Verifying,
    PollFailed(String),
    Approved(ApprovedSummary),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Approved(Option<ApprovedSummary>),
    Rejected(RejectReason),
    /// Closed or never started.
    Closed,
}

pub struct CheckoutFlow {
    gateway: Arc<dyn PaymentGateway>,
    subscriptions: Arc<dyn SubscriptionService>,
    bus: SyncBus,
    config: CheckoutConfig,
    user_id: String,
    machine: CheckoutMachine,
    plan: Option<Plan>,
    tx: mpsc::UnboundedSender<FlowMessage>,
    rx: mpsc::UnboundedReceiver<FlowMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl CheckoutFlow {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        subscriptions: Arc<dyn SubscriptionService>,
        bus: SyncBus,
        config: CheckoutConfig,
        user_id: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            subscriptions,
            bus,
            config,
            user_id: user_id.into(),
            machine: CheckoutMachine::new(config.window_secs),
            plan: None,
            tx,
            rx,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn machine(&self) -> &CheckoutMachine {
        &self.machine
    }

    #[must_use]
    pub fn step(&self) -> CheckoutStep {
        self.machine.step()
    }

    /// Validate the form, create the PIX charge and start the countdown.
    ///
    /// # Errors
    ///
    /// Validation and payment-creation failures leave the flow in `Form`.
    pub async fn submit(&mut self, form: &CheckoutForm, plan: Plan) -> Result<PixPayment, CheckoutError> {
        if self.machine.step() != CheckoutStep::Form {
            return Err(TransitionError::InvalidStep { action: "submit", step: self.machine.step() }.into());
        }
        let payer = form.validate()?;
        let payment = self
            .gateway
            .create_pix_payment(&payer, &plan, &self.user_id)
            .await
            .map_err(|e| {
                error!(user_id = %self.user_id, plan_id = %plan.id, error = %e, "PIX payment creation failed");
                e
            })?;

        let generation = self.machine.begin(payment.clone())?;
        info!(user_id = %self.user_id, payment_id = %payment.id, plan_id = %plan.id, "PIX payment created");
        self.plan = Some(plan);
        self.start_tasks(generation, payment.id.clone());
        Ok(payment)
    }

    /// Wait for the next update. `None` once the flow is no longer waiting
    /// on a payment.
    pub async fn next_update(&mut self) -> Option<CheckoutUpdate> {
        loop {
            if !self.machine.is_awaiting_payment() {
                return None;
            }
            let message = self.rx.recv().await?;
            let generation = self.machine.generation();
            if message.generation != generation {
                continue;
            }
            match message.input {
                FlowInput::Tick => match self.machine.tick(generation) {
                    Some(effect) => return Some(self.apply_effect(generation, effect).await),
                    None => return Some(CheckoutUpdate::Tick { time_left: self.machine.time_left() }),
                },
                FlowInput::Status(status) => {
                    if let Some(effect) = self.machine.apply_status(generation, status) {
                        return Some(self.apply_effect(generation, effect).await);
                    }
                }
                FlowInput::PollFailed(reason) => return Some(CheckoutUpdate::PollFailed(reason)),
            }
        }
    }

    /// Drive the flow until it leaves the waiting steps.
    pub async fn run_to_completion<F>(&mut self, mut on_update: F) -> CheckoutOutcome
    where
        F: FnMut(&CheckoutUpdate),
    {
        while let Some(update) = self.next_update().await {
            on_update(&update);
        }
        self.outcome()
    }

    #[must_use]
    pub fn outcome(&self) -> CheckoutOutcome {
        if !self.machine.is_terminal() {
            return CheckoutOutcome::Closed;
        }
        match self.machine.step() {
            CheckoutStep::Approved => CheckoutOutcome::Approved(self.machine.approved_summary().cloned()),
            CheckoutStep::Rejected => CheckoutOutcome::Rejected(
                self.machine
                    .reject_reason()
                    .cloned()
                    .unwrap_or(RejectReason::Expired),
            ),
            _ => CheckoutOutcome::Closed,
        }
    }

    /// "I already paid": move to `Verifying` and check the status now
    /// instead of waiting for the next poll.
    ///
    /// # Errors
    ///
    /// Only valid while a payment is pending.
    pub async fn confirm_paid(&mut self) -> Result<CheckoutUpdate, CheckoutError> {
        self.machine.mark_verifying()?;
        let generation = self.machine.generation();
        let payment_id = self.machine.payment_id().unwrap_or_default().to_string();
        match self.gateway.payment_status(&payment_id).await {
            Ok(status) => {
                if let Some(effect) = self.machine.apply_status(generation, status) {
                    return Ok(self.apply_effect(generation, effect).await);
                }
            }
            Err(e) => warn!(payment_id = %payment_id, error = %e, "manual payment check failed"),
        }
        Ok(CheckoutUpdate::Verifying)
    }

    /// Back to the form after a rejection.
    ///
    /// # Errors
    ///
    /// Only valid from `Rejected`.
    pub fn retry(&mut self) -> Result<(), CheckoutError> {
        self.machine.retry()?;
        self.stop_tasks();
        self.plan = None;
        Ok(())
    }

    /// Dismiss the checkout, cancelling any countdown and poll.
    pub fn close(&mut self) {
        self.stop_tasks();
        self.machine.close();
        self.plan = None;
        while self.rx.try_recv().is_ok() {}
    }

    async fn apply_effect(&mut self, generation: u64, effect: Effect) -> CheckoutUpdate {
        match effect {
            Effect::EnteredVerifying => CheckoutUpdate::Verifying,
            Effect::Expired => {
                self.stop_tasks();
                warn!(user_id = %self.user_id, "PIX payment window expired");
                CheckoutUpdate::Rejected(RejectReason::Expired)
            }
            Effect::Declined(status) => {
                self.stop_tasks();
                warn!(user_id = %self.user_id, status = status.as_str(), "PIX payment declined");
                CheckoutUpdate::Rejected(RejectReason::Declined(status))
            }
            Effect::Reconcile { payment_id } => {
                self.stop_tasks();
                info!(user_id = %self.user_id, payment_id = %payment_id, "PIX payment approved");
                let summary = self.reconcile().await;
                self.machine.set_approved_summary(generation, summary.clone());
                CheckoutUpdate::Approved(summary)
            }
        }
    }

    async fn reconcile(&self) -> ApprovedSummary {
        tokio::time::sleep(self.config.approval_settle()).await;

        match self.subscriptions.sync_subscription(&self.user_id).await {
            Ok(()) => {
                self.bus
                    .publish(SyncEvent::new(self.user_id.clone(), SyncKind::SubscriptionSynced));
            }
            Err(e) => warn!(user_id = %self.user_id, error = %e, "subscription sync after payment failed"),
        }

        let fallback_name = self.plan.as_ref().map(|p| p.name.clone()).unwrap_or_default();
        match self.subscriptions.newest_active_subscription(&self.user_id).await {
            Ok(Some(record)) => ApprovedSummary { plan_name: record.plan_name, expires_at: Some(record.expires_at) },
            Ok(None) => {
                warn!(user_id = %self.user_id, "no active subscription visible after approval");
                ApprovedSummary { plan_name: fallback_name, expires_at: None }
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "active subscription lookup failed");
                ApprovedSummary { plan_name: fallback_name, expires_at: None }
            }
        }
    }

    fn start_tasks(&mut self, generation: u64, payment_id: String) {
        self.stop_tasks();
        self.tasks.push(spawn_countdown(generation, self.tx.clone()));
        self.tasks.push(spawn_status_poller(
            self.gateway.clone(),
            generation,
            payment_id,
            self.config.poll_interval(),
            self.tx.clone(),
        ));
    }

    fn stop_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for CheckoutFlow {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
