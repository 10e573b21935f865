//! PIX checkout state machine.
//!
//! DESIGN
//! ======
//! Pure and synchronous: timers and pollers live in `flow`, which feeds
//! inputs here tagged with the generation they were started under.
//! `begin`, `retry` and `close` bump the generation, so a tick or poll
//! result from a torn-down attempt is ignored instead of mutating the
//! current one.
//!
//! ```text
//! Form --begin--> QrCode --in_process/confirm--> Verifying
//! QrCode|Verifying --approved--> Approved
//! QrCode|Verifying --rejected/cancelled/timeout--> Rejected --retry--> Form
//! ```

use time::OffsetDateTime;

use crate::backend::{PaymentStatus, PixPayment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    Form,
    QrCode,
    Verifying,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Countdown reached zero before approval.
    Expired,
    /// Gateway reported rejected or cancelled.
    Declined(PaymentStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub payment: PixPayment,
    pub status: PaymentStatus,
}

/// What the success modal shows after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedSummary {
    pub plan_name: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    EnteredVerifying,
    /// Sync and re-read the subscription before showing success.
    Reconcile { payment_id: String },
    Declined(PaymentStatus),
    Expired,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while in {step:?}")]
    InvalidStep { action: &'static str, step: CheckoutStep },
}

#[derive(Debug, Clone)]
pub struct CheckoutMachine {
    window_secs: u32,
    step: CheckoutStep,
    session: Option<PaymentSession>,
    time_left: u32,
    generation: u64,
    reject_reason: Option<RejectReason>,
    approved: Option<ApprovedSummary>,
}

impl CheckoutMachine {
    /// A zero window is raised to one second so every attempt can expire.
    #[must_use]
    pub fn new(window_secs: u32) -> Self {
        let window_secs = window_secs.max(1);
        Self {
            window_secs,
            step: CheckoutStep::Form,
            session: None,
            time_left: window_secs,
            generation: 0,
            reject_reason: None,
            approved: None,
        }
    }

    #[must_use]
    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    #[must_use]
    pub fn window_secs(&self) -> u32 {
        self.window_secs
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn session(&self) -> Option<&PaymentSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn payment_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.payment.id.as_str())
    }

    #[must_use]
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        self.reject_reason.as_ref()
    }

    #[must_use]
    pub fn approved_summary(&self) -> Option<&ApprovedSummary> {
        self.approved.as_ref()
    }

    /// QR code shown and countdown running.
    #[must_use]
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self.step, CheckoutStep::QrCode | CheckoutStep::Verifying) && self.time_left > 0
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.step, CheckoutStep::Approved | CheckoutStep::Rejected)
    }

    /// Form submitted and the payment created. Returns the new generation.
    ///
    /// # Errors
    ///
    /// Only valid from `Form`.
    pub fn begin(&mut self, payment: PixPayment) -> Result<u64, TransitionError> {
        self.expect_step(CheckoutStep::Form, "begin payment")?;
        self.generation += 1;
        self.session = Some(PaymentSession { payment, status: PaymentStatus::Pending });
        self.time_left = self.window_secs;
        self.step = CheckoutStep::QrCode;
        Ok(self.generation)
    }

    /// One second elapsed.
    pub fn tick(&mut self, generation: u64) -> Option<Effect> {
        if generation != self.generation || !self.is_awaiting_payment() {
            return None;
        }
        self.time_left -= 1;
        if self.time_left == 0 {
            self.reject(RejectReason::Expired);
            return Some(Effect::Expired);
        }
        None
    }

    /// Apply a polled gateway status.
    pub fn apply_status(&mut self, generation: u64, status: PaymentStatus) -> Option<Effect> {
        if generation != self.generation || !self.is_awaiting_payment() {
            return None;
        }
        if let Some(session) = self.session.as_mut() {
            session.status = status.clone();
        }
        match status {
            PaymentStatus::Approved => {
                self.step = CheckoutStep::Approved;
                let payment_id = self.payment_id().unwrap_or_default().to_string();
                Some(Effect::Reconcile { payment_id })
            }
            status if status.is_failure() => {
                self.reject(RejectReason::Declined(status.clone()));
                Some(Effect::Declined(status))
            }
            PaymentStatus::InProcess if self.step == CheckoutStep::QrCode => {
                self.step = CheckoutStep::Verifying;
                Some(Effect::EnteredVerifying)
            }
            _ => None,
        }
    }

    /// User says they have paid.
    ///
    /// # Errors
    ///
    /// Only valid while awaiting payment.
    pub fn mark_verifying(&mut self) -> Result<(), TransitionError> {
        if !self.is_awaiting_payment() {
            return Err(TransitionError::InvalidStep { action: "verify payment", step: self.step });
        }
        self.step = CheckoutStep::Verifying;
        Ok(())
    }

    /// Attach the reconciled plan details. Ignored unless approved under
    /// the same generation.
    pub fn set_approved_summary(&mut self, generation: u64, summary: ApprovedSummary) -> bool {
        if generation != self.generation || self.step != CheckoutStep::Approved {
            return false;
        }
        self.approved = Some(summary);
        true
    }

    /// Back to the form after a rejection.
    ///
    /// # Errors
    ///
    /// Only valid from `Rejected`.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        self.expect_step(CheckoutStep::Rejected, "retry")?;
        self.reset();
        Ok(())
    }

    /// Checkout dismissed. Valid from any step.
    pub fn close(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.step = CheckoutStep::Form;
        self.session = None;
        self.time_left = self.window_secs;
        self.reject_reason = None;
        self.approved = None;
    }

    fn reject(&mut self, reason: RejectReason) {
        self.step = CheckoutStep::Rejected;
        self.reject_reason = Some(reason);
    }

    fn expect_step(&self, expected: CheckoutStep, action: &'static str) -> Result<(), TransitionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(TransitionError::InvalidStep { action, step: self.step })
        }
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
