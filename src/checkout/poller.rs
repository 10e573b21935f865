//! Background tasks feeding the checkout flow: the one-second countdown and
//! the payment status poller. Both stop on their own once the flow drops
//! its receiver; the flow also aborts them explicitly on every transition
//! out of the waiting steps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::backend::{PaymentGateway, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowInput {
    Tick,
    Status(PaymentStatus),
    PollFailed(String),
}

/// A task input stamped with the checkout generation that spawned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMessage {
    pub generation: u64,
    pub input: FlowInput,
}

pub fn spawn_countdown(generation: u64, tx: mpsc::UnboundedSender<FlowMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if tx.send(FlowMessage { generation, input: FlowInput::Tick }).is_err() {
                break;
            }
        }
    })
}

/// Poll `payment_id` every `interval`, reporting only status changes.
/// Errors are reported and polling continues.
pub fn spawn_status_poller(
    gateway: Arc<dyn PaymentGateway>,
    generation: u64,
    payment_id: String,
    interval: Duration,
    tx: mpsc::UnboundedSender<FlowMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<PaymentStatus> = None;
        loop {
            ticker.tick().await;
            let input = match gateway.payment_status(&payment_id).await {
                Ok(status) if last.as_ref() == Some(&status) => continue,
                Ok(status) => {
                    debug!(payment_id = %payment_id, status = status.as_str(), "payment status changed");
                    last = Some(status.clone());
                    FlowInput::Status(status)
                }
                Err(e) => {
                    warn!(payment_id = %payment_id, error = %e, "payment status poll failed");
                    FlowInput::PollFailed(e.to_string())
                }
            };
            if tx.send(FlowMessage { generation, input }).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
