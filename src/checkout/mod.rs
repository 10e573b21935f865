//! PIX checkout.
//!
//! ARCHITECTURE
//! ============
//! `machine` is the pure state machine, `flow` drives it with the
//! countdown and poller tasks from `poller`, `form` validates payer input,
//! `display` formats the countdown, and `clipboard` copies the payment code.

pub mod clipboard;
pub mod display;
pub mod flow;
pub mod form;
pub mod machine;
pub mod poller;

pub use flow::{CheckoutError, CheckoutFlow, CheckoutOutcome, CheckoutUpdate};
pub use form::CheckoutForm;
pub use machine::{CheckoutStep, RejectReason};
