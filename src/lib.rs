//! Access gating and PIX checkout for the scrap-yard point-of-sale client.
//!
//! ARCHITECTURE
//! ============
//! - `access`: route policy, navigation decisions, authority-flag cache, paywall
//! - `checkout`: PIX payment state machine and its timers
//! - `events`: per-user sync bus that tells the gate to recheck
//! - `backend`: collaborator traits and the HTTP client for the hosted backend
//! - `config`: environment configuration

pub mod access;
pub mod backend;
pub mod checkout;
pub mod config;
pub mod events;
