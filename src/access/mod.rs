//! Route access control.
//!
//! ARCHITECTURE
//! ============
//! `policy` maps paths to required capabilities, `decision` is the pure
//! decision table, `gate` holds the cached authority flags and reacts to
//! sync events, and `paywall` owns the trial-activation overlay.

pub mod decision;
pub mod gate;
pub mod paywall;
pub mod policy;

pub use decision::{AccessFlags, Authority, Decision};
pub use gate::AccessGate;
pub use policy::{Capability, RoutePolicy};
