//! Navigation decision table.
//!
//! DESIGN
//! ======
//! `decide` is a pure function of (route policy, session view). Rules apply
//! in precedence order:
//! 1. no user on a non-public path redirects to landing;
//! 2. a signed-in non-admin on a public path (other than the exempt ones)
//!    goes home;
//! 3. the admin route renders for admins only;
//! 4. subscription routes render for admins or active subscribers;
//! 5. the home route shows the paywall to users with neither flag.
//!
//! A path outside the table is treated as subscription-protected for
//! signed-in users.
//!
//! Flags are tri-state. `Unknown` is never treated as granted, so a failed
//! first fetch cannot open a protected page.

use super::policy::{Capability, HOME_PATH, LANDING_PATH, RoutePolicy, SIGNED_IN_PUBLIC_EXEMPT, normalize};
use crate::backend::User;

/// Server-reported value of one authority check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authority {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl Authority {
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value { Self::Granted } else { Self::Denied }
    }

    #[must_use]
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags {
    pub is_admin: Authority,
    pub subscription_active: Authority,
}

impl AccessFlags {
    #[must_use]
    pub fn new(is_admin: bool, subscription_active: bool) -> Self {
        Self { is_admin: Authority::from_bool(is_admin), subscription_active: Authority::from_bool(subscription_active) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Auth or flags are still being fetched.
    Loading,
    Render,
    RedirectLanding,
    RedirectHome,
    ShowPaywall,
}

impl Decision {
    #[must_use]
    pub fn redirect_target(self) -> Option<&'static str> {
        match self {
            Self::RedirectLanding => Some(LANDING_PATH),
            Self::RedirectHome => Some(HOME_PATH),
            _ => None,
        }
    }
}

/// Everything the decision table reads about the current session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionView<'a> {
    pub user: Option<&'a User>,
    pub auth_loading: bool,
    pub flags_loading: bool,
    pub flags: AccessFlags,
}

#[must_use]
pub fn decide(policy: &RoutePolicy, path: &str, view: SessionView<'_>) -> Decision {
    if view.auth_loading {
        return Decision::Loading;
    }
    let capability = policy.classify(path);

    if view.user.is_none() {
        return if capability == Some(Capability::Public) { Decision::Render } else { Decision::RedirectLanding };
    }
    if view.flags_loading {
        return Decision::Loading;
    }

    let admin = view.flags.is_admin.is_granted();
    let subscribed = view.flags.subscription_active.is_granted();
    let path = normalize(path);

    match capability.unwrap_or(Capability::SubscriptionRequired) {
        Capability::Public => {
            if admin || SIGNED_IN_PUBLIC_EXEMPT.contains(&path) {
                Decision::Render
            } else {
                Decision::RedirectHome
            }
        }
        Capability::AdminOnly => {
            if admin {
                Decision::Render
            } else {
                Decision::RedirectHome
            }
        }
        Capability::SubscriptionRequired => {
            if admin || subscribed {
                Decision::Render
            } else {
                Decision::RedirectHome
            }
        }
        Capability::AuthOnly => {
            if path == HOME_PATH && !admin && !subscribed {
                Decision::ShowPaywall
            } else {
                Decision::Render
            }
        }
    }
}

#[cfg(test)]
#[path = "decision_test.rs"]
mod tests;
