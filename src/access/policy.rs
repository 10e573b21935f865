//! Route policy table.
//!
//! Every application path maps to the capability needed to view it. A path
//! missing from the table has no policy of its own; the decision layer
//! decides how to treat it.

use std::collections::HashMap;

pub const HOME_PATH: &str = "/";
pub const LANDING_PATH: &str = "/landing";
pub const ADMIN_PATH: &str = "/admin";

/// Public pages a signed-in non-admin may keep visiting.
pub const SIGNED_IN_PUBLIC_EXEMPT: [&str; 2] = ["/planos", LANDING_PATH];

const PUBLIC_PATHS: &[&str] = &["/landing", "/login", "/register", "/planos", "/forgot-password", "/reset-password"];
const AUTH_ONLY_PATHS: &[&str] = &[HOME_PATH, "/perfil", "/assinatura", "/checkout", "/tutorial"];
const ADMIN_PATHS: &[&str] = &[ADMIN_PATH];
const SUBSCRIPTION_PATHS: &[&str] = &[
    "/compra",
    "/venda",
    "/estoque",
    "/materiais",
    "/clientes",
    "/fornecedores",
    "/caixa",
    "/despesas",
    "/relatorios",
    "/transacoes",
    "/configuracoes",
    "/indicacoes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Public,
    AuthOnly,
    SubscriptionRequired,
    AdminOnly,
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    routes: HashMap<String, Capability>,
}

impl RoutePolicy {
    #[must_use]
    pub fn empty() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register `path` under `capability`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, path: &str, capability: Capability) -> Self {
        self.routes.insert(normalize(path).to_string(), capability);
        self
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> Option<Capability> {
        self.routes.get(normalize(path)).copied()
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == Some(Capability::Public)
    }

    /// Paths registered under `capability`, sorted.
    #[must_use]
    pub fn paths(&self, capability: Capability) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .routes
            .iter()
            .filter(|(_, c)| **c == capability)
            .map(|(p, _)| p.as_str())
            .collect();
        paths.sort_unstable();
        paths
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        let mut policy = Self::empty();
        for (paths, capability) in [
            (PUBLIC_PATHS, Capability::Public),
            (AUTH_ONLY_PATHS, Capability::AuthOnly),
            (SUBSCRIPTION_PATHS, Capability::SubscriptionRequired),
            (ADMIN_PATHS, Capability::AdminOnly),
        ] {
            for path in paths {
                policy = policy.with(path, capability);
            }
        }
        policy
    }
}

/// Strip query/fragment and trailing slashes. The root stays `/`.
#[must_use]
pub fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { HOME_PATH } else { trimmed }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
