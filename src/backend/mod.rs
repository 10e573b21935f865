//! Backend collaborators: identity, authority checks, payments, subscriptions.
//!
//! ARCHITECTURE
//! ============
//! The gate and the checkout flow only see the traits defined here. The
//! hosted backend is the source of truth for roles and subscription
//! validity; nothing in this crate derives those locally.
//! [`http::HttpBackend`] is the production implementation.

pub mod http;
#[cfg(test)]
pub mod test_helpers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend returned a non-success status.
    #[error("backend responded with status {status}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The backend understood the request but declined it.
    #[error("request refused: {0}")]
    Refused(String),

    /// No user session is available for a call that needs one.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl BackendError {
    /// Whether repeating the same call could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Signed-in identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
        }
    }
}

/// Plan being purchased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub amount_cents: u64,
}

/// Validated payer data sent with a PIX payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// CPF, digits only.
    pub cpf: String,
}

/// A created PIX charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixPayment {
    pub id: String,
    /// Copy-and-paste payment string.
    pub qr_code: String,
    /// Base64 PNG of the QR code.
    pub qr_code_base64: String,
}

/// Gateway-reported payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    InProcess,
    Approved,
    Rejected,
    Cancelled,
    Other(String),
}

impl PaymentStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "in_process" => Self::InProcess,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }

    /// Rejected and cancelled payments never recover.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

/// Active subscription row used to describe a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionRecord {
    pub plan_name: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Result of a self-service trial activation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrialGrant {
    pub expires_at: Option<OffsetDateTime>,
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, or `None` when there is no valid session.
    async fn current_user(&self) -> Result<Option<User>, BackendError>;
}

/// Server-side authority checks. `Ok(None)` means the server could not say.
#[async_trait]
pub trait AuthorityChecks: Send + Sync {
    async fn has_role(&self, user_id: &str, role: Role) -> Result<Option<bool>, BackendError>;
    async fn is_subscription_active(&self, user_id: &str) -> Result<Option<bool>, BackendError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_pix_payment(&self, payer: &Payer, plan: &Plan, user_id: &str) -> Result<PixPayment, BackendError>;
    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, BackendError>;
}

#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Re-pull authoritative subscription state. Idempotent.
    async fn sync_subscription(&self, user_id: &str) -> Result<(), BackendError>;
    /// Active subscription with the latest expiry, if any.
    async fn newest_active_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, BackendError>;
    async fn activate_trial(&self, user_id: &str) -> Result<TrialGrant, BackendError>;
}
