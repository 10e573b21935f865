//! HTTP client for the hosted backend (REST, RPC and edge functions).
//!
//! Thin wrapper over `reqwest`. Response parsing lives in free functions so
//! it can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::debug;

use super::{
    AuthProvider, AuthorityChecks, BackendError, Payer, PaymentGateway, PaymentStatus, PixPayment, Plan, Role,
    SubscriptionRecord, SubscriptionService, TrialGrant, User,
};
use crate::config::BackendConfig;

const USER_PATH: &str = "/auth/v1/user";
const RPC_HAS_ROLE: &str = "/rest/v1/rpc/has_role";
const RPC_SUBSCRIPTION_ACTIVE: &str = "/rest/v1/rpc/is_subscription_active";
const RPC_ACTIVATE_TRIAL: &str = "/rest/v1/rpc/activate_trial";
const FN_CREATE_PIX: &str = "/functions/v1/create-pix-payment";
const FN_PAYMENT_STATUS: &str = "/functions/v1/check-payment-status";
const FN_SYNC_SUBSCRIPTION: &str = "/functions/v1/sync-subscription";
const SUBSCRIPTIONS_TABLE: &str = "/rest/v1/subscriptions";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(BackendError::Status { status, body: text });
        }
        Ok(text)
    }

    /// User-scoped writes need a session token; the anon key is not enough.
    fn require_session(&self) -> Result<(), BackendError> {
        if self.access_token.is_some() { Ok(()) } else { Err(BackendError::Unauthenticated) }
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, BackendError> {
        debug!(path, "backend POST");
        self.send(self.request(Method::POST, path).json(body)).await
    }
}

#[async_trait]
impl AuthProvider for HttpBackend {
    async fn current_user(&self) -> Result<Option<User>, BackendError> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        match self.send(self.request(Method::GET, USER_PATH)).await {
            Ok(body) => parse_user(&body).map(Some),
            Err(BackendError::Status { status: 401 | 403, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AuthorityChecks for HttpBackend {
    async fn has_role(&self, user_id: &str, role: Role) -> Result<Option<bool>, BackendError> {
        let body = self
            .post_json(RPC_HAS_ROLE, &json!({ "_user_id": user_id, "_role": role.as_str() }))
            .await?;
        parse_flag(&body)
    }

    async fn is_subscription_active(&self, user_id: &str) -> Result<Option<bool>, BackendError> {
        let body = self
            .post_json(RPC_SUBSCRIPTION_ACTIVE, &json!({ "_user_id": user_id }))
            .await?;
        parse_flag(&body)
    }
}

#[derive(Serialize)]
struct CreatePixRequest<'a> {
    plan_id: &'a str,
    plan_name: &'a str,
    amount_cents: u64,
    user_id: &'a str,
    payer: &'a Payer,
}

#[async_trait]
impl PaymentGateway for HttpBackend {
    async fn create_pix_payment(&self, payer: &Payer, plan: &Plan, user_id: &str) -> Result<PixPayment, BackendError> {
        self.require_session()?;
        let request = CreatePixRequest {
            plan_id: &plan.id,
            plan_name: &plan.name,
            amount_cents: plan.amount_cents,
            user_id,
            payer,
        };
        let builder = self
            .request(Method::POST, FN_CREATE_PIX)
            .header("X-Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(&request);
        let body = self.send(builder).await?;
        parse_pix_payment(&body)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, BackendError> {
        let body = self
            .post_json(FN_PAYMENT_STATUS, &json!({ "payment_id": payment_id }))
            .await?;
        parse_payment_status(&body)
    }
}

#[async_trait]
impl SubscriptionService for HttpBackend {
    async fn sync_subscription(&self, user_id: &str) -> Result<(), BackendError> {
        self.require_session()?;
        self.post_json(FN_SYNC_SUBSCRIPTION, &json!({ "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn newest_active_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, BackendError> {
        let path = newest_subscription_path(user_id);
        let body = self.send(self.request(Method::GET, &path)).await?;
        parse_newest_subscription(&body)
    }

    async fn activate_trial(&self, user_id: &str) -> Result<TrialGrant, BackendError> {
        self.require_session()?;
        let body = self
            .post_json(RPC_ACTIVATE_TRIAL, &json!({ "_user_id": user_id }))
            .await?;
        parse_trial_grant(&body)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn newest_subscription_path(user_id: &str) -> String {
    format!(
        "{SUBSCRIPTIONS_TABLE}?select=plan_name,status,expires_at&user_id=eq.{user_id}&status=eq.active&order=expires_at.desc&limit=1"
    )
}

fn parse_user(body: &str) -> Result<User, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))
}

/// RPC booleans arrive as bare JSON `true`/`false`/`null`.
fn parse_flag(body: &str) -> Result<Option<bool>, BackendError> {
    let value: Value = serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))?;
    match value {
        Value::Bool(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        other => Err(BackendError::Parse(format!("expected boolean, got {other}"))),
    }
}

#[derive(Deserialize)]
struct PixPaymentWire {
    id: Value,
    qr_code: String,
    qr_code_base64: String,
}

fn parse_pix_payment(body: &str) -> Result<PixPayment, BackendError> {
    let wire: PixPaymentWire = serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))?;
    let id = match wire.id {
        Value::String(s) if !s.is_empty() => s,
        Value::Number(n) => n.to_string(),
        other => return Err(BackendError::Parse(format!("invalid payment id: {other}"))),
    };
    Ok(PixPayment { id, qr_code: wire.qr_code, qr_code_base64: wire.qr_code_base64 })
}

#[derive(Deserialize)]
struct PaymentStatusWire {
    status: String,
}

fn parse_payment_status(body: &str) -> Result<PaymentStatus, BackendError> {
    let wire: PaymentStatusWire = serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok(PaymentStatus::parse(&wire.status))
}

fn parse_newest_subscription(body: &str) -> Result<Option<SubscriptionRecord>, BackendError> {
    let rows: Vec<SubscriptionRecord> = serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok(rows.into_iter().max_by_key(|row| row.expires_at))
}

#[derive(Deserialize)]
struct TrialGrantWire {
    #[serde(default, with = "time::serde::rfc3339::option")]
    expires_at: Option<OffsetDateTime>,
}

fn parse_trial_grant(body: &str) -> Result<TrialGrant, BackendError> {
    let value: Value = serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))?;
    match value {
        Value::Bool(false) => Err(BackendError::Refused("trial not granted".into())),
        Value::Bool(true) | Value::Null => Ok(TrialGrant::default()),
        Value::Object(_) => {
            let wire: TrialGrantWire = serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;
            Ok(TrialGrant { expires_at: wire.expires_at })
        }
        other => Err(BackendError::Parse(format!("unexpected trial response: {other}"))),
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
