//! Scriptable in-memory backend shared by gate, paywall and checkout tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::macros::datetime;

use super::*;

pub type FlagResult = Result<Option<bool>, String>;

pub struct MockBackend {
    pub user: Mutex<Option<User>>,
    pub admin: Mutex<FlagResult>,
    pub subscription: Mutex<FlagResult>,
    pub create_result: Mutex<Result<PixPayment, String>>,
    /// Statuses returned by successive polls; the last one repeats.
    pub statuses: Mutex<VecDeque<Result<PaymentStatus, String>>>,
    pub newest: Mutex<Option<SubscriptionRecord>>,
    pub trial_result: Mutex<Result<TrialGrant, String>>,

    pub role_calls: AtomicUsize,
    pub subscription_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub newest_calls: AtomicUsize,
    pub trial_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            user: Mutex::new(Some(test_user())),
            admin: Mutex::new(Ok(Some(false))),
            subscription: Mutex::new(Ok(Some(false))),
            create_result: Mutex::new(Ok(test_payment())),
            statuses: Mutex::new(VecDeque::from([Ok(PaymentStatus::Pending)])),
            newest: Mutex::new(Some(test_subscription())),
            trial_result: Mutex::new(Ok(TrialGrant::default())),
            role_calls: AtomicUsize::new(0),
            subscription_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            newest_calls: AtomicUsize::new(0),
            trial_calls: AtomicUsize::new(0),
        }
    }
}

impl MockBackend {
    pub fn with_flags(admin: FlagResult, subscription: FlagResult) -> Self {
        let mock = Self::default();
        mock.set_flags(admin, subscription);
        mock
    }

    pub fn set_flags(&self, admin: FlagResult, subscription: FlagResult) {
        *self.admin.lock().unwrap() = admin;
        *self.subscription.lock().unwrap() = subscription;
    }

    pub fn script_statuses(&self, statuses: Vec<Result<PaymentStatus, String>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn check_calls(&self) -> (usize, usize) {
        (self.role_calls.load(Ordering::SeqCst), self.subscription_calls.load(Ordering::SeqCst))
    }
}

pub fn test_user() -> User {
    User { id: "user-1".into(), email: Some("dono@sucata.test".into()) }
}

pub fn test_payment() -> PixPayment {
    PixPayment { id: "pay-1".into(), qr_code: "00020126pix".into(), qr_code_base64: "iVBORw0KGgo=".into() }
}

pub fn test_plan() -> Plan {
    Plan { id: "mensal".into(), name: "Plano Mensal".into(), amount_cents: 4990 }
}

pub fn test_subscription() -> SubscriptionRecord {
    SubscriptionRecord {
        plan_name: "Plano Mensal".into(),
        status: "active".into(),
        expires_at: datetime!(2026-11-15 00:00:00 UTC),
    }
}

fn to_backend<T>(result: Result<T, String>) -> Result<T, BackendError> {
    result.map_err(BackendError::Request)
}

#[async_trait]
impl AuthProvider for MockBackend {
    async fn current_user(&self) -> Result<Option<User>, BackendError> {
        Ok(self.user.lock().unwrap().clone())
    }
}

#[async_trait]
impl AuthorityChecks for MockBackend {
    async fn has_role(&self, _user_id: &str, _role: Role) -> Result<Option<bool>, BackendError> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        to_backend(self.admin.lock().unwrap().clone())
    }

    async fn is_subscription_active(&self, _user_id: &str) -> Result<Option<bool>, BackendError> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        to_backend(self.subscription.lock().unwrap().clone())
    }
}

#[async_trait]
impl PaymentGateway for MockBackend {
    async fn create_pix_payment(&self, _payer: &Payer, _plan: &Plan, _user_id: &str) -> Result<PixPayment, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        to_backend(self.create_result.lock().unwrap().clone())
    }

    async fn payment_status(&self, _payment_id: &str) -> Result<PaymentStatus, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 { statuses.pop_front() } else { statuses.front().cloned() };
        to_backend(next.unwrap_or(Ok(PaymentStatus::Pending)))
    }
}

#[async_trait]
impl SubscriptionService for MockBackend {
    async fn sync_subscription(&self, _user_id: &str) -> Result<(), BackendError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn newest_active_subscription(&self, _user_id: &str) -> Result<Option<SubscriptionRecord>, BackendError> {
        self.newest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.newest.lock().unwrap().clone())
    }

    async fn activate_trial(&self, _user_id: &str) -> Result<TrialGrant, BackendError> {
        self.trial_calls.fetch_add(1, Ordering::SeqCst);
        to_backend(self.trial_result.lock().unwrap().clone())
    }
}
