use super::*;
use crate::backend::test_helpers::{MockBackend, test_user};

fn gate_with(backend: &Arc<MockBackend>, bus: &SyncBus) -> AccessGate {
    AccessGate::new(backend.clone(), RoutePolicy::default(), bus.clone())
}

// =============================================================
// Loading and refresh protocol
// =============================================================

#[tokio::test]
async fn loading_until_auth_answers() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    assert_eq!(gate.evaluate("/compra").await, Decision::Loading);
    assert_eq!(backend.check_calls(), (0, 0));
}

#[tokio::test]
async fn sign_in_triggers_one_refresh_of_both_flags() {
    let backend = Arc::new(MockBackend::with_flags(Ok(Some(false)), Ok(Some(true))));
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));
    assert!(gate.needs_refresh());

    assert_eq!(gate.evaluate("/compra").await, Decision::Render);
    assert_eq!(gate.evaluate("/estoque").await, Decision::Render);
    assert_eq!(backend.check_calls(), (1, 1));
    assert_eq!(gate.flags(), AccessFlags::new(false, true));
}

#[tokio::test]
async fn anonymous_does_not_fetch_flags() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(None);
    assert_eq!(gate.evaluate("/compra").await, Decision::RedirectLanding);
    assert_eq!(gate.evaluate("/login").await, Decision::Render);
    assert_eq!(backend.check_calls(), (0, 0));
}

#[tokio::test]
async fn failed_check_keeps_previous_value() {
    let backend = Arc::new(MockBackend::with_flags(Ok(Some(true)), Ok(Some(true))));
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));
    gate.refresh().await;
    assert_eq!(gate.flags(), AccessFlags::new(true, true));

    backend.set_flags(Err("timeout".into()), Ok(None));
    gate.request_recheck();
    gate.refresh().await;
    assert_eq!(gate.flags(), AccessFlags::new(true, true));
    assert!(!gate.needs_refresh());
}

#[tokio::test]
async fn failed_first_fetch_stays_unknown_and_closed() {
    let backend = Arc::new(MockBackend::with_flags(Err("down".into()), Ok(None)));
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));

    assert_eq!(gate.evaluate("/compra").await, Decision::RedirectHome);
    assert_eq!(gate.flags(), AccessFlags::default());
}

#[tokio::test]
async fn switching_user_resets_flags() {
    let backend = Arc::new(MockBackend::with_flags(Ok(Some(true)), Ok(Some(true))));
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));
    gate.refresh().await;

    gate.set_user(Some(User { id: "user-2".into(), email: None }));
    assert_eq!(gate.flags(), AccessFlags::default());
    assert!(gate.needs_refresh());

    gate.set_user(None);
    assert!(!gate.needs_refresh());
    assert_eq!(gate.evaluate("/").await, Decision::RedirectLanding);
}

#[tokio::test]
async fn switching_user_follows_the_new_users_events() {
    let backend = Arc::new(MockBackend::default());
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    gate.evaluate("/").await;

    gate.set_user(Some(User { id: "user-2".into(), email: None }));
    gate.evaluate("/").await;
    assert!(!gate.needs_refresh());

    bus.publish(SyncEvent::new("user-1", SyncKind::SubscriptionSynced));
    assert_eq!(gate.drain_events(), 0);
    assert!(!gate.needs_refresh());

    bus.publish(SyncEvent::new("user-2", SyncKind::SubscriptionSynced));
    assert_eq!(gate.drain_events(), 1);
    assert!(gate.needs_refresh());
}

// =============================================================
// Paywall and sync events
// =============================================================

#[tokio::test]
async fn home_without_plan_shows_paywall_and_subscription_route_redirects() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));

    assert_eq!(gate.evaluate("/").await, Decision::ShowPaywall);
    assert!(gate.paywall_visible());
    assert_eq!(gate.evaluate("/compra").await, Decision::RedirectHome);
}

#[tokio::test]
async fn trial_event_hides_paywall_and_refetches_once() {
    let backend = Arc::new(MockBackend::default());
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    assert_eq!(gate.evaluate("/").await, Decision::ShowPaywall);
    assert_eq!(backend.check_calls(), (1, 1));

    backend.set_flags(Ok(Some(false)), Ok(Some(true)));
    bus.publish(SyncEvent::new("user-1", SyncKind::TrialActivated));

    assert_eq!(gate.drain_events(), 1);
    assert!(!gate.paywall_visible());
    assert!(gate.needs_refresh());

    assert_eq!(gate.evaluate("/").await, Decision::Render);
    assert_eq!(backend.check_calls(), (2, 2));
    assert!(!gate.paywall_visible());
}

#[tokio::test]
async fn events_for_other_users_are_ignored() {
    let backend = Arc::new(MockBackend::default());
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    gate.evaluate("/").await;

    bus.publish(SyncEvent::new("someone-else", SyncKind::SubscriptionSynced));
    assert!(!gate.handle_event(&SyncEvent::new("someone-else", SyncKind::TrialActivated)));
    assert_eq!(gate.drain_events(), 0);
    assert!(gate.paywall_visible());
    assert!(!gate.needs_refresh());
}

#[tokio::test]
async fn each_sync_kind_bumps_recheck() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(Some(test_user()));
    let start = gate.recheck_seq();
    for kind in [
        SyncKind::SubscriptionSynced,
        SyncKind::TrialActivated,
        SyncKind::AdminSubscriptionCreated,
        SyncKind::AdminSubscriptionDeactivated,
    ] {
        assert!(gate.handle_event(&SyncEvent::new("user-1", kind)));
    }
    assert_eq!(gate.recheck_seq(), start + 4);
}

#[tokio::test]
async fn admin_deactivation_revokes_access_on_next_navigation() {
    let backend = Arc::new(MockBackend::with_flags(Ok(Some(false)), Ok(Some(true))));
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    assert_eq!(gate.evaluate("/venda").await, Decision::Render);

    backend.set_flags(Ok(Some(false)), Ok(Some(false)));
    bus.publish(SyncEvent::new("user-1", SyncKind::AdminSubscriptionDeactivated));
    assert_eq!(gate.evaluate("/venda").await, Decision::RedirectHome);
}

#[tokio::test(start_paused = true)]
async fn activate_trial_hides_paywall_and_schedules_recheck() {
    let backend = Arc::new(MockBackend::default());
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    assert_eq!(gate.evaluate("/").await, Decision::ShowPaywall);

    backend.set_flags(Ok(Some(false)), Ok(Some(true)));
    gate.activate_trial(backend.as_ref(), Duration::from_millis(1000)).await.unwrap();
    assert!(!gate.paywall_visible());
    assert!(!gate.needs_refresh());

    assert_eq!(gate.wait_for_event().await, Some(SyncKind::TrialActivated));
    assert!(gate.needs_refresh());
    assert_eq!(gate.evaluate("/compra").await, Decision::Render);
    assert_eq!(backend.check_calls(), (2, 2));
}

#[tokio::test]
async fn activate_trial_requires_user() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(None);
    let err = gate.activate_trial(backend.as_ref(), Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, PaywallError::NoUser));
}

#[tokio::test]
async fn on_event_redecides_with_fresh_flags() {
    let backend = Arc::new(MockBackend::default());
    let bus = SyncBus::new();
    let mut gate = gate_with(&backend, &bus);
    gate.set_user(Some(test_user()));
    assert_eq!(gate.evaluate("/").await, Decision::ShowPaywall);

    backend.set_flags(Ok(Some(false)), Ok(Some(true)));
    bus.publish(SyncEvent::new("user-1", SyncKind::SubscriptionSynced));

    assert_eq!(gate.on_event("/").await, Some((SyncKind::SubscriptionSynced, Decision::Render)));
    assert!(!gate.paywall_visible());
    assert_eq!(backend.check_calls(), (2, 2));
}

#[tokio::test]
async fn on_event_signed_out_returns_none() {
    let backend = Arc::new(MockBackend::default());
    let mut gate = gate_with(&backend, &SyncBus::new());
    gate.set_user(None);
    assert_eq!(gate.on_event("/").await, None);
}
