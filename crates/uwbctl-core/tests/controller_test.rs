#![allow(clippy::unwrap_used)]
// Integration tests for `RangingController` against a scriptable backend.

mod common;

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use tokio::time::timeout;

use uwbctl_backend::{Error as BackendError, RangingConfig};
use uwbctl_core::{
    CoreError, Profile, RangingController, RangingResults, Role, SessionConfig,
};

use common::{FakeBackend, ResolveCall, peer, position, settle};

// ── Helpers ─────────────────────────────────────────────────────────

fn setup() -> (FakeBackend, RangingController) {
    let backend = FakeBackend::new();
    let controller =
        RangingController::new(backend.shared(), "A|1111", SessionConfig::default()).unwrap();
    (backend, controller)
}

async fn next_result(results: &mut RangingResults) -> uwbctl_core::RangingEvent {
    let event = timeout(Duration::from_secs(1), results.next())
        .await
        .expect("timed out waiting for a ranging event")
        .expect("result stream ended");
    (*event).clone()
}

async fn assert_no_result(results: &mut RangingResults) {
    assert!(
        timeout(Duration::from_millis(50), results.next())
            .await
            .is_err(),
        "expected no further ranging events"
    );
}

// ── Construction ────────────────────────────────────────────────────

#[tokio::test]
async fn test_construction_resolves_initial_scope() {
    let (backend, controller) = setup();

    assert!(!controller.is_running());
    assert!(controller.is_resolved().await);
    assert_eq!(backend.resolve_count(), 1);

    let identity = controller.identity().await;
    assert_eq!(
        backend.last_resolve(),
        ResolveCall::Controller {
            local: identity.to_endpoint(),
            config: RangingConfig::UnicastDsTwr,
        }
    );
}

#[tokio::test]
async fn test_construction_rejects_unsupported_combination() {
    let backend = FakeBackend::new();
    let result = RangingController::new(
        backend.shared(),
        "A|1111",
        SessionConfig::new(Role::Responder, Profile::MulticastPrecision),
    );

    assert!(matches!(
        result,
        Err(CoreError::UnsupportedCombination { .. })
    ));
    assert_eq!(backend.resolve_count(), 0);
}

// ── Start / stop ────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_twice_keeps_a_single_run() {
    let (backend, controller) = setup();

    controller.start().await.unwrap();
    controller.start().await.unwrap();

    assert!(controller.is_running());
    assert_eq!(backend.sessions_opened(), 1);
    assert_eq!(backend.live_sessions(), 1);
}

#[tokio::test]
async fn test_stop_while_idle_is_a_no_op() {
    let (backend, controller) = setup();

    controller.stop().await;
    controller.stop().await;

    assert!(!controller.is_running());
    assert_eq!(backend.sessions_opened(), 0);
}

#[tokio::test]
async fn test_stop_releases_the_run_before_returning() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();
    assert_eq!(backend.live_sessions(), 1);

    controller.stop().await;

    assert_eq!(backend.live_sessions(), 0);
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_restart_opens_a_fresh_run() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();

    controller.start().await.unwrap();
    controller.stop().await;
    controller.start().await.unwrap();

    assert_eq!(backend.sessions_opened(), 2);
    assert_eq!(backend.live_sessions(), 1);

    assert!(backend.emit(position(2.0)));
    assert_eq!(next_result(&mut results).await, position(2.0));
}

#[tokio::test]
async fn test_running_flag_is_observable() {
    let (_backend, controller) = setup();
    let mut running = controller.watch_running();

    assert_eq!(running.next().await, Some(false));

    controller.start().await.unwrap();
    assert_eq!(running.next().await, Some(true));

    controller.stop().await;
    assert_eq!(running.next().await, Some(false));
}

// ── End-to-end ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_ranging_session() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    let mut running = controller.running_receiver();

    controller.start().await.unwrap();
    assert!(*running.borrow_and_update());

    assert!(backend.emit(position(1.25)));
    assert_eq!(next_result(&mut results).await, position(1.25));

    controller.stop().await;
    assert!(running.has_changed().unwrap());
    assert!(!*running.borrow_and_update());

    assert!(!backend.emit(position(9.0)));
    assert_no_result(&mut results).await;
}

#[tokio::test]
async fn test_slow_observer_sees_only_the_newest_event() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    controller.start().await.unwrap();

    backend.emit(position(1.0));
    backend.emit(position(2.0));
    backend.emit(position(3.0));
    settle().await;

    assert_eq!(next_result(&mut results).await, position(3.0));
    assert_no_result(&mut results).await;
}

#[tokio::test]
async fn test_observers_joining_late_get_no_history() {
    let (backend, controller) = setup();
    let mut early = controller.observe_ranging_results();
    controller.start().await.unwrap();

    backend.emit(position(1.0));
    assert_eq!(next_result(&mut early).await, position(1.0));

    let mut late = controller.observe_ranging_results();
    assert_no_result(&mut late).await;

    backend.emit(position(2.0));
    assert_eq!(next_result(&mut early).await, position(2.0));
    assert_eq!(next_result(&mut late).await, position(2.0));
}

// ── Reconfiguration ─────────────────────────────────────────────────

#[tokio::test]
async fn test_set_role_to_current_role_keeps_the_scope() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();

    controller.set_role(Role::Initiator).await.unwrap();

    assert_eq!(backend.resolve_count(), 1);
    assert!(controller.is_running());
    assert_eq!(backend.sessions_opened(), 1);
}

#[tokio::test]
async fn test_set_profile_restarts_without_leaking_old_events() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    controller.start().await.unwrap();

    // Buffered but not yet consumed when the profile changes.
    backend.emit(position(1.0));
    settle().await;

    controller
        .set_profile(Profile::MulticastPrecision)
        .await
        .unwrap();

    assert_eq!(backend.sessions_closed(), 1);
    assert_eq!(backend.resolve_count(), 2);
    assert!(matches!(
        backend.last_resolve(),
        ResolveCall::Controller {
            config: RangingConfig::MulticastDsTwr,
            ..
        }
    ));
    assert!(!controller.is_running());
    assert_no_result(&mut results).await;
}

#[tokio::test]
async fn test_set_role_resolves_responder_scope_and_stays_idle() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();
    let identity = controller.identity().await;

    controller.set_role(Role::Responder).await.unwrap();

    assert!(!controller.is_running());
    assert_eq!(backend.resolve_count(), 2);
    assert_eq!(
        backend.last_resolve(),
        ResolveCall::Controlee {
            local: identity.to_endpoint(),
        }
    );
    assert_eq!(
        controller.config().await,
        SessionConfig::new(Role::Responder, Profile::UnicastPrecision)
    );
}

#[tokio::test]
async fn test_unsupported_combination_leaves_controller_unresolved() {
    let (backend, controller) = setup();
    controller.set_role(Role::Responder).await.unwrap();
    controller.start().await.unwrap();

    let err = controller
        .set_profile(Profile::MulticastPrecision)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::UnsupportedCombination { .. }));
    assert!(!controller.is_running());
    assert!(!controller.is_resolved().await);
    assert_eq!(backend.live_sessions(), 0);
    assert!(matches!(
        controller.start().await,
        Err(CoreError::NotResolved)
    ));

    // Switching back to a valid profile recovers.
    controller
        .set_profile(Profile::UnicastPrecision)
        .await
        .unwrap();
    assert!(controller.is_resolved().await);
    controller.start().await.unwrap();
    assert!(controller.is_running());
}

#[tokio::test]
async fn test_set_config_restarts_once() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();

    controller
        .set_config(SessionConfig::new(Role::Responder, Profile::UnicastPrecision))
        .await
        .unwrap();

    assert_eq!(backend.resolve_count(), 2);
    assert_eq!(backend.sessions_closed(), 1);
}

// ── Identity ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_identity_with_same_id_is_a_no_op() {
    let (backend, controller) = setup();
    let before = controller.identity().await;

    controller.set_identity("A|1111").await.unwrap();

    assert_eq!(backend.resolve_count(), 1);
    assert_eq!(controller.identity().await, before);
}

#[tokio::test]
async fn test_set_identity_creates_a_new_generation() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();
    let before = controller.identity().await;

    controller.set_identity("A|2222").await.unwrap();

    let after = controller.identity().await;
    assert_eq!(after.id(), "A|2222");
    assert_ne!(after.token(), before.token());
    assert!(!controller.is_running());
    assert_eq!(backend.live_sessions(), 0);
    assert_eq!(backend.last_resolve().local(), &after.to_endpoint());
}

#[tokio::test]
async fn test_returning_to_a_previous_id_still_rotates_the_token() {
    let (backend, controller) = setup();
    let first = controller.identity().await;

    controller.set_identity("A|2222").await.unwrap();
    controller.set_identity("A|1111").await.unwrap();

    let again = controller.identity().await;
    assert_eq!(again.id(), first.id());
    assert_ne!(again.token(), first.token());
    assert_eq!(backend.resolve_count(), 3);
}

// ── Backend failures ────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_run_reconciles_to_idle_and_keeps_scope() {
    let (backend, controller) = setup();
    let mut running = controller.running_receiver();
    controller.start().await.unwrap();

    backend.fail(BackendError::SessionFailed {
        message: "radio reset".into(),
    });

    timeout(Duration::from_secs(1), running.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();
    assert!(controller.is_resolved().await);
    assert_eq!(backend.live_sessions(), 0);
    assert_eq!(backend.resolve_count(), 1);

    // An explicit start retries on the same scope.
    controller.start().await.unwrap();
    assert!(controller.is_running());
    assert_eq!(backend.sessions_opened(), 2);
}

#[tokio::test]
async fn test_backend_ending_the_run_marks_idle() {
    let (backend, controller) = setup();
    let mut running = controller.running_receiver();
    controller.start().await.unwrap();

    backend.finish();

    timeout(Duration::from_secs(1), running.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();
    controller.stop().await;
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_events_before_a_failure_are_still_delivered() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    let mut running = controller.running_receiver();
    controller.start().await.unwrap();

    assert!(backend.emit(position(4.0)));
    assert!(backend.fail(BackendError::SessionFailed {
        message: "radio reset".into(),
    }));
    timeout(Duration::from_secs(1), running.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(next_result(&mut results).await, position(4.0));
    assert_no_result(&mut results).await;
}

#[tokio::test]
async fn test_events_before_the_backend_finishes_are_still_delivered() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    let mut running = controller.running_receiver();
    controller.start().await.unwrap();

    assert!(backend.emit(position(2.5)));
    backend.finish();
    timeout(Duration::from_secs(1), running.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(next_result(&mut results).await, position(2.5));
}

#[tokio::test]
async fn test_reconfiguring_after_a_natural_end_drops_the_unread_tail() {
    let (backend, controller) = setup();
    let mut results = controller.observe_ranging_results();
    let mut running = controller.running_receiver();
    controller.start().await.unwrap();

    assert!(backend.emit(position(4.0)));
    backend.finish();
    timeout(Duration::from_secs(1), running.wait_for(|r| !*r))
        .await
        .unwrap()
        .unwrap();

    controller.set_role(Role::Responder).await.unwrap();
    assert_no_result(&mut results).await;
}

#[tokio::test]
async fn test_scope_refusal_is_reported_as_backend_error() {
    let (backend, controller) = setup();
    backend.refuse_scopes_with(Some(BackendError::Unavailable("radio off".into())));

    let err = controller.set_role(Role::Responder).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Backend(BackendError::Unavailable(_))
    ));
    assert!(!controller.is_resolved().await);

    backend.refuse_scopes_with(None);
    controller.set_role(Role::Responder).await.unwrap();
    assert!(controller.is_resolved().await);
}

// ── Out-of-band messaging ───────────────────────────────────────────

#[tokio::test]
async fn test_send_out_of_band_goes_through_current_scope() {
    let (backend, controller) = setup();

    controller
        .send_out_of_band(&peer(), Bytes::from_static(b"hello"))
        .await
        .unwrap();

    assert_eq!(
        backend.sent_messages(),
        vec![(peer(), Bytes::from_static(b"hello"))]
    );
}

#[tokio::test]
async fn test_send_out_of_band_surfaces_backend_failures() {
    let (backend, controller) = setup();
    backend.fail_sends_with(BackendError::PeerUnreachable {
        peer: "B|2222".into(),
    });

    let err = controller
        .send_out_of_band(&peer(), Bytes::from_static(b"hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Backend(BackendError::PeerUnreachable { .. })
    ));
}

#[tokio::test]
async fn test_send_out_of_band_without_scope_is_not_resolved() {
    let (_backend, controller) = setup();
    controller.shutdown().await;

    let err = controller
        .send_out_of_band(&peer(), Bytes::from_static(b"hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NotResolved));
}

#[tokio::test]
async fn test_hanging_send_does_not_block_stop_or_reconfiguration() {
    let (backend, controller) = setup();
    controller.start().await.unwrap();
    backend.hang_sends();

    let sender = controller.clone();
    let send = tokio::spawn(async move {
        sender
            .send_out_of_band(&peer(), Bytes::from_static(b"hello"))
            .await
    });
    settle().await;

    timeout(Duration::from_secs(1), controller.stop())
        .await
        .expect("stop waited on a pending send");
    timeout(Duration::from_secs(1), controller.set_role(Role::Responder))
        .await
        .expect("set_role waited on a pending send")
        .unwrap();

    assert!(!controller.is_running());
    assert!(!send.is_finished());
    send.abort();
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutators_never_leave_a_zombie_run() {
    let (backend, controller) = setup();

    let mut handles = Vec::new();
    for i in 0..16 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            controller.start().await.unwrap();
            if i % 2 == 0 {
                controller.set_identity(format!("A|{i}")).await.unwrap();
            } else {
                controller.stop().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    controller.stop().await;
    assert!(!controller.is_running());
    assert_eq!(backend.live_sessions(), 0);
}
