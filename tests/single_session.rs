//! Single-session lifecycle: startup sequence, shutdown policy, failures

mod common;

use common::{metrics, publisher, FakeFactory, FakeSession, RecordingListener};
use gateway_lifecycle::{
    Gateway, GatewayError, GatewayMode, Lifecycle, LifecycleEventKind, LifecycleState, Session,
    SessionStatus, SingleSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn manager_with(
    factory: Arc<FakeFactory>,
    listener: Arc<RecordingListener>,
) -> Arc<SingleSessionManager> {
    let publisher = publisher();
    publisher.register(listener);
    SingleSessionManager::new(factory, publisher, metrics())
}

#[tokio::test]
async fn start_publishes_semi_ready_then_ready() {
    let (factory, session) = FakeFactory::with_session(FakeSession::single().running_after(5));
    let listener = RecordingListener::new();
    let manager = manager_with(factory.clone(), listener.clone());

    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert!(!manager.is_running());

    assert_ok!(manager.start().await);

    assert_eq!(
        listener.kinds(),
        vec![LifecycleEventKind::SemiReady, LifecycleEventKind::Ready]
    );
    let states: Vec<_> = listener.observed().iter().map(|o| o.source_state).collect();
    assert_eq!(states, vec![LifecycleState::SemiReady, LifecycleState::Ready]);

    assert_eq!(manager.state(), LifecycleState::Ready);
    assert!(manager.is_running());
    assert_eq!(session.current_status(), SessionStatus::Ready);
    assert_eq!(factory.connects(), 1);
}

#[tokio::test]
async fn event_source_is_the_manager() {
    let factory = FakeFactory::new();
    let publisher = publisher();
    let manager = SingleSessionManager::new(factory, publisher.clone(), metrics());
    let mut events = publisher.subscribe();

    assert_ok!(manager.start().await);

    let semi_ready = events.recv().await.unwrap();
    assert_eq!(semi_ready.kind, LifecycleEventKind::SemiReady);
    assert_eq!(semi_ready.mode, GatewayMode::Single);
    assert_eq!(semi_ready.source().mode(), GatewayMode::Single);
    assert!(semi_ready.source().is_running());

    let ready = events.recv().await.unwrap();
    assert_eq!(ready.kind, LifecycleEventKind::Ready);
    assert_ne!(ready.id, semi_ready.id);
}

#[tokio::test]
async fn second_start_does_not_build_another_session() {
    let factory = FakeFactory::new();
    let listener = RecordingListener::new();
    let manager = manager_with(factory.clone(), listener.clone());

    assert_ok!(manager.start().await);
    assert_ok!(manager.start().await);

    assert_eq!(factory.connects(), 1);
    assert_eq!(listener.kinds().len(), 2);
}

#[tokio::test]
async fn readiness_interruption_is_not_fatal() {
    let (factory, _session) = FakeFactory::with_session(FakeSession::single().failing_ready());
    let listener = RecordingListener::new();
    let manager = manager_with(factory, listener.clone());

    assert_ok!(manager.start().await);

    assert_eq!(manager.state(), LifecycleState::Ready);
    assert_eq!(
        listener.kinds(),
        vec![LifecycleEventKind::SemiReady, LifecycleEventKind::Ready]
    );
}

#[tokio::test]
async fn session_dying_before_it_runs_fails_start() {
    let (factory, _session) =
        FakeFactory::with_session(FakeSession::single().with_status(SessionStatus::Dead));
    let listener = RecordingListener::new();
    let manager = manager_with(factory, listener.clone());

    let err = assert_err!(manager.start().await);
    assert!(matches!(
        err,
        GatewayError::SessionTerminated {
            status: SessionStatus::Dead
        }
    ));
    assert!(listener.kinds().is_empty());
    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert!(!manager.is_running());
}

#[tokio::test]
async fn connect_failure_leaves_manager_stopped() {
    let factory = FakeFactory::new();
    factory.fail_connect();
    let manager = manager_with(factory, RecordingListener::new());

    assert_err!(manager.start().await);
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn listener_error_aborts_start_and_releases_session() {
    let (factory, session) = FakeFactory::with_session(FakeSession::single());
    let listener = RecordingListener::failing_on(LifecycleEventKind::SemiReady);
    let manager = manager_with(factory, listener.clone());

    let err = assert_err!(manager.start().await);
    assert!(matches!(err, GatewayError::Config(_)));

    assert_eq!(listener.kinds(), vec![LifecycleEventKind::SemiReady]);
    assert!(session.shutdown_requested());
    assert!(!manager.is_running());
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (factory, session) = FakeFactory::with_session(FakeSession::single());
    let manager = manager_with(factory, RecordingListener::new());

    assert_ok!(manager.stop().await);
    assert!(!manager.is_running());

    assert_ok!(manager.start().await);
    assert_ok!(manager.stop().await);
    assert_ok!(manager.stop().await);

    assert!(!manager.is_running());
    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert!(session.shutdown_requested());
    assert!(!session.was_forced());
    assert!(manager.session().is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_session_after_grace_period() {
    let (factory, session) = FakeFactory::with_session(FakeSession::single().hanging_on_shutdown());
    let manager = manager_with(factory, RecordingListener::new());
    assert_ok!(manager.start().await);

    let started = tokio::time::Instant::now();
    assert_ok!(manager.stop().await);

    assert!(session.was_forced());
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(session.current_status(), SessionStatus::Shutdown);
    assert!(!manager.is_running());
}

#[tokio::test]
async fn close_releases_a_running_session() {
    let (factory, session) = FakeFactory::with_session(FakeSession::single());
    let manager = manager_with(factory, RecordingListener::new());
    assert_ok!(manager.start().await);

    assert_ok!(manager.close().await);

    assert!(session.shutdown_requested());
    assert!(!manager.is_running());
    assert_eq!(manager.state(), LifecycleState::Stopped);

    // Nothing left to release
    assert_ok!(manager.close().await);
}

#[tokio::test]
async fn start_after_stop_builds_a_new_session() {
    let factory = FakeFactory::new();
    let listener = RecordingListener::new();
    let manager = manager_with(factory.clone(), listener.clone());

    assert_ok!(manager.start().await);
    assert_ok!(manager.stop().await);
    assert_ok!(manager.start().await);

    assert_eq!(factory.connects(), 2);
    assert!(manager.is_running());
    assert_eq!(listener.kinds().len(), 4);
}

#[tokio::test]
async fn start_replaces_a_session_that_died() {
    let (factory, first) = FakeFactory::with_session(FakeSession::single());
    let listener = RecordingListener::new();
    let manager = manager_with(factory.clone(), listener.clone());
    assert_ok!(manager.start().await);

    first.shutdown_now();
    assert_eq!(manager.state(), LifecycleState::Ready);
    assert!(!manager.is_running());

    assert_ok!(manager.start().await);

    assert_eq!(factory.connects(), 2);
    assert!(manager.is_running());
    assert_eq!(first.current_status(), SessionStatus::Shutdown);
    let current = manager.session().unwrap();
    assert_eq!(current.status(), SessionStatus::Ready);
    assert_eq!(listener.kinds().len(), 4);
}

#[tokio::test]
async fn facade_reports_the_single_session() {
    let factory = FakeFactory::new();
    let manager = manager_with(factory, RecordingListener::new());

    assert!(manager.statuses().is_empty());
    assert_eq!(manager.shards_running(), 0);

    assert_ok!(manager.start().await);

    assert_eq!(manager.mode(), GatewayMode::Single);
    assert_eq!(manager.shards_total(), 1);
    assert_eq!(manager.shards_running(), 1);
    assert_eq!(manager.gateway_latency(), Some(Duration::from_millis(40)));

    let statuses = manager.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].1, SessionStatus::Ready);
}

#[tokio::test]
async fn state_changes_are_observable() {
    let factory = FakeFactory::new();
    let manager = manager_with(factory, RecordingListener::new());
    let mut state = manager.subscribe_state();

    assert_ok!(manager.start().await);
    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), LifecycleState::Ready);
}
