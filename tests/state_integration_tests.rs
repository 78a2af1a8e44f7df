//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits change events for every observable field
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple tasks
//! - Applies the fix and failure rules consistently

use georank::services::GeolocationError;
use georank::{GeoStateChange, PermissionState, Position, StateManager};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

const THRESHOLD: f64 = 0.0001;

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<GeoStateChange>) -> GeoStateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_fix_emits_position_and_acquisition_events() {
    let state = StateManager::new();
    state.begin_acquisition();
    let mut rx = state.subscribe();

    state.record_fix(Position::from_hardware(59.437, 24.7536, Some(8.0)), THRESHOLD);

    let mut events = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        events.push(event);
    }

    assert!(
        events
            .iter()
            .any(|e| matches!(e, GeoStateChange::PositionChanged { position } if position.lat == 59.437)),
        "Expected PositionChanged, got: {:?}",
        events
    );
    assert!(events.contains(&GeoStateChange::AcquisitionFinished));
    assert!(events.contains(&GeoStateChange::PermissionChanged {
        state: PermissionState::Granted
    }));
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.set_permission_prompt(true);

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        assert_eq!(
            next_event(rx).await,
            GeoStateChange::PermissionPromptChanged { visible: true }
        );
    }
}

#[tokio::test]
async fn test_unchanged_update_emits_nothing() {
    let state = StateManager::new();
    state.set_manual_override(true);
    let mut rx = state.subscribe();

    let changes = state.set_manual_override(true);

    assert!(changes.is_empty());
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_jitter_fix_changes_no_position() {
    let state = StateManager::new();
    state.record_fix(Position::from_hardware(10.0, 20.0, None), THRESHOLD);
    let mut rx = state.subscribe();

    let current = state.record_fix(Position::from_hardware(10.00005, 20.00005, None), THRESHOLD);

    assert_eq!(current.lat, 10.0);
    assert_eq!(current.lng, 20.0);
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        assert!(
            !matches!(event, GeoStateChange::PositionChanged { .. }),
            "Sub-threshold fix must not move the position"
        );
    }
}

#[tokio::test]
async fn test_degraded_and_recovered_events() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    for _ in 0..3 {
        state.record_failure(&GeolocationError::Timeout, 3);
    }

    let mut degraded = None;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        if let GeoStateChange::ServiceDegraded {
            consecutive_failures,
        } = event
        {
            degraded = Some(consecutive_failures);
        }
    }
    assert_eq!(degraded, Some(3));
    assert!(state.read(|s| s.is_degraded));

    state.record_fix(Position::from_hardware(1.0, 1.0, None), THRESHOLD);

    let mut recovered = false;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        recovered |= event == GeoStateChange::ServiceRecovered;
    }
    assert!(recovered);
    assert_eq!(state.read(|s| s.retry.attempt_count), 0);
}

#[tokio::test]
async fn test_denial_does_not_degrade() {
    let state = StateManager::new();

    for _ in 0..5 {
        state.record_failure(&GeolocationError::PermissionDenied, 3);
    }

    let snapshot = state.snapshot();
    assert!(!snapshot.is_degraded);
    assert_eq!(snapshot.permission, PermissionState::Denied);
    assert_eq!(snapshot.retry.attempt_count, 5);
}

#[tokio::test]
async fn test_clear_position_keeps_permission() {
    let state = StateManager::new();
    state.record_fix(Position::from_hardware(1.0, 2.0, None), THRESHOLD);
    let mut rx = state.subscribe();

    state.clear_position();

    assert_eq!(next_event(&mut rx).await, GeoStateChange::PositionCleared);
    let snapshot = state.snapshot();
    assert!(!snapshot.has_position());
    assert_eq!(snapshot.permission, PermissionState::Granted);
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let state = Arc::new(StateManager::new());
    let mut handles = vec![];

    for i in 0..10 {
        let state_clone = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            for j in 0..10 {
                state_clone.record_fix(
                    Position::from_hardware(i as f64, j as f64, None),
                    THRESHOLD,
                );
                let _ = state_clone.read(|s| s.position);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = state.snapshot();
    assert!(snapshot.has_position());
    assert!(!snapshot.is_acquiring);
    assert_eq!(snapshot.retry.attempt_count, 0);
}
