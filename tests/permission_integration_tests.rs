//! Integration tests for permission tracking and service initialization
//!
//! These tests verify:
//! - The iOS probe correction when the permission API reports `prompt`
//! - Initialization in each permission state
//! - The deferred safety check that surfaces the permission prompt
//! - Re-initialization when the platform reports a permission change

use georank::models::GeoConfig;
use georank::platform::{
    LocationHardware, PermissionQuery, Platform, PlatformFamily, PositionErrorCode,
    ScriptedHardware, ScriptedPermission,
};
use georank::services::{AcquireOptions, GeolocationError, GeolocationService, PlatformError};
use georank::{GeoStateChange, PermissionState};
use std::sync::Arc;
use tokio::time::{Duration, sleep, timeout};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

fn build(
    hardware: &Arc<ScriptedHardware>,
    permission: &Arc<ScriptedPermission>,
    family: PlatformFamily,
) -> GeolocationService {
    let platform = Platform {
        hardware: Some(Arc::clone(hardware) as Arc<dyn LocationHardware>),
        permissions: Some(Arc::clone(permission) as Arc<dyn PermissionQuery>),
        family,
    };
    GeolocationService::new(&GeoConfig::default(), platform)
}

#[tokio::test]
async fn test_ios_probe_denial_reads_as_prompt() {
    let hardware = Arc::new(ScriptedHardware::with_fix(59.437, 24.7536, None));
    hardware.push_error(PositionErrorCode::PermissionDenied);
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Prompt));
    let service = build(
        &hardware,
        &permission,
        PlatformFamily::from_user_agent(IPHONE_UA),
    );

    assert_eq!(service.check_permission().await, PermissionState::Prompt);
    assert!(!service.is_permission_denied());
    assert_eq!(hardware.call_count(), 1);

    // A gesture-driven request still reaches the hardware and succeeds
    let position = service.request_permission().await.unwrap();
    assert_eq!(position.lat, 59.437);
    assert_eq!(service.snapshot().permission, PermissionState::Granted);

    service.stop();
}

#[tokio::test]
async fn test_ios_probe_success_reads_as_granted() {
    let hardware = Arc::new(ScriptedHardware::with_fix(1.0, 2.0, None));
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Prompt));
    let service = build(&hardware, &permission, PlatformFamily::Ios);

    assert_eq!(service.check_permission().await, PermissionState::Granted);
}

#[tokio::test]
async fn test_failing_query_initializes_with_prompt() {
    let hardware = Arc::new(ScriptedHardware::new());
    let permission = Arc::new(ScriptedPermission::failing(PlatformError::UnsupportedName(
        "geolocation".to_string(),
    )));
    let service = build(&hardware, &permission, PlatformFamily::Desktop);

    assert_eq!(
        service.initialize_with_permission_check().await,
        PermissionState::Unknown
    );
    assert!(service.show_permission_prompt());
    assert_eq!(hardware.call_count(), 0);
}

#[tokio::test]
async fn test_unsupported_platform() {
    let service = GeolocationService::new(&GeoConfig::default(), Platform::unsupported());

    assert_eq!(
        service.initialize_with_permission_check().await,
        PermissionState::Unknown
    );
    assert!(service.show_permission_prompt());

    let err = service
        .get_position(false, AcquireOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, GeolocationError::Unsupported);
    assert_eq!(
        service.last_error().as_deref(),
        Some("Location services are not supported on this device.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_safety_check_shows_prompt_when_no_position() {
    // Granted, but the hardware never produces a fix
    let hardware = Arc::new(ScriptedHardware::new());
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Granted));
    let service = build(&hardware, &permission, PlatformFamily::Android);

    service.initialize_with_permission_check().await;
    assert!(!service.show_permission_prompt());
    assert!(service.last_error().is_some());

    sleep(Duration::from_millis(1100)).await;

    assert!(service.show_permission_prompt());
    service.stop();
}

#[tokio::test(start_paused = true)]
async fn test_safety_check_leaves_prompt_hidden_with_position() {
    let hardware = Arc::new(ScriptedHardware::with_fix(1.0, 2.0, None));
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Granted));
    let service = build(&hardware, &permission, PlatformFamily::Android);

    service.initialize_with_permission_check().await;
    sleep(Duration::from_millis(1100)).await;

    assert!(!service.show_permission_prompt());
    assert!(service.position().is_some());
    service.stop();
}

#[tokio::test(start_paused = true)]
async fn test_safety_check_respects_denial() {
    let hardware = Arc::new(ScriptedHardware::new());
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Denied));
    let service = build(&hardware, &permission, PlatformFamily::Desktop);

    service.initialize_with_permission_check().await;
    sleep(Duration::from_millis(1100)).await;

    assert!(!service.show_permission_prompt());
    assert!(service.is_permission_denied());
}

#[tokio::test]
async fn test_permission_change_reinitializes() {
    let hardware = Arc::new(ScriptedHardware::with_fix(59.437, 24.7536, Some(20.0)));
    let permission = Arc::new(ScriptedPermission::new(PermissionState::Prompt));
    let service = build(&hardware, &permission, PlatformFamily::Desktop);

    service.initialize_with_permission_check().await;
    assert!(service.show_permission_prompt());
    assert!(service.position().is_none());

    let mut rx = service.subscribe();
    permission.set_state(PermissionState::Granted);

    // Wait for the re-initialization to acquire a position
    let changed = timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Ok(GeoStateChange::PositionChanged { position }) => break position,
                Ok(_) => continue,
                Err(e) => panic!("Channel error: {:?}", e),
            }
        }
    })
    .await
    .expect("Timeout waiting for re-initialization");

    tokio::task::yield_now().await;

    assert_eq!(changed.lat, 59.437);
    assert!(!service.show_permission_prompt());
    assert!(service.is_refreshing());

    // The listener is registered once, however often initialization runs
    assert_eq!(permission.listener_count(), 1);
    assert_eq!(permission.query_count(), 2);

    service.stop();
}
