//! Device validation against the scriptable device fakes.

use std::sync::Arc;

use audio_pipeline_core::{
    AudioEnvironment, CaptureConfig, DeviceValidator, ErrorCode, PlatformError, RecommendedAction,
    Severity,
};
use audio_pipeline_testkit::MockEnvironment;

fn validator_for(env: &Arc<MockEnvironment>) -> DeviceValidator {
    DeviceValidator::new(Arc::clone(env) as Arc<dyn AudioEnvironment>)
}

#[test]
fn missing_enumeration_capability_is_a_permanent_failure() {
    let env = MockEnvironment::with_default_device();
    env.devices.set_enumeration_supported(false);

    let result = validator_for(&env).validate_device(None, &CaptureConfig::default());

    assert!(!result.is_valid);
    let error = result.error.unwrap();
    assert_eq!(error.code, ErrorCode::DeviceUnavailable);
    // No enumeration surface means no retry will ever succeed.
    assert!(!error.is_recoverable());
    assert_eq!(error.severity, Severity::Error);
    assert_eq!(error.recovery.recommended_action, RecommendedAction::Fallback);
    assert_eq!(error.recovery.retry_after_ms, None);
}

#[test]
fn empty_device_list_reports_not_found() {
    let env = MockEnvironment::new();
    let result = validator_for(&env).validate_device(None, &CaptureConfig::default());
    assert!(!result.is_valid);
    assert_eq!(result.error.unwrap().code, ErrorCode::DeviceNotFound);
}

#[test]
fn unknown_requested_device_reports_not_found() {
    let env = MockEnvironment::with_default_device();
    let result = validator_for(&env).validate_device(Some("ghost"), &CaptureConfig::default());
    assert!(!result.is_valid);
    assert_eq!(result.device_id.as_deref(), Some("ghost"));
    assert_eq!(result.error.unwrap().code, ErrorCode::DeviceNotFound);
}

#[test]
fn valid_device_reports_settings_and_releases_probe() {
    let env = MockEnvironment::with_default_device();
    let result = validator_for(&env).validate_device(None, &CaptureConfig::default());

    assert!(result.is_valid);
    assert_eq!(result.device_id.as_deref(), Some("default-mic"));
    assert_eq!(result.label.as_deref(), Some("Built-in Microphone"));
    assert_eq!(result.settings.unwrap().sample_rate, 24000);
    assert!(result.capabilities.is_some());

    // The test acquisition never outlives validation.
    let streams = env.devices.acquired_streams();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].stopped());
}

#[test]
fn busy_device_is_a_recoverable_validation_failure() {
    let env = MockEnvironment::with_default_device();
    env.devices
        .push_acquire_failure(PlatformError::new("NotReadableError", "device in use"));

    let result = validator_for(&env).validate_device(None, &CaptureConfig::default());

    assert!(!result.is_valid);
    let error = result.error.unwrap();
    assert_eq!(error.code, ErrorCode::DeviceUnavailable);
    assert!(error.is_recoverable());
    assert_eq!(error.recovery.recommended_action, RecommendedAction::Retry);
}

#[test]
fn acquisition_failures_classify_into_the_validation_subset() {
    let env = MockEnvironment::with_default_device();
    let validator = validator_for(&env);
    let config = CaptureConfig::default();

    env.devices
        .push_acquire_failure(PlatformError::new("NotAllowedError", "denied"));
    let error = validator.validate_device(None, &config).error.unwrap();
    assert_eq!(error.code, ErrorCode::PermissionDenied);
    assert!(!error.is_recoverable());
    assert_eq!(error.recovery.recommended_action, RecommendedAction::Fallback);

    // Codes outside the validation subset collapse to DeviceUnavailable.
    env.devices
        .push_acquire_failure(PlatformError::new("OverconstrainedError", "rate unsupported"));
    let error = validator.validate_device(None, &config).error.unwrap();
    assert_eq!(error.code, ErrorCode::DeviceUnavailable);

    env.devices
        .push_acquire_failure(PlatformError::new("TypeError", "bad constraints"));
    let error = validator.validate_device(None, &config).error.unwrap();
    assert_eq!(error.code, ErrorCode::DeviceUnavailable);
}
