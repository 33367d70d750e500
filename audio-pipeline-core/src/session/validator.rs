//! Microphone device probing and failure classification.

use std::sync::Arc;

use crate::models::config::CaptureConfig;
use crate::models::error::{
    classify_platform_error, AudioProcessingError, ErrorCode, PlatformError,
};
use crate::models::validation::{DeviceValidationResult, StreamConstraints};
use crate::traits::device::MediaStreamCapability;
use crate::traits::environment::AudioEnvironment;

/// Stops the probe stream when dropped, so the scoped test acquisition is
/// released on every exit path.
struct ProbeStreamGuard(Arc<dyn MediaStreamCapability>);

impl Drop for ProbeStreamGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Probes device availability and negotiates a working microphone stream,
/// classifying failures into the validation subset of the error taxonomy.
pub struct DeviceValidator {
    environment: Arc<dyn AudioEnvironment>,
}

impl DeviceValidator {
    pub fn new(environment: Arc<dyn AudioEnvironment>) -> Self {
        Self { environment }
    }

    /// Validate `device_id` (or the default input device when `None`).
    ///
    /// Performs a short-lived test acquisition with the configured
    /// processing constraints; the probe stream is always released,
    /// including on failure paths.
    pub fn validate_device(
        &self,
        device_id: Option<&str>,
        config: &CaptureConfig,
    ) -> DeviceValidationResult {
        let devices = self.environment.devices();

        if !devices.can_enumerate() {
            // A surface without enumeration never grows one; retrying is
            // pointless, so the error is marked permanent.
            return DeviceValidationResult::invalid(
                device_id.map(str::to_owned),
                AudioProcessingError::validation(
                    ErrorCode::DeviceUnavailable,
                    "platform exposes no device enumeration capability",
                )
                .permanent(),
            );
        }

        let inputs = match devices.enumerate_inputs() {
            Ok(inputs) => inputs,
            Err(e) => {
                return DeviceValidationResult::invalid(
                    device_id.map(str::to_owned),
                    AudioProcessingError::validation(
                        ErrorCode::DeviceUnavailable,
                        format!("device enumeration failed: {e}"),
                    )
                    .with_cause(e.to_string()),
                );
            }
        };

        if inputs.is_empty() {
            return DeviceValidationResult::invalid(
                device_id.map(str::to_owned),
                AudioProcessingError::validation(
                    ErrorCode::DeviceNotFound,
                    "no audio input devices available",
                ),
            );
        }

        let selected = match device_id {
            Some(requested) => match inputs.iter().find(|d| d.id == requested) {
                Some(device) => device.clone(),
                None => {
                    return DeviceValidationResult::invalid(
                        Some(requested.to_owned()),
                        AudioProcessingError::validation(
                            ErrorCode::DeviceNotFound,
                            format!("requested device '{requested}' not found"),
                        ),
                    );
                }
            },
            None => inputs[0].clone(),
        };

        let constraints = StreamConstraints {
            device_id: Some(selected.id.clone()),
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            latency_hint: config.latency_hint,
        };

        match devices.acquire(&constraints) {
            Ok(stream) => {
                let probe = ProbeStreamGuard(stream);
                let settings = probe.0.settings();
                let capabilities = probe.0.capabilities();
                let label = probe.0.label().or(selected.label);
                DeviceValidationResult::valid(
                    selected.id,
                    label,
                    capabilities,
                    Some(settings),
                )
            }
            Err(e) => DeviceValidationResult::invalid(
                Some(selected.id),
                Self::classify_acquisition_failure(&e),
            ),
        }
    }

    /// Validation classifies test-acquisition failures into
    /// {PermissionDenied, DeviceNotFound, DeviceUnavailable} only; anything
    /// else the platform reports is treated as a transient device failure.
    fn classify_acquisition_failure(error: &PlatformError) -> AudioProcessingError {
        let code = match classify_platform_error(error) {
            code @ (ErrorCode::PermissionDenied | ErrorCode::DeviceNotFound) => code,
            _ => ErrorCode::DeviceUnavailable,
        };
        AudioProcessingError::validation(
            code,
            format!("device test acquisition failed: {error}"),
        )
        .with_cause(error.to_string())
    }
}

