use serde::Serialize;

use super::config::LatencyHint;
use super::error::AudioProcessingError;

/// Cached microphone permission state, refreshed best-effort before each
/// acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Unknown,
    Granted,
    Denied,
    Prompt,
    /// Platform cannot report permission state; acquisition proceeds anyway.
    Unsupported,
}

/// One enumerated audio-input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub id: String,
    pub label: Option<String>,
    pub is_default: bool,
}

/// Settings actually granted for an acquired stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

/// Ranges a device reports it can operate within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    pub max_channel_count: u16,
}

/// Constraints requested from the device capability when acquiring a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConstraints {
    /// When set, the platform must match this device id exactly.
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub latency_hint: LatencyHint,
}

/// Outcome of one `validate_device` call. Never persisted.
#[derive(Debug, Clone)]
pub struct DeviceValidationResult {
    pub is_valid: bool,
    pub device_id: Option<String>,
    pub label: Option<String>,
    pub capabilities: Option<DeviceCapabilities>,
    pub settings: Option<StreamSettings>,
    pub error: Option<AudioProcessingError>,
}

impl DeviceValidationResult {
    pub fn valid(
        device_id: String,
        label: Option<String>,
        capabilities: Option<DeviceCapabilities>,
        settings: Option<StreamSettings>,
    ) -> Self {
        Self {
            is_valid: true,
            device_id: Some(device_id),
            label,
            capabilities,
            settings,
            error: None,
        }
    }

    pub fn invalid(device_id: Option<String>, error: AudioProcessingError) -> Self {
        Self {
            is_valid: false,
            device_id,
            label: None,
            capabilities: None,
            settings: None,
            error: Some(error),
        }
    }
}
