use chrono::{DateTime, Utc};

use super::error::AudioProcessingError;
use super::metrics::AudioMetrics;
use super::validation::StreamSettings;

/// Discriminant used to key per-type handler registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CaptureStarted,
    CaptureStopped,
    DeviceChanged,
    PermissionGranted,
    PermissionDenied,
    AudioLevelChanged,
    VoiceActivity,
    ProcessingError,
    MetricsUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStartedEvent {
    pub stream_id: String,
    pub track_id: String,
    pub settings: StreamSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStoppedEvent {
    pub stream_id: Option<String>,
    pub track_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceChangedEvent {
    pub device_id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrantedEvent {
    pub device_id: Option<String>,
    pub label: Option<String>,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDeniedEvent {
    pub reason: String,
    pub guidance: String,
    pub can_retry: bool,
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioLevelEvent {
    pub level: f32,
    pub peak: f32,
    pub rms: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceActivityEvent {
    pub is_voice_detected: bool,
    pub confidence: f32,
    pub threshold: f32,
    pub timestamp: DateTime<Utc>,
}

/// Typed events fanned out to registered listeners. Delivery is best-effort,
/// one-to-many, with handler failures isolated per dispatch.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    CaptureStarted(CaptureStartedEvent),
    CaptureStopped(CaptureStoppedEvent),
    DeviceChanged(DeviceChangedEvent),
    PermissionGranted(PermissionGrantedEvent),
    PermissionDenied(PermissionDeniedEvent),
    AudioLevelChanged(AudioLevelEvent),
    VoiceActivity(VoiceActivityEvent),
    ProcessingError(AudioProcessingError),
    MetricsUpdated(AudioMetrics),
}

impl CaptureEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CaptureStarted(_) => EventKind::CaptureStarted,
            Self::CaptureStopped(_) => EventKind::CaptureStopped,
            Self::DeviceChanged(_) => EventKind::DeviceChanged,
            Self::PermissionGranted(_) => EventKind::PermissionGranted,
            Self::PermissionDenied(_) => EventKind::PermissionDenied,
            Self::AudioLevelChanged(_) => EventKind::AudioLevelChanged,
            Self::VoiceActivity(_) => EventKind::VoiceActivity,
            Self::ProcessingError(_) => EventKind::ProcessingError,
            Self::MetricsUpdated(_) => EventKind::MetricsUpdated,
        }
    }
}
