use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::config::{CaptureConfig, ProcessingConfig};
use super::validation::PermissionStatus;

/// Suggested backoff before retrying a recoverable failure.
pub const RETRY_BACKOFF_MS: u64 = 1000;

/// Machine-readable failure taxonomy for the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    PermissionDenied,
    DeviceNotFound,
    DeviceUnavailable,
    StreamEnded,
    ContextSuspended,
    ProcessingGraphFailed,
    BufferUnderrun,
    UnsupportedConfiguration,
    ConfigurationInvalid,
}

impl ErrorCode {
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::DeviceUnavailable
                | Self::StreamEnded
                | Self::ContextSuspended
                | Self::ProcessingGraphFailed
                | Self::BufferUnderrun
        )
    }

    pub fn recommended_action(self) -> RecommendedAction {
        match self {
            Self::PermissionDenied => RecommendedAction::Prompt,
            Self::DeviceNotFound
            | Self::UnsupportedConfiguration
            | Self::ConfigurationInvalid => RecommendedAction::Fallback,
            _ => RecommendedAction::Retry,
        }
    }

    /// Severity derivation: recoverable codes warn, non-recoverable codes
    /// error, except a denied permission which is fatal to the session.
    pub fn severity(self) -> Severity {
        if self.is_recoverable() {
            Severity::Warning
        } else if self == Self::PermissionDenied {
            Severity::Fatal
        } else {
            Severity::Error
        }
    }

    /// Actionable user-facing guidance, surfaced instead of raw platform
    /// error strings.
    pub fn guidance(self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Microphone access was denied. Grant microphone permission in your system or browser settings, then try again."
            }
            Self::DeviceNotFound => {
                "No matching microphone was found. Connect a microphone or select a different input device."
            }
            Self::DeviceUnavailable => {
                "The microphone is busy or temporarily unreadable. Close other applications using it and retry."
            }
            Self::StreamEnded => {
                "The microphone stream ended unexpectedly. Reconnect the device and retry."
            }
            Self::ContextSuspended => {
                "Audio rendering was suspended. It will be resumed automatically; retry if capture does not recover."
            }
            Self::ProcessingGraphFailed => {
                "The audio processing graph could not be started. Retrying usually resolves this."
            }
            Self::BufferUnderrun => {
                "Audio buffering fell behind real time. Reduce system load or increase the buffer size."
            }
            Self::UnsupportedConfiguration => {
                "The requested audio configuration is not supported by this device. Falling back to defaults is recommended."
            }
            Self::ConfigurationInvalid => {
                "The capture configuration is invalid. Correct the configuration and try again."
            }
        }
    }

    fn retry_after_ms(self) -> Option<u64> {
        self.is_recoverable().then_some(RETRY_BACKOFF_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Prompt,
    Fallback,
    Retry,
}

/// Recovery contract attached to every structured error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryPlan {
    pub recoverable: bool,
    pub recommended_action: RecommendedAction,
    pub guidance: String,
    pub retry_after_ms: Option<u64>,
}

impl RecoveryPlan {
    pub fn for_code(code: ErrorCode) -> Self {
        Self {
            recoverable: code.is_recoverable(),
            recommended_action: code.recommended_action(),
            guidance: code.guidance().to_string(),
            retry_after_ms: code.retry_after_ms(),
        }
    }
}

/// Diagnostic snapshot attached to structured errors so failures can be
/// understood without re-deriving controller state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorContext {
    pub device_id: Option<String>,
    pub track_id: Option<String>,
    pub stream_id: Option<String>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
    pub buffer_size: Option<u32>,
    pub capture_config: Option<CaptureConfig>,
    pub processing_config: Option<ProcessingConfig>,
    pub can_enumerate_devices: Option<bool>,
    pub can_capture: Option<bool>,
    pub permission_status: Option<PermissionStatus>,
}

/// Structured error carrying code, severity, recoverability, and recovery
/// guidance. Immutable once constructed (builder methods consume self).
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct AudioProcessingError {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    pub recovery: RecoveryPlan,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
    pub cause: Option<String>,
}

impl AudioProcessingError {
    /// Build an error with severity and recovery derived from the taxonomy.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: code.severity(),
            recovery: RecoveryPlan::for_code(code),
            context: ErrorContext::default(),
            timestamp: Utc::now(),
            cause: None,
        }
    }

    /// Build a validation-context error. Within device validation the caller
    /// can always fall back to another device, so non-recoverable codes carry
    /// `Fallback`/`Error` rather than the session-level `Prompt`/`Fatal`.
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut error = Self::new(code, message);
        if !code.is_recoverable() {
            error.severity = Severity::Error;
            error.recovery.recommended_action = RecommendedAction::Fallback;
        }
        error
    }

    /// Mark the error non-recoverable regardless of its code's default.
    /// Used when the failure mode rules out a retry, such as a surface that
    /// cannot enumerate input devices at all.
    pub fn permanent(mut self) -> Self {
        self.recovery.recoverable = false;
        self.recovery.recommended_action = RecommendedAction::Fallback;
        self.recovery.retry_after_ms = None;
        if self.severity == Severity::Warning {
            self.severity = Severity::Error;
        }
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.recovery.recoverable
    }
}

/// Raw failure reported by a platform capability, before classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct PlatformError {
    /// Platform error name, e.g. `NotAllowedError` or `NotReadableError`.
    pub name: String,
    pub message: String,
}

impl PlatformError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Fixed name-to-code mapping for platform errors raised during device or
/// stream acquisition. Unknown names are treated as transient.
pub fn classify_platform_error(error: &PlatformError) -> ErrorCode {
    match error.name.as_str() {
        "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
            ErrorCode::PermissionDenied
        }
        "NotFoundError" | "DevicesNotFoundError" => ErrorCode::DeviceNotFound,
        "NotReadableError" | "TrackStartError" | "AbortError" => ErrorCode::DeviceUnavailable,
        "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
            ErrorCode::UnsupportedConfiguration
        }
        "TypeError" => ErrorCode::ConfigurationInvalid,
        _ => ErrorCode::DeviceUnavailable,
    }
}
