use std::sync::Arc;

use crate::models::error::PlatformError;
use crate::models::validation::{
    DeviceCapabilities, InputDeviceInfo, PermissionStatus, StreamConstraints, StreamSettings,
};

/// A live microphone stream handed out by the platform.
///
/// Implementations must make `stop` idempotent: disposal paths call it
/// unconditionally.
pub trait MediaStreamCapability: Send + Sync {
    fn id(&self) -> String;
    fn track_id(&self) -> String;
    fn label(&self) -> Option<String>;

    /// Settings the platform actually granted, which may differ from the
    /// requested constraints (notably the sample rate).
    fn settings(&self) -> StreamSettings;

    fn capabilities(&self) -> Option<DeviceCapabilities>;

    /// Whether the underlying track is still delivering audio.
    fn is_live(&self) -> bool;

    /// Stop every track on the stream and release the device.
    fn stop(&self);
}

/// Capability-gated device enumeration and stream acquisition surface.
///
/// The pipeline never touches platform audio APIs directly; production
/// backends and in-memory fakes both implement this trait.
pub trait DeviceCapability: Send + Sync {
    /// Whether the platform exposes device enumeration at all.
    fn can_enumerate(&self) -> bool;

    /// Whether the platform exposes microphone capture at all.
    fn can_capture(&self) -> bool;

    fn enumerate_inputs(&self) -> Result<Vec<InputDeviceInfo>, PlatformError>;

    fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn MediaStreamCapability>, PlatformError>;

    /// Best-effort permission probe. Platforms without a permission API
    /// report [`PermissionStatus::Unsupported`] rather than failing.
    fn query_permission(&self) -> PermissionStatus;
}
