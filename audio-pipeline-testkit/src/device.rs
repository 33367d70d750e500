//! Scriptable device enumeration, acquisition, and stream fakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use audio_pipeline_core::models::error::PlatformError;
use audio_pipeline_core::models::validation::{
    DeviceCapabilities, InputDeviceInfo, PermissionStatus, StreamConstraints, StreamSettings,
};
use audio_pipeline_core::traits::device::{DeviceCapability, MediaStreamCapability};

/// A fake acquired microphone stream. Track and stream ids are fresh UUIDs
/// per acquisition.
pub struct MockMediaStream {
    id: String,
    track_id: String,
    label: Option<String>,
    settings: StreamSettings,
    stopped: AtomicBool,
}

impl MockMediaStream {
    fn new(settings: StreamSettings, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            track_id: Uuid::new_v4().to_string(),
            label,
            settings,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaStreamCapability for MockMediaStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn track_id(&self) -> String {
        self.track_id.clone()
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn settings(&self) -> StreamSettings {
        self.settings.clone()
    }

    fn capabilities(&self) -> Option<DeviceCapabilities> {
        Some(DeviceCapabilities {
            min_sample_rate: 8000,
            max_sample_rate: 48000,
            max_channel_count: 2,
        })
    }

    fn is_live(&self) -> bool {
        !self.stopped()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Scriptable [`DeviceCapability`]. Queued acquisition failures are consumed
/// one per `acquire` call before any stream is handed out.
pub struct MockDeviceCapability {
    enumeration_supported: AtomicBool,
    capture_supported: AtomicBool,
    devices: Mutex<Vec<InputDeviceInfo>>,
    /// Queue of `(successful calls to skip, failure)` entries.
    acquire_failures: Mutex<Vec<(usize, PlatformError)>>,
    granted_sample_rate: Mutex<Option<u32>>,
    permission: Mutex<PermissionStatus>,
    acquired: Mutex<Vec<Arc<MockMediaStream>>>,
}

impl MockDeviceCapability {
    pub fn new() -> Self {
        Self {
            enumeration_supported: AtomicBool::new(true),
            capture_supported: AtomicBool::new(true),
            devices: Mutex::new(Vec::new()),
            acquire_failures: Mutex::new(Vec::new()),
            granted_sample_rate: Mutex::new(None),
            permission: Mutex::new(PermissionStatus::Granted),
            acquired: Mutex::new(Vec::new()),
        }
    }

    pub fn set_enumeration_supported(&self, supported: bool) {
        self.enumeration_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_capture_supported(&self, supported: bool) {
        self.capture_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_devices(&self, devices: Vec<InputDeviceInfo>) {
        *self.devices.lock() = devices;
    }

    /// Queue a platform failure; the next `acquire` consumes it.
    pub fn push_acquire_failure(&self, error: PlatformError) {
        self.acquire_failures.lock().push((0, error));
    }

    /// Queue a failure that triggers only after `skip` further successful
    /// acquisitions, e.g. to let a validation probe pass and fail the real
    /// acquisition.
    pub fn push_acquire_failure_after(&self, skip: usize, error: PlatformError) {
        self.acquire_failures.lock().push((skip, error));
    }

    /// Force every subsequent acquisition to grant this rate regardless of
    /// the requested constraints.
    pub fn set_granted_sample_rate(&self, sample_rate: u32) {
        *self.granted_sample_rate.lock() = Some(sample_rate);
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        *self.permission.lock() = status;
    }

    /// Every stream handed out so far, in acquisition order.
    pub fn acquired_streams(&self) -> Vec<Arc<MockMediaStream>> {
        self.acquired.lock().clone()
    }
}

impl Default for MockDeviceCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCapability for MockDeviceCapability {
    fn can_enumerate(&self) -> bool {
        self.enumeration_supported.load(Ordering::SeqCst)
    }

    fn can_capture(&self) -> bool {
        self.capture_supported.load(Ordering::SeqCst)
    }

    fn enumerate_inputs(&self) -> Result<Vec<InputDeviceInfo>, PlatformError> {
        Ok(self.devices.lock().clone())
    }

    fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn MediaStreamCapability>, PlatformError> {
        {
            let mut failures = self.acquire_failures.lock();
            if let Some(first) = failures.first_mut() {
                if first.0 == 0 {
                    return Err(failures.remove(0).1);
                }
                first.0 -= 1;
            }
        }

        let devices = self.devices.lock();
        let device = match constraints.device_id.as_deref() {
            Some(requested) => devices
                .iter()
                .find(|d| d.id == requested)
                .cloned()
                .ok_or_else(|| {
                    PlatformError::new(
                        "NotFoundError",
                        format!("no device with id '{requested}'"),
                    )
                })?,
            None => devices
                .first()
                .cloned()
                .ok_or_else(|| PlatformError::new("NotFoundError", "no input devices"))?,
        };
        drop(devices);

        let granted_rate = self
            .granted_sample_rate
            .lock()
            .unwrap_or(constraints.sample_rate);
        let settings = StreamSettings {
            device_id: Some(device.id.clone()),
            sample_rate: granted_rate,
            channel_count: constraints.channel_count,
            echo_cancellation: constraints.echo_cancellation,
            noise_suppression: constraints.noise_suppression,
            auto_gain_control: constraints.auto_gain_control,
        };

        let stream = Arc::new(MockMediaStream::new(settings, device.label));
        self.acquired.lock().push(Arc::clone(&stream));
        Ok(stream)
    }

    fn query_permission(&self) -> PermissionStatus {
        *self.permission.lock()
    }
}
