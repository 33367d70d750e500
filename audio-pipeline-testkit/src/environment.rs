//! Root fake environment aggregating the capability fakes.

use std::sync::Arc;

use parking_lot::Mutex;

use audio_pipeline_core::models::error::PlatformError;
use audio_pipeline_core::models::validation::InputDeviceInfo;
use audio_pipeline_core::traits::device::DeviceCapability;
use audio_pipeline_core::traits::environment::AudioEnvironment;
use audio_pipeline_core::traits::rendering::{ContextOptions, RenderingContextCapability};

use crate::device::MockDeviceCapability;
use crate::rendering::MockRenderingContext;

/// In-memory [`AudioEnvironment`]. Records every rendering context it
/// creates so tests can drive state transitions and inspect built chains.
pub struct MockEnvironment {
    pub devices: Arc<MockDeviceCapability>,
    contexts: Mutex<Vec<Arc<MockRenderingContext>>>,
    context_failures: Mutex<Vec<PlatformError>>,
}

impl MockEnvironment {
    /// An environment with no input devices.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: Arc::new(MockDeviceCapability::new()),
            contexts: Mutex::new(Vec::new()),
            context_failures: Mutex::new(Vec::new()),
        })
    }

    /// An environment with one default microphone, id `default-mic`.
    pub fn with_default_device() -> Arc<Self> {
        let env = Self::new();
        env.devices.set_devices(vec![InputDeviceInfo {
            id: "default-mic".into(),
            label: Some("Built-in Microphone".into()),
            is_default: true,
        }]);
        env
    }

    /// Queue a failure; the next `create_rendering_context` consumes it.
    pub fn push_context_failure(&self, error: PlatformError) {
        self.context_failures.lock().push(error);
    }

    /// Every context created so far, in creation order.
    pub fn contexts(&self) -> Vec<Arc<MockRenderingContext>> {
        self.contexts.lock().clone()
    }
}

impl AudioEnvironment for MockEnvironment {
    fn devices(&self) -> Arc<dyn DeviceCapability> {
        Arc::clone(&self.devices) as Arc<dyn DeviceCapability>
    }

    fn create_rendering_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Arc<dyn RenderingContextCapability>, PlatformError> {
        {
            let mut failures = self.context_failures.lock();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let context = MockRenderingContext::new(options);
        self.contexts.lock().push(Arc::clone(&context));
        Ok(context)
    }
}
