use std::sync::Arc;

use crate::models::error::PlatformError;

use super::device::DeviceCapability;
use super::rendering::{ContextOptions, RenderingContextCapability};

/// Root capability set injected into the pipeline.
///
/// Aggregates the platform surfaces the pipeline consumes so core logic is
/// platform-agnostic and testable with in-memory fakes. Never accessed via
/// ambient global state.
pub trait AudioEnvironment: Send + Sync {
    fn devices(&self) -> Arc<dyn DeviceCapability>;

    fn create_rendering_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Arc<dyn RenderingContextCapability>, PlatformError>;
}
