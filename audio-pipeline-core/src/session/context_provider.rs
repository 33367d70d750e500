//! Ownership of the single shared rendering context.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::error::{AudioProcessingError, ErrorCode};
use crate::traits::environment::AudioEnvironment;
use crate::traits::rendering::{ContextOptions, ContextState, RenderingContextCapability};

/// Maintains at most one shared rendering context matching the configured
/// sample rate / channel / latency-hint triple. Incompatible configuration
/// changes tear the context down for lazy recreation before the next graph
/// build.
pub struct AudioContextProvider {
    environment: Arc<dyn AudioEnvironment>,
    options: Mutex<ContextOptions>,
    context: Mutex<Option<Arc<dyn RenderingContextCapability>>>,
}

impl AudioContextProvider {
    pub fn new(environment: Arc<dyn AudioEnvironment>, config: &CaptureConfig) -> Self {
        Self {
            environment,
            options: Mutex::new(Self::options_for(config)),
            context: Mutex::new(None),
        }
    }

    fn options_for(config: &CaptureConfig) -> ContextOptions {
        ContextOptions {
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            latency_hint: config.latency_hint,
        }
    }

    /// Record the latest configuration. An existing context that no longer
    /// matches is closed now and recreated lazily on the next
    /// [`ensure_context`](Self::ensure_context).
    pub fn configure(&self, config: &CaptureConfig) {
        let options = Self::options_for(config);
        *self.options.lock() = options.clone();

        let mut current = self.context.lock();
        if let Some(context) = current.as_ref() {
            if context.sample_rate() != options.sample_rate {
                log::debug!(
                    "rendering context rate {} incompatible with configured {}; recreating lazily",
                    context.sample_rate(),
                    options.sample_rate
                );
                if let Err(e) = context.close() {
                    log::warn!("failed to close stale rendering context: {e}");
                }
                *current = None;
            }
        }
    }

    /// The shared context, created on demand from the latest configuration.
    pub fn ensure_context(
        &self,
    ) -> Result<Arc<dyn RenderingContextCapability>, AudioProcessingError> {
        let mut current = self.context.lock();
        if let Some(context) = current.as_ref() {
            if context.state() != ContextState::Closed {
                return Ok(Arc::clone(context));
            }
            *current = None;
        }

        let options = self.options.lock().clone();
        let context = self
            .environment
            .create_rendering_context(&options)
            .map_err(|e| {
                AudioProcessingError::new(
                    ErrorCode::ProcessingGraphFailed,
                    format!("failed to create rendering context: {e}"),
                )
                .with_cause(e.to_string())
            })?;
        *current = Some(Arc::clone(&context));
        Ok(context)
    }

    /// Resume-on-activation: if the context is suspended, resume it.
    /// Resume failure surfaces as a recoverable graph error rather than a
    /// panic into capture start.
    pub fn ensure_running(
        &self,
        context: &Arc<dyn RenderingContextCapability>,
    ) -> Result<(), AudioProcessingError> {
        match context.state() {
            ContextState::Running => Ok(()),
            ContextState::Suspended => context.resume().map_err(|e| {
                AudioProcessingError::new(
                    ErrorCode::ProcessingGraphFailed,
                    format!("failed to resume suspended rendering context: {e}"),
                )
                .with_cause(e.to_string())
            }),
            ContextState::Closed => Err(AudioProcessingError::new(
                ErrorCode::ProcessingGraphFailed,
                "rendering context is closed",
            )),
        }
    }

    pub fn current(&self) -> Option<Arc<dyn RenderingContextCapability>> {
        self.context.lock().clone()
    }

    /// Close and drop the shared context, if any.
    pub fn close(&self) {
        if let Some(context) = self.context.lock().take() {
            if let Err(e) = context.close() {
                log::warn!("failed to close rendering context: {e}");
            }
        }
    }
}
