use std::sync::Arc;

use crate::models::config::LatencyHint;
use crate::models::error::PlatformError;

use super::device::MediaStreamCapability;
use super::messaging::MessageChannelCapability;

/// Rendering context lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Options a rendering context is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub latency_hint: LatencyHint,
}

/// Notified when the context transitions state (e.g. the platform suspends
/// it). Called from the platform's thread.
pub type ContextStateListener = Box<dyn Fn(ContextState) + Send + Sync>;

/// Fixed analyser/gain settings a capture chain is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSettings {
    pub gain: f32,
    pub analyser_window: usize,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

/// Source node feeding the chain from an input stream.
pub trait SourceNodeCapability: Send + Sync {
    fn disconnect(&self) -> Result<(), PlatformError>;
}

/// Gain stage of the chain. Single-writer: only the controller mutates it.
pub trait GainNodeCapability: Send + Sync {
    fn set_gain(&self, gain: f32) -> Result<(), PlatformError>;
    fn disconnect(&self) -> Result<(), PlatformError>;
}

/// Analyser tap exposing the current time-domain window.
pub trait AnalyserNodeCapability: Send + Sync {
    fn window_size(&self) -> usize;

    /// Copy the current time-domain buffer into `out`, resizing it to the
    /// analyser window.
    fn read_time_domain(&self, out: &mut Vec<f32>);

    fn disconnect(&self) -> Result<(), PlatformError>;
}

/// The four nodes of one built capture chain, already connected
/// source → gain → analyser → encoder. Handles are `Arc` so tests can
/// retain references across disposal.
pub struct ChainNodes {
    pub source: Arc<dyn SourceNodeCapability>,
    pub gain: Arc<dyn GainNodeCapability>,
    pub analyser: Arc<dyn AnalyserNodeCapability>,
    pub encoder: Arc<dyn MessageChannelCapability>,
}

/// Shared audio rendering context abstraction.
pub trait RenderingContextCapability: Send + Sync {
    fn sample_rate(&self) -> u32;
    fn state(&self) -> ContextState;

    fn resume(&self) -> Result<(), PlatformError>;
    fn suspend(&self) -> Result<(), PlatformError>;
    fn close(&self) -> Result<(), PlatformError>;

    /// Hardware output latency estimate in seconds.
    fn output_latency_secs(&self) -> f64;

    /// Install or clear the state-change listener.
    fn set_state_listener(&self, listener: Option<ContextStateListener>);

    /// Build the fixed capture topology from `stream` in one call.
    fn build_capture_chain(
        &self,
        stream: &dyn MediaStreamCapability,
        settings: &ChainSettings,
    ) -> Result<ChainNodes, PlatformError>;
}
