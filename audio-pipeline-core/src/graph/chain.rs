//! Per-session signal graph construction, analysis, and teardown.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::{EncoderParameters, ProcessingConfig};
use crate::models::error::{AudioProcessingError, ErrorCode};
use crate::models::metrics::AudioMetricsPatch;
use crate::models::telemetry::RenderQuantumTelemetry;
use crate::processing::levels::{self, ExponentialAverage};
use crate::traits::device::MediaStreamCapability;
use crate::traits::messaging::EncoderMessageHandler;
use crate::traits::rendering::{ChainNodes, ChainSettings, RenderingContextCapability};

use super::telemetry_bridge::{RenderTelemetryBridge, TelemetryListener, TelemetryListenerId};

/// Analyser time-domain window, in samples.
pub const ANALYSIS_WINDOW_SIZE: usize = 2048;
/// Analyser smoothing time constant.
pub const ANALYSER_SMOOTHING: f32 = 0.8;
pub const ANALYSER_MIN_DB: f32 = -90.0;
pub const ANALYSER_MAX_DB: f32 = -10.0;

/// Smoothing weight for the reported input level.
const INPUT_LEVEL_ALPHA: f32 = 0.3;

/// Per-graph mutable analysis state. Created with the graph so telemetry
/// arriving before the first analysis cycle is folded, never dropped.
struct GraphMetricsState {
    total_frames: u64,
    dropped_frames: u64,
    render: super::telemetry_bridge::RenderCounters,
    input_level: ExponentialAverage,
    scratch: Vec<f32>,
}

impl GraphMetricsState {
    fn new() -> Self {
        Self {
            total_frames: 0,
            dropped_frames: 0,
            render: Default::default(),
            input_level: ExponentialAverage::new(INPUT_LEVEL_ALPHA),
            scratch: Vec::with_capacity(ANALYSIS_WINDOW_SIZE),
        }
    }
}

struct GraphInner {
    nodes: Option<ChainNodes>,
    metrics: GraphMetricsState,
}

/// Handle to one live signal graph (source → gain → analyser → encoder).
///
/// Exactly one graph is live per capture session. The engine owns the graph
/// contents; the controller holds clones of this handle only to pass back
/// into engine calls.
#[derive(Clone)]
pub struct ProcessingGraph {
    id: Uuid,
    context: Arc<dyn RenderingContextCapability>,
    owns_context: bool,
    inner: Arc<Mutex<GraphInner>>,
}

impl ProcessingGraph {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &Arc<dyn RenderingContextCapability> {
        &self.context
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().nodes.is_none()
    }
}

/// Builds and tears down processing graphs and computes per-cycle metrics.
pub struct ProcessingChainEngine {
    bridge: RenderTelemetryBridge,
}

impl ProcessingChainEngine {
    pub fn new() -> Self {
        Self {
            bridge: RenderTelemetryBridge::new(),
        }
    }

    pub fn add_telemetry_listener(&self, listener: TelemetryListener) -> TelemetryListenerId {
        self.bridge.add_listener(listener)
    }

    pub fn remove_telemetry_listener(&self, id: TelemetryListenerId) -> bool {
        self.bridge.remove_listener(id)
    }

    pub fn clear_telemetry_listeners(&self) {
        self.bridge.clear();
    }

    /// Build the signal graph for one capture session.
    pub fn create_graph(
        &self,
        context: Arc<dyn RenderingContextCapability>,
        owns_context: bool,
        stream: &dyn MediaStreamCapability,
        config: &ProcessingConfig,
    ) -> Result<ProcessingGraph, AudioProcessingError> {
        let settings = ChainSettings {
            gain: config.auto_gain_control_level.gain_multiplier(),
            analyser_window: ANALYSIS_WINDOW_SIZE,
            smoothing: ANALYSER_SMOOTHING,
            min_db: ANALYSER_MIN_DB,
            max_db: ANALYSER_MAX_DB,
        };

        let nodes = context.build_capture_chain(stream, &settings).map_err(|e| {
            AudioProcessingError::new(
                ErrorCode::ProcessingGraphFailed,
                format!("failed to build processing graph: {e}"),
            )
            .with_cause(e.to_string())
        })?;

        // Parameter delivery is best-effort at build time; the worklet falls
        // back to its compiled-in defaults.
        if let Err(e) = nodes.encoder.post_parameters(&EncoderParameters::from(config)) {
            log::warn!("failed to post initial encoder parameters: {e}");
        }

        Ok(ProcessingGraph {
            id: Uuid::new_v4(),
            context,
            owns_context,
            inner: Arc::new(Mutex::new(GraphInner {
                nodes: Some(nodes),
                metrics: GraphMetricsState::new(),
            })),
        })
    }

    /// Push updated processing parameters into a live graph without a
    /// restart.
    pub fn update_parameters(
        &self,
        graph: &ProcessingGraph,
        config: &ProcessingConfig,
    ) -> Result<(), AudioProcessingError> {
        let inner = graph.inner.lock();
        let Some(nodes) = inner.nodes.as_ref() else {
            return Err(AudioProcessingError::new(
                ErrorCode::ProcessingGraphFailed,
                "cannot update parameters on a disposed graph",
            ));
        };

        nodes
            .gain
            .set_gain(config.auto_gain_control_level.gain_multiplier())
            .map_err(|e| {
                AudioProcessingError::new(
                    ErrorCode::ProcessingGraphFailed,
                    format!("failed to update gain: {e}"),
                )
                .with_cause(e.to_string())
            })?;

        nodes
            .encoder
            .post_parameters(&EncoderParameters::from(config))
            .map_err(|e| {
                AudioProcessingError::new(
                    ErrorCode::ProcessingGraphFailed,
                    format!("failed to post encoder parameters: {e}"),
                )
                .with_cause(e.to_string())
            })
    }

    /// Read the analyser's current window and compute instantaneous metrics.
    pub fn analyze_audio_level(&self, graph: &ProcessingGraph) -> AudioMetricsPatch {
        let started = Instant::now();
        let mut inner = graph.inner.lock();
        let analyser = match inner.nodes.as_ref() {
            Some(nodes) => Arc::clone(&nodes.analyser),
            None => {
                log::debug!("analyze_audio_level on disposed graph {}", graph.id);
                return AudioMetricsPatch::default();
            }
        };
        let metrics = &mut inner.metrics;
        analyser.read_time_domain(&mut metrics.scratch);

        let samples = metrics.scratch.as_slice();
        let peak = levels::peak_level(samples);
        let rms = levels::rms_level(samples);
        let snr = levels::signal_to_noise_db(samples);
        let input_level = metrics.input_level.update(rms);

        metrics.total_frames += samples.len() as u64;

        let sample_rate = graph.context.sample_rate().max(1);
        let window_ms = samples.len() as f64 / sample_rate as f64 * 1000.0;

        // Telemetry-reported drops are authoritative once present.
        let buffer_health = metrics.render.buffer_health().unwrap_or_else(|| {
            levels::buffer_health(metrics.total_frames, metrics.dropped_frames)
        });

        AudioMetricsPatch {
            input_level: Some(input_level),
            peak_level: Some(peak),
            rms_level: Some(rms),
            signal_to_noise_ratio: Some(snr),
            buffer_health: Some(buffer_health),
            dropped_frame_count: Some(metrics.dropped_frames + metrics.render.dropped_frame_count),
            total_frame_count: Some(metrics.total_frames),
            analysis_window_ms: Some(window_ms),
            analysis_duration_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            render_underrun_count: Some(metrics.render.underrun_count),
            render_overrun_count: Some(metrics.render.overrun_count),
            render_dropped_frame_count: Some(metrics.render.dropped_frame_count),
            consecutive_underruns: Some(metrics.render.consecutive_underruns),
            ..Default::default()
        }
    }

    /// Current end-to-end latency estimate in seconds: hardware output
    /// latency plus one analysis window of buffering at the context rate.
    pub fn measure_latency(&self, context: &dyn RenderingContextCapability) -> f64 {
        let sample_rate = context.sample_rate().max(1);
        context.output_latency_secs() + ANALYSIS_WINDOW_SIZE as f64 / sample_rate as f64
    }

    /// Fold one render-quantum report into the graph counters and notify
    /// telemetry listeners in arrival order.
    pub fn ingest_render_telemetry(
        &self,
        graph: &ProcessingGraph,
        telemetry: &RenderQuantumTelemetry,
    ) {
        {
            let mut inner = graph.inner.lock();
            if inner.nodes.is_none() {
                log::debug!("telemetry for disposed graph {} dropped", graph.id);
                return;
            }
            inner.metrics.render.fold(telemetry);
        }
        // Listeners run outside the graph lock so they may read metrics.
        self.bridge.notify(telemetry);
    }

    /// Install or clear the handler for the graph's encoder channel.
    pub fn set_message_handler(
        &self,
        graph: &ProcessingGraph,
        handler: Option<EncoderMessageHandler>,
    ) {
        let inner = graph.inner.lock();
        if let Some(nodes) = inner.nodes.as_ref() {
            nodes.encoder.set_message_handler(handler);
        }
    }

    /// Tear down the graph unconditionally.
    ///
    /// Every node is disconnected, the encoder channel released, and a
    /// graph-exclusive context closed. Teardown failures are logged and
    /// swallowed; disposal never propagates errors.
    pub fn dispose_graph(&self, graph: &ProcessingGraph) {
        let Some(nodes) = graph.inner.lock().nodes.take() else {
            return;
        };

        nodes.encoder.set_message_handler(None);
        if let Err(e) = nodes.source.disconnect() {
            log::warn!("failed to disconnect source node: {e}");
        }
        if let Err(e) = nodes.gain.disconnect() {
            log::warn!("failed to disconnect gain node: {e}");
        }
        if let Err(e) = nodes.analyser.disconnect() {
            log::warn!("failed to disconnect analyser node: {e}");
        }
        if let Err(e) = nodes.encoder.disconnect() {
            log::warn!("failed to disconnect encoder node: {e}");
        }
        nodes.encoder.close_channel();

        if graph.owns_context {
            if let Err(e) = graph.context.close() {
                log::warn!("failed to close graph-exclusive context: {e}");
            }
        }
    }
}

impl Default for ProcessingChainEngine {
    fn default() -> Self {
        Self::new()
    }
}
