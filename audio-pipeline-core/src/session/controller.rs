//! Top-level capture façade: lifecycle state machine, event fan-out,
//! periodic metrics sampling, and error routing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

use crate::graph::chain::{ProcessingChainEngine, ProcessingGraph};
use crate::graph::telemetry_bridge::{TelemetryListener, TelemetryListenerId};
use crate::models::config::{
    CaptureConfig, CaptureConfigPatch, ProcessingConfig, ProcessingConfigPatch,
};
use crate::models::error::{
    classify_platform_error, AudioProcessingError, ErrorCode, ErrorContext,
};
use crate::models::events::{
    AudioLevelEvent, CaptureEvent, CaptureStartedEvent, CaptureStoppedEvent, DeviceChangedEvent,
    EventKind, PermissionDeniedEvent, PermissionGrantedEvent, VoiceActivityEvent,
};
use crate::models::metrics::{AudioMetrics, AudioMetricsPatch};
use crate::models::state::CaptureState;
use crate::models::telemetry::{EncoderMessage, PcmFrame};
use crate::models::validation::{PermissionStatus, StreamConstraints};
use crate::processing::budget::{BudgetSummary, PerformanceBudgetTracker};
use crate::processing::cpu_load::{CpuLoadSummary, CpuLoadTracker};
use crate::processing::sample_rate;
use crate::traits::device::MediaStreamCapability;
use crate::traits::environment::AudioEnvironment;
use crate::traits::rendering::{ContextState, RenderingContextCapability};

use super::context_provider::AudioContextProvider;
use super::dispatcher::{EventDispatcher, SubscriptionId};
use super::validator::DeviceValidator;

/// Guidance text attached to `permissionGranted` events.
const GRANTED_GUIDANCE: &str =
    "Microphone access granted. Audio capture will use the negotiated device settings.";

/// Voice activity threshold clamp bounds.
const VAD_THRESHOLD_MIN: f32 = 0.05;
const VAD_THRESHOLD_MAX: f32 = 0.95;

/// Resources for one live capture session. Exactly one session (plus,
/// transiently, one replacement candidate) exists at a time.
struct ActiveSession {
    stream: Arc<dyn MediaStreamCapability>,
    graph: ProcessingGraph,
    context: Arc<dyn RenderingContextCapability>,
    /// Cleared on stop; in-flight callbacks and the sampler check it before
    /// touching shared state so a torn-down session is never resurrected.
    live: Arc<AtomicBool>,
    sampler: Option<JoinHandle<()>>,
}

/// Orchestrates the capture pipeline: device validation, stream
/// acquisition, graph lifecycle, metrics sampling, and the typed event
/// contract.
pub struct AudioCaptureController {
    environment: Arc<dyn AudioEnvironment>,
    context_provider: Arc<AudioContextProvider>,
    engine: Arc<ProcessingChainEngine>,
    validator: DeviceValidator,
    dispatcher: Arc<EventDispatcher>,

    budget_tracker: Arc<Mutex<PerformanceBudgetTracker>>,
    cpu_tracker: Arc<Mutex<CpuLoadTracker>>,
    metrics: Arc<Mutex<AudioMetrics>>,

    capture_config: CaptureConfig,
    processing_config: Arc<Mutex<ProcessingConfig>>,
    state: CaptureState,
    permission_status: PermissionStatus,
    active: Option<ActiveSession>,

    error_callback: Option<Arc<dyn Fn(&AudioProcessingError) + Send + Sync>>,
}

impl AudioCaptureController {
    pub fn new(environment: Arc<dyn AudioEnvironment>) -> Self {
        let capture_config = CaptureConfig::default();
        let context_provider = Arc::new(AudioContextProvider::new(
            Arc::clone(&environment),
            &capture_config,
        ));
        Self {
            validator: DeviceValidator::new(Arc::clone(&environment)),
            environment,
            context_provider,
            engine: Arc::new(ProcessingChainEngine::new()),
            dispatcher: Arc::new(EventDispatcher::new()),
            budget_tracker: Arc::new(Mutex::new(PerformanceBudgetTracker::with_default_budgets())),
            cpu_tracker: Arc::new(Mutex::new(CpuLoadTracker::with_default_budget())),
            metrics: Arc::new(Mutex::new(AudioMetrics::empty())),
            capture_config,
            processing_config: Arc::new(Mutex::new(ProcessingConfig::default())),
            state: CaptureState::Uninitialized,
            permission_status: PermissionStatus::Unknown,
            active: None,
            error_callback: None,
        }
    }

    // --- Lifecycle ---

    /// Merge configuration overrides, verify platform capture capability,
    /// and move to `Initialized`. Idempotent after the first success.
    pub fn initialize(
        &mut self,
        config: Option<CaptureConfigPatch>,
        processing: Option<ProcessingConfigPatch>,
    ) -> Result<(), AudioProcessingError> {
        if !self.state.is_uninitialized() {
            log::debug!("initialize ignored: controller already initialized");
            return Ok(());
        }
        let started = Instant::now();

        let mut capture = self.capture_config.apply(config.unwrap_or_default());
        capture.sample_rate = sample_rate::resolve(Some(capture.sample_rate));
        if let Err(message) = capture.validate() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::ConfigurationInvalid,
                message,
            )));
        }

        let merged_processing = self
            .processing_config
            .lock()
            .apply(processing.unwrap_or_default());
        if let Err(message) = merged_processing.validate() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::ConfigurationInvalid,
                message,
            )));
        }

        if !self.environment.devices().can_capture() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::UnsupportedConfiguration,
                "platform exposes no microphone capture capability",
            )));
        }

        self.capture_config = capture;
        *self.processing_config.lock() = merged_processing;
        self.context_provider.configure(&self.capture_config);
        self.state = CaptureState::Initialized;

        self.budget_tracker
            .lock()
            .record("initialization", started.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Begin capturing on the configured device.
    ///
    /// Any failure rolls back partially-acquired resources, routes through
    /// the unified error handler, and leaves the state untouched.
    pub fn start_capture(&mut self) -> Result<(), AudioProcessingError> {
        match self.state {
            CaptureState::Capturing => {
                log::warn!("start_capture ignored: already capturing");
                return Ok(());
            }
            CaptureState::Uninitialized => {
                return Err(self.handle_error(AudioProcessingError::new(
                    ErrorCode::ConfigurationInvalid,
                    "start_capture requires initialize() first",
                )));
            }
            CaptureState::Initialized => {}
        }

        let device_id = self.capture_config.device_id.clone();

        let validation_started = Instant::now();
        let validation = self
            .validator
            .validate_device(device_id.as_deref(), &self.capture_config);
        self.budget_tracker.lock().record(
            "device-validation",
            validation_started.elapsed().as_secs_f64() * 1000.0,
        );
        if !validation.is_valid {
            let error = validation.error.unwrap_or_else(|| {
                AudioProcessingError::new(
                    ErrorCode::DeviceUnavailable,
                    "device validation failed without a structured error",
                )
            });
            return Err(self.handle_error(error));
        }

        let stream = match self.acquire_stream(device_id.as_deref(), true) {
            Ok(stream) => stream,
            Err(error) => return Err(self.handle_error(error)),
        };

        self.context_provider.configure(&self.capture_config);
        let context = match self.context_provider.ensure_context() {
            Ok(context) => context,
            Err(error) => {
                stream.stop();
                return Err(self.handle_error(error));
            }
        };

        let processing = self.processing_config.lock().clone();
        let graph = match self.engine.create_graph(
            Arc::clone(&context),
            false,
            stream.as_ref(),
            &processing,
        ) {
            Ok(graph) => graph,
            Err(error) => {
                stream.stop();
                return Err(self.handle_error(error));
            }
        };

        if let Err(error) = self.context_provider.ensure_running(&context) {
            self.engine.dispose_graph(&graph);
            stream.stop();
            return Err(self.handle_error(error));
        }

        let live = Arc::new(AtomicBool::new(true));
        self.install_context_listener(&context, &live);
        self.install_message_routing(&graph);

        // Counters restart with the new graph.
        let latency = self.engine.measure_latency(context.as_ref());
        self.budget_tracker
            .lock()
            .record("end-to-end-latency", latency * 1000.0);
        *self.metrics.lock() = AudioMetrics::empty().merge(&AudioMetricsPatch {
            latency_estimate_secs: Some(latency),
            ..Default::default()
        });

        let mut session = ActiveSession {
            stream: Arc::clone(&stream),
            graph,
            context,
            live,
            sampler: None,
        };

        self.state = CaptureState::Capturing;
        let settings = stream.settings();
        self.dispatcher
            .emit(&CaptureEvent::CaptureStarted(CaptureStartedEvent {
                stream_id: stream.id(),
                track_id: stream.track_id(),
                settings: settings.clone(),
            }));
        self.dispatcher
            .emit(&CaptureEvent::DeviceChanged(DeviceChangedEvent {
                device_id: settings
                    .device_id
                    .or_else(|| validation.device_id.clone())
                    .unwrap_or_default(),
                label: stream.label().or_else(|| validation.label.clone()),
            }));

        // The sampler starts after the events above so `captureStarted`
        // always precedes the first `metricsUpdated`.
        self.start_sampler(&mut session);
        self.active = Some(session);
        Ok(())
    }

    /// Stop capturing. No-op when not capturing: no events, no errors.
    pub fn stop_capture(&mut self) {
        if !self.state.is_capturing() {
            log::debug!("stop_capture ignored: not capturing");
            return;
        }

        let session = self.active.take();
        self.state = CaptureState::Initialized;
        self.permission_status = PermissionStatus::Unknown;

        if let Some(mut session) = session {
            // The sampler must be cleared before graph teardown so no tick
            // reads analyser data from a disposed graph.
            Self::stop_sampler(&mut session);
            session.context.set_state_listener(None);
            self.engine.set_message_handler(&session.graph, None);
            self.engine.dispose_graph(&session.graph);
            session.stream.stop();

            self.dispatcher
                .emit(&CaptureEvent::CaptureStopped(CaptureStoppedEvent {
                    stream_id: Some(session.stream.id()),
                    track_id: Some(session.stream.track_id()),
                    reason: "user-request".into(),
                }));
        }
    }

    /// Switch the live session to another device without going dark on
    /// failure: acquire a candidate stream and graph first, verify them,
    /// and only then tear down and replace the current session.
    pub fn replace_capture_track(&mut self, device_id: &str) -> Result<(), AudioProcessingError> {
        if !self.state.is_capturing() || self.active.is_none() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::ConfigurationInvalid,
                "no active capture session to replace",
            )));
        }
        let started = Instant::now();

        let result = self.replace_capture_track_inner(device_id);
        self.budget_tracker.lock().record(
            "track-replacement",
            started.elapsed().as_secs_f64() * 1000.0,
        );
        result
    }

    fn replace_capture_track_inner(
        &mut self,
        device_id: &str,
    ) -> Result<(), AudioProcessingError> {
        let validation = self
            .validator
            .validate_device(Some(device_id), &self.capture_config);
        if !validation.is_valid {
            let error = validation.error.unwrap_or_else(|| {
                AudioProcessingError::new(
                    ErrorCode::DeviceUnavailable,
                    "replacement device validation failed",
                )
            });
            return Err(self.handle_error(error));
        }

        // The session keeps its configured rate across a replacement; the
        // granted rate of the new device is reconciled on the next restart.
        let candidate_stream = match self.acquire_stream(Some(device_id), false) {
            Ok(stream) => stream,
            Err(error) => return Err(self.handle_error(error)),
        };

        let context = match self.context_provider.ensure_context() {
            Ok(context) => context,
            Err(error) => {
                candidate_stream.stop();
                return Err(self.handle_error(error));
            }
        };

        let processing = self.processing_config.lock().clone();
        let candidate_graph = match self.engine.create_graph(
            Arc::clone(&context),
            false,
            candidate_stream.as_ref(),
            &processing,
        ) {
            Ok(graph) => graph,
            Err(error) => {
                candidate_stream.stop();
                return Err(self.handle_error(error));
            }
        };

        if let Err(error) = self.context_provider.ensure_running(&context) {
            self.engine.dispose_graph(&candidate_graph);
            candidate_stream.stop();
            return Err(self.handle_error(error));
        }

        // Candidate verified: promote it. From here the swap is not allowed
        // to fail.
        if let Some(mut old) = self.active.take() {
            Self::stop_sampler(&mut old);
            old.context.set_state_listener(None);
            self.engine.set_message_handler(&old.graph, None);
            self.engine.dispose_graph(&old.graph);
            old.stream.stop();
        }

        let live = Arc::new(AtomicBool::new(true));
        self.install_context_listener(&context, &live);
        self.install_message_routing(&candidate_graph);
        *self.metrics.lock() = AudioMetrics::empty();
        self.capture_config = CaptureConfig {
            device_id: Some(device_id.to_owned()),
            ..self.capture_config.clone()
        };

        let mut session = ActiveSession {
            stream: Arc::clone(&candidate_stream),
            graph: candidate_graph,
            context,
            live,
            sampler: None,
        };
        self.start_sampler(&mut session);
        self.active = Some(session);

        self.dispatcher
            .emit(&CaptureEvent::DeviceChanged(DeviceChangedEvent {
                device_id: device_id.to_owned(),
                label: candidate_stream.label().or(validation.label),
            }));
        Ok(())
    }

    /// Replace the capture configuration. While capturing this performs a
    /// full stop/start cycle under the new configuration.
    pub fn update_capture_config(
        &mut self,
        patch: CaptureConfigPatch,
    ) -> Result<(), AudioProcessingError> {
        let mut updated = self.capture_config.apply(patch);
        updated.sample_rate = sample_rate::resolve(Some(updated.sample_rate));
        if let Err(message) = updated.validate() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::ConfigurationInvalid,
                message,
            )));
        }

        self.capture_config = updated;
        self.context_provider.configure(&self.capture_config);

        if self.state.is_capturing() {
            self.stop_capture();
            self.start_capture()?;
        }
        Ok(())
    }

    /// Replace the processing configuration, pushing parameters into the
    /// live graph without a restart.
    pub fn set_audio_processing(
        &mut self,
        config: ProcessingConfig,
    ) -> Result<(), AudioProcessingError> {
        if let Err(message) = config.validate() {
            return Err(self.handle_error(AudioProcessingError::new(
                ErrorCode::ConfigurationInvalid,
                message,
            )));
        }

        *self.processing_config.lock() = config.clone();

        if let Some(session) = &self.active {
            if let Err(error) = self.engine.update_parameters(&session.graph, &config) {
                return Err(self.handle_error(error));
            }
        }
        Ok(())
    }

    /// Merge a partial processing configuration and apply it live.
    pub fn update_processing_config(
        &mut self,
        patch: ProcessingConfigPatch,
    ) -> Result<(), AudioProcessingError> {
        let merged = self.processing_config.lock().apply(patch);
        self.set_audio_processing(merged)
    }

    /// Force-stop capture, drop every listener registration, and reset to
    /// `Uninitialized`. Safe to call in any state.
    pub fn dispose(&mut self) {
        self.stop_capture();
        self.dispatcher.clear();
        self.engine.clear_telemetry_listeners();
        self.error_callback = None;
        self.context_provider.close();
        self.state = CaptureState::Uninitialized;
    }

    // --- Subscriptions ---

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&CaptureEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.dispatcher.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(kind, id)
    }

    pub fn subscribe_audio_data(
        &self,
        handler: impl Fn(&PcmFrame) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.dispatcher.subscribe_audio_data(handler)
    }

    pub fn unsubscribe_audio_data(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe_audio_data(id)
    }

    pub fn add_telemetry_listener(&self, listener: TelemetryListener) -> TelemetryListenerId {
        self.engine.add_telemetry_listener(listener)
    }

    pub fn remove_telemetry_listener(&self, id: TelemetryListenerId) -> bool {
        self.engine.remove_telemetry_listener(id)
    }

    pub fn set_error_callback(
        &mut self,
        callback: impl Fn(&AudioProcessingError) + Send + Sync + 'static,
    ) {
        self.error_callback = Some(Arc::new(callback));
    }

    // --- Introspection ---

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn metrics(&self) -> AudioMetrics {
        self.metrics.lock().clone()
    }

    pub fn capture_config(&self) -> CaptureConfig {
        self.capture_config.clone()
    }

    pub fn processing_config(&self) -> ProcessingConfig {
        self.processing_config.lock().clone()
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.permission_status
    }

    pub fn budget_summary(&self, id: &str) -> Option<BudgetSummary> {
        self.budget_tracker.lock().summary(id)
    }

    pub fn budget_summaries(&self) -> Vec<BudgetSummary> {
        self.budget_tracker.lock().summaries()
    }

    pub fn cpu_summary(&self) -> CpuLoadSummary {
        self.cpu_tracker.lock().summary()
    }

    // --- Stream acquisition ---

    /// Acquire a microphone stream with explicit constraints.
    ///
    /// At session start the rate the device actually grants is
    /// authoritative: when it differs from the configured rate, the
    /// configuration and the shared context are updated to match reality.
    /// A live replacement passes `adopt_granted_rate = false` so the
    /// context the active session is rendering on is never torn down before
    /// the candidate is promoted.
    fn acquire_stream(
        &mut self,
        device_id: Option<&str>,
        adopt_granted_rate: bool,
    ) -> Result<Arc<dyn MediaStreamCapability>, AudioProcessingError> {
        let resolved_rate = sample_rate::resolve(Some(self.capture_config.sample_rate));
        let devices = self.environment.devices();

        // Best-effort refresh; platforms without a permission API degrade
        // to Unsupported without failing acquisition.
        self.permission_status = devices.query_permission();

        let constraints = StreamConstraints {
            device_id: device_id.map(str::to_owned),
            sample_rate: resolved_rate,
            channel_count: self.capture_config.channel_count,
            echo_cancellation: self.capture_config.echo_cancellation,
            noise_suppression: self.capture_config.noise_suppression,
            auto_gain_control: self.capture_config.auto_gain_control,
            latency_hint: self.capture_config.latency_hint,
        };

        match devices.acquire(&constraints) {
            Ok(stream) => {
                self.permission_status = PermissionStatus::Granted;

                let settings = stream.settings();
                let granted = sample_rate::resolve(Some(settings.sample_rate));
                if adopt_granted_rate && granted != self.capture_config.sample_rate {
                    log::debug!(
                        "device granted {granted} Hz instead of {} Hz; adopting the device rate",
                        self.capture_config.sample_rate
                    );
                    self.capture_config = CaptureConfig {
                        sample_rate: granted,
                        ..self.capture_config.clone()
                    };
                    self.context_provider.configure(&self.capture_config);
                }

                self.dispatcher
                    .emit(&CaptureEvent::PermissionGranted(PermissionGrantedEvent {
                        device_id: settings.device_id.clone(),
                        label: stream.label(),
                        sample_rate: settings.sample_rate,
                        channel_count: settings.channel_count,
                        guidance: GRANTED_GUIDANCE.into(),
                    }));
                Ok(stream)
            }
            Err(platform_error) => {
                let code = classify_platform_error(&platform_error);
                let error = AudioProcessingError::new(
                    code,
                    format!("failed to acquire microphone stream: {platform_error}"),
                )
                .with_cause(platform_error.to_string());

                if code == ErrorCode::PermissionDenied {
                    self.permission_status = PermissionStatus::Denied;
                    self.dispatcher
                        .emit(&CaptureEvent::PermissionDenied(PermissionDeniedEvent {
                            reason: platform_error.message.clone(),
                            guidance: error.recovery.guidance.clone(),
                            can_retry: error.recovery.recoverable,
                            retry_after_ms: error.recovery.retry_after_ms,
                        }));
                }
                Err(error)
            }
        }
    }

    // --- Session plumbing ---

    /// Auto-resume the context if the platform suspends it mid-session,
    /// emitting a recoverable error when the resume fails. Mid-session
    /// failures never throw into unrelated call stacks.
    fn install_context_listener(
        &self,
        context: &Arc<dyn RenderingContextCapability>,
        live: &Arc<AtomicBool>,
    ) {
        let weak = Arc::downgrade(context);
        let dispatcher = Arc::clone(&self.dispatcher);
        let live = Arc::clone(live);
        let error_context = self.error_context();

        context.set_state_listener(Some(Box::new(move |state| {
            if state != ContextState::Suspended || !live.load(Ordering::SeqCst) {
                return;
            }
            let Some(context) = weak.upgrade() else {
                return;
            };
            log::warn!("rendering context suspended mid-session; attempting resume");
            if let Err(e) = context.resume() {
                let error = AudioProcessingError::new(
                    ErrorCode::ContextSuspended,
                    format!("failed to auto-resume suspended rendering context: {e}"),
                )
                .with_cause(e.to_string())
                .with_context(error_context.clone());
                log::error!("capture pipeline error [{:?}]: {}", error.code, error.message);
                dispatcher.emit(&CaptureEvent::ProcessingError(error));
            }
        })));
    }

    /// Route encoder channel payloads: render telemetry to the chain
    /// engine, PCM frames to the audio-data subscribers.
    fn install_message_routing(&self, graph: &ProcessingGraph) {
        let engine = Arc::clone(&self.engine);
        let dispatcher = Arc::clone(&self.dispatcher);
        let routed_graph = graph.clone();

        self.engine.set_message_handler(
            graph,
            Some(Box::new(move |payload| {
                match EncoderMessage::from_wire(payload) {
                    EncoderMessage::RenderQuantum(telemetry) => {
                        engine.ingest_render_telemetry(&routed_graph, &telemetry);
                    }
                    EncoderMessage::Pcm(frame) => dispatcher.dispatch_audio(&frame),
                    EncoderMessage::Unrecognized => {
                        log::debug!("unrecognized encoder payload dropped");
                    }
                }
            })),
        );
    }

    fn start_sampler(&self, session: &mut ActiveSession) {
        let live = Arc::clone(&session.live);
        let engine = Arc::clone(&self.engine);
        let graph = session.graph.clone();
        let context = Arc::clone(&session.context);
        let dispatcher = Arc::clone(&self.dispatcher);
        let metrics = Arc::clone(&self.metrics);
        let budget_tracker = Arc::clone(&self.budget_tracker);
        let cpu_tracker = Arc::clone(&self.cpu_tracker);
        let processing = Arc::clone(&self.processing_config);

        let handle = thread::Builder::new()
            .name("metrics-sampler".into())
            .spawn(move || {
                while live.load(Ordering::SeqCst) {
                    let interval_ms = processing.lock().analysis_interval_ms.max(1);
                    thread::sleep(Duration::from_millis(interval_ms));
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    let tick = Instant::now();
                    let mut patch = engine.analyze_audio_level(&graph);
                    budget_tracker
                        .lock()
                        .record("analysis-cycle", tick.elapsed().as_secs_f64() * 1000.0);

                    let latency = engine.measure_latency(context.as_ref());
                    budget_tracker
                        .lock()
                        .record("end-to-end-latency", latency * 1000.0);
                    patch.latency_estimate_secs = Some(latency);

                    let cpu_sample = cpu_tracker
                        .lock()
                        .record(tick.elapsed().as_secs_f64() * 1000.0, interval_ms as f64);
                    patch.cpu_utilization = Some(cpu_sample.utilization);

                    let merged = {
                        let mut cached = metrics.lock();
                        *cached = cached.merge(&patch);
                        cached.clone()
                    };

                    // A stop that raced in tears the session down; emitting
                    // against it would resurrect a closed session.
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    dispatcher.emit(&CaptureEvent::MetricsUpdated(merged.clone()));
                    dispatcher.emit(&CaptureEvent::AudioLevelChanged(AudioLevelEvent {
                        level: merged.input_level,
                        peak: merged.peak_level,
                        rms: merged.rms_level,
                    }));

                    let sensitivity = processing.lock().voice_activity_sensitivity;
                    let threshold = sensitivity.clamp(VAD_THRESHOLD_MIN, VAD_THRESHOLD_MAX);
                    if merged.rms_level >= threshold {
                        let confidence = ((merged.rms_level - threshold)
                            / (1.0 - threshold).max(f32::EPSILON))
                        .clamp(0.0, 1.0);
                        dispatcher.emit(&CaptureEvent::VoiceActivity(VoiceActivityEvent {
                            is_voice_detected: true,
                            confidence,
                            threshold,
                            timestamp: Utc::now(),
                        }));
                    }
                }
            })
            .expect("failed to spawn metrics sampler thread");

        session.sampler = Some(handle);
    }

    fn stop_sampler(session: &mut ActiveSession) {
        session.live.store(false, Ordering::SeqCst);
        if let Some(handle) = session.sampler.take() {
            if handle.join().is_err() {
                log::error!("metrics sampler thread panicked");
            }
        }
    }

    // --- Error routing ---

    fn error_context(&self) -> ErrorContext {
        let devices = self.environment.devices();
        ErrorContext {
            device_id: self.capture_config.device_id.clone(),
            track_id: self.active.as_ref().map(|s| s.stream.track_id()),
            stream_id: self.active.as_ref().map(|s| s.stream.id()),
            sample_rate: Some(self.capture_config.sample_rate),
            channel_count: Some(self.capture_config.channel_count),
            buffer_size: Some(self.capture_config.buffer_size),
            capture_config: Some(self.capture_config.clone()),
            processing_config: Some(self.processing_config.lock().clone()),
            can_enumerate_devices: Some(devices.can_enumerate()),
            can_capture: Some(devices.can_capture()),
            permission_status: Some(self.permission_status),
        }
    }

    /// Unified error routing: attach the diagnostic context snapshot, emit
    /// on the `processingError` channel, forward to the external callback,
    /// and hand the enriched error back for the caller to return.
    fn handle_error(&self, error: AudioProcessingError) -> AudioProcessingError {
        let error = error.with_context(self.error_context());
        log::error!("capture pipeline error [{:?}]: {}", error.code, error.message);
        self.dispatcher
            .emit(&CaptureEvent::ProcessingError(error.clone()));
        if let Some(callback) = &self.error_callback {
            callback(&error);
        }
        error
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        self.dispose();
    }
}

