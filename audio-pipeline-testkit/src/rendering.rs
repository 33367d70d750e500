//! Fake rendering context, chain nodes, and encoder channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use audio_pipeline_core::models::config::EncoderParameters;
use audio_pipeline_core::models::error::PlatformError;
use audio_pipeline_core::models::telemetry::WirePayload;
use audio_pipeline_core::traits::device::MediaStreamCapability;
use audio_pipeline_core::traits::messaging::{EncoderMessageHandler, MessageChannelCapability};
use audio_pipeline_core::traits::rendering::{
    AnalyserNodeCapability, ChainNodes, ChainSettings, ContextOptions, ContextState,
    ContextStateListener, GainNodeCapability, RenderingContextCapability, SourceNodeCapability,
};

pub struct MockSourceNode {
    disconnected: AtomicBool,
}

impl MockSourceNode {
    pub fn disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl SourceNodeCapability for MockSourceNode {
    fn disconnect(&self) -> Result<(), PlatformError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockGainNode {
    gain: Mutex<f32>,
    disconnected: AtomicBool,
}

impl MockGainNode {
    pub fn gain(&self) -> f32 {
        *self.gain.lock()
    }

    pub fn disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl GainNodeCapability for MockGainNode {
    fn set_gain(&self, gain: f32) -> Result<(), PlatformError> {
        *self.gain.lock() = gain;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), PlatformError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Analyser whose time-domain window is whatever the test injected last.
/// With nothing injected it reads as silence.
pub struct MockAnalyserNode {
    window: usize,
    samples: Mutex<Vec<f32>>,
    disconnected: AtomicBool,
}

impl MockAnalyserNode {
    pub fn inject_samples(&self, samples: Vec<f32>) {
        *self.samples.lock() = samples;
    }

    pub fn disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl AnalyserNodeCapability for MockAnalyserNode {
    fn window_size(&self) -> usize {
        self.window
    }

    fn read_time_domain(&self, out: &mut Vec<f32>) {
        let samples = self.samples.lock();
        out.clear();
        if samples.is_empty() {
            out.resize(self.window, 0.0);
        } else {
            out.extend_from_slice(&samples);
        }
    }

    fn disconnect(&self) -> Result<(), PlatformError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Fake encoder message channel with a FIFO of undelivered payloads.
///
/// `push_wire` queues payloads the way the rendering thread would post them;
/// `deliver_pending` hands everything queued so far to the installed
/// handler, in order.
pub struct MockEncoderChannel {
    handler: Mutex<Option<Arc<dyn Fn(WirePayload) + Send + Sync>>>,
    pending_tx: Sender<WirePayload>,
    pending_rx: Receiver<WirePayload>,
    posted: Mutex<Vec<EncoderParameters>>,
    fail_post: AtomicBool,
    closed: AtomicBool,
    disconnected: AtomicBool,
}

impl MockEncoderChannel {
    fn new() -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            handler: Mutex::new(None),
            pending_tx,
            pending_rx,
            posted: Mutex::new(Vec::new()),
            fail_post: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Queue a payload as if posted from the rendering thread.
    pub fn push_wire(&self, payload: WirePayload) {
        if self.closed() {
            log::debug!("payload pushed to closed channel dropped");
            return;
        }
        let _ = self.pending_tx.send(payload);
    }

    /// Deliver all queued payloads to the handler. Payloads queued while no
    /// handler is installed are dropped, matching platform semantics.
    pub fn deliver_pending(&self) {
        while let Ok(payload) = self.pending_rx.try_recv() {
            let handler = self.handler.lock().clone();
            match handler {
                Some(handler) if !self.closed() => handler(payload),
                _ => log::debug!("payload without handler dropped"),
            }
        }
    }

    /// Parameter blocks posted so far, in order.
    pub fn posted_parameters(&self) -> Vec<EncoderParameters> {
        self.posted.lock().clone()
    }

    pub fn set_post_failure(&self, fail: bool) {
        self.fail_post.store(fail, Ordering::SeqCst);
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }
}

impl MessageChannelCapability for MockEncoderChannel {
    fn set_message_handler(&self, handler: Option<EncoderMessageHandler>) {
        *self.handler.lock() = handler.map(Arc::from);
    }

    fn post_parameters(&self, parameters: &EncoderParameters) -> Result<(), PlatformError> {
        if self.fail_post.load(Ordering::SeqCst) || self.closed() {
            return Err(PlatformError::new(
                "InvalidStateError",
                "encoder parameter port unavailable",
            ));
        }
        self.posted.lock().push(parameters.clone());
        Ok(())
    }

    fn close_channel(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) -> Result<(), PlatformError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Concrete handles to the nodes of one built chain, retained so tests can
/// drive and inspect them after the pipeline has taken ownership.
#[derive(Clone)]
pub struct MockChain {
    pub source: Arc<MockSourceNode>,
    pub gain: Arc<MockGainNode>,
    pub analyser: Arc<MockAnalyserNode>,
    pub encoder: Arc<MockEncoderChannel>,
}

/// Fake rendering context. Starts `Running`; state transitions notify the
/// installed listener synchronously.
pub struct MockRenderingContext {
    sample_rate: u32,
    state: Mutex<ContextState>,
    listener: Mutex<Option<Arc<dyn Fn(ContextState) + Send + Sync>>>,
    output_latency_secs: Mutex<f64>,
    fail_resume: AtomicBool,
    chain_failure: Mutex<Option<PlatformError>>,
    last_chain: Mutex<Option<MockChain>>,
}

impl MockRenderingContext {
    pub fn new(options: &ContextOptions) -> Arc<Self> {
        Arc::new(Self {
            sample_rate: options.sample_rate,
            state: Mutex::new(ContextState::Running),
            listener: Mutex::new(None),
            output_latency_secs: Mutex::new(0.02),
            fail_resume: AtomicBool::new(false),
            chain_failure: Mutex::new(None),
            last_chain: Mutex::new(None),
        })
    }

    /// Transition state and notify the listener, as the platform would.
    pub fn set_state(&self, state: ContextState) {
        *self.state.lock() = state;
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(state);
        }
    }

    pub fn set_output_latency_secs(&self, secs: f64) {
        *self.output_latency_secs.lock() = secs;
    }

    pub fn fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Make the next `build_capture_chain` fail with `error`.
    pub fn fail_chain_build(&self, error: PlatformError) {
        *self.chain_failure.lock() = Some(error);
    }

    /// Node handles of the most recently built chain.
    pub fn last_chain(&self) -> Option<MockChain> {
        self.last_chain.lock().clone()
    }

    pub fn has_state_listener(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl RenderingContextCapability for MockRenderingContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), PlatformError> {
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(PlatformError::new("InvalidStateError", "resume rejected"));
        }
        self.set_state(ContextState::Running);
        Ok(())
    }

    fn suspend(&self) -> Result<(), PlatformError> {
        self.set_state(ContextState::Suspended);
        Ok(())
    }

    fn close(&self) -> Result<(), PlatformError> {
        self.set_state(ContextState::Closed);
        Ok(())
    }

    fn output_latency_secs(&self) -> f64 {
        *self.output_latency_secs.lock()
    }

    fn set_state_listener(&self, listener: Option<ContextStateListener>) {
        *self.listener.lock() = listener.map(Arc::from);
    }

    fn build_capture_chain(
        &self,
        _stream: &dyn MediaStreamCapability,
        settings: &ChainSettings,
    ) -> Result<ChainNodes, PlatformError> {
        if let Some(error) = self.chain_failure.lock().take() {
            return Err(error);
        }

        let chain = MockChain {
            source: Arc::new(MockSourceNode {
                disconnected: AtomicBool::new(false),
            }),
            gain: Arc::new(MockGainNode {
                gain: Mutex::new(settings.gain),
                disconnected: AtomicBool::new(false),
            }),
            analyser: Arc::new(MockAnalyserNode {
                window: settings.analyser_window,
                samples: Mutex::new(Vec::new()),
                disconnected: AtomicBool::new(false),
            }),
            encoder: Arc::new(MockEncoderChannel::new()),
        };
        *self.last_chain.lock() = Some(chain.clone());

        Ok(ChainNodes {
            source: chain.source,
            gain: chain.gain,
            analyser: chain.analyser,
            encoder: chain.encoder,
        })
    }
}
