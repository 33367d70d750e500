//! # audio-pipeline-core
//!
//! Platform-agnostic real-time audio capture and processing pipeline.
//!
//! Provides microphone stream acquisition, a live signal-processing graph,
//! per-cycle audio metrics, performance budget tracking, and a typed
//! event/error contract. Platform backends implement the capability traits
//! (`AudioEnvironment` and the surfaces it aggregates) and plug into the
//! generic `AudioCaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! audio-pipeline-core (this crate)
//! ├── traits/       ← AudioEnvironment, DeviceCapability, RenderingContextCapability, …
//! ├── models/       ← AudioProcessingError, CaptureState, CaptureConfig, AudioMetrics, events
//! ├── processing/   ← level math, sample-rate resolution, performance/CPU budgets
//! ├── graph/        ← ProcessingChainEngine, render telemetry bridge
//! └── session/      ← AudioCaptureController, DeviceValidator, EventDispatcher
//! ```

pub mod graph;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use graph::chain::{ProcessingChainEngine, ProcessingGraph};
pub use graph::telemetry_bridge::{TelemetryListener, TelemetryListenerId};
pub use models::config::{
    CaptureConfig, CaptureConfigPatch, LatencyHint, ProcessingConfig, ProcessingConfigPatch,
    ProcessingLevel,
};
pub use models::error::{
    classify_platform_error, AudioProcessingError, ErrorCode, ErrorContext, PlatformError,
    RecommendedAction, RecoveryPlan, Severity,
};
pub use models::events::{CaptureEvent, EventKind};
pub use models::metrics::{AudioMetrics, AudioMetricsPatch};
pub use models::state::CaptureState;
pub use models::telemetry::{EncoderMessage, PcmFrame, RenderQuantumTelemetry, WirePayload};
pub use models::validation::{
    DeviceValidationResult, InputDeviceInfo, PermissionStatus, StreamConstraints, StreamSettings,
};
pub use processing::budget::{BudgetSummary, PerformanceBudgetTracker};
pub use processing::cpu_load::{CpuLoadSummary, CpuLoadTracker};
pub use session::controller::AudioCaptureController;
pub use session::dispatcher::{EventDispatcher, SubscriptionId};
pub use session::validator::DeviceValidator;
pub use traits::device::{DeviceCapability, MediaStreamCapability};
pub use traits::environment::AudioEnvironment;
pub use traits::messaging::{EncoderMessageHandler, MessageChannelCapability};
pub use traits::rendering::{
    AnalyserNodeCapability, ChainNodes, ChainSettings, ContextOptions, ContextState,
    ContextStateListener, GainNodeCapability, RenderingContextCapability, SourceNodeCapability,
};
