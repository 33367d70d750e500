//! # audio-pipeline-testkit
//!
//! In-memory fakes for every platform capability `audio-pipeline-core`
//! consumes: devices, microphone streams, rendering contexts, chain nodes,
//! and the encoder message channel.
//!
//! The fakes are deterministic and fully scriptable: tests queue platform
//! failures, override granted stream settings, inject analyser samples, and
//! deliver encoder payloads on demand, then assert on what the pipeline did
//! with them.

pub mod device;
pub mod environment;
pub mod rendering;

pub use device::{MockDeviceCapability, MockMediaStream};
pub use environment::MockEnvironment;
pub use rendering::{
    MockAnalyserNode, MockChain, MockEncoderChannel, MockGainNode, MockRenderingContext,
    MockSourceNode,
};
