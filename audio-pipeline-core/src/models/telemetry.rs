use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running totals the rendering thread may piggyback on a quantum report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderTotals {
    pub underrun_count: Option<u64>,
    pub overrun_count: Option<u64>,
}

/// One render-quantum report from the audio rendering thread.
///
/// Delivered fire-and-forget over the encoder message channel, one message
/// per render callback, in FIFO order per session. Absent wire fields
/// default to zero/false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderQuantumTelemetry {
    pub frame_count: u64,
    pub expected_frame_count: u64,
    pub underrun: bool,
    pub overrun: bool,
    pub dropped_frames: u64,
    pub timestamp: f64,
    pub sequence: u64,
    pub totals: Option<RenderTotals>,
}

impl RenderQuantumTelemetry {
    /// A quantum with no shortfall: expected frames delivered, no flags.
    pub fn is_clean(&self) -> bool {
        !self.underrun && !self.overrun && self.dropped_frames == 0
    }
}

/// Raw PCM frame produced by the encoder node.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
    pub data: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl PcmFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            received_at: Utc::now(),
        }
    }
}

/// Untyped payload as delivered by the encoder's message channel: an
/// optional JSON descriptor plus an optional binary buffer.
#[derive(Debug, Clone, Default)]
pub struct WirePayload {
    pub descriptor: Option<serde_json::Value>,
    pub binary: Option<Vec<u8>>,
}

impl WirePayload {
    pub fn render_quantum(telemetry: &RenderQuantumTelemetry) -> Self {
        let mut descriptor = serde_json::to_value(telemetry)
            .unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(ref mut map) = descriptor {
            map.insert("type".into(), "render-quantum".into());
        }
        Self {
            descriptor: Some(descriptor),
            binary: None,
        }
    }

    pub fn pcm(data: Vec<u8>) -> Self {
        Self {
            descriptor: None,
            binary: Some(data),
        }
    }
}

/// Typed routing of an encoder channel payload.
#[derive(Debug, Clone)]
pub enum EncoderMessage {
    RenderQuantum(RenderQuantumTelemetry),
    Pcm(PcmFrame),
    /// Neither telemetry nor a binary buffer; logged and dropped upstream.
    Unrecognized,
}

impl EncoderMessage {
    /// Wire routing rule: a descriptor tagged `render-quantum` is telemetry;
    /// any other payload carrying a binary buffer is a PCM frame.
    pub fn from_wire(payload: WirePayload) -> Self {
        if let Some(descriptor) = &payload.descriptor {
            let tag = descriptor.get("type").and_then(|v| v.as_str());
            if tag == Some("render-quantum") {
                match serde_json::from_value::<RenderQuantumTelemetry>(descriptor.clone()) {
                    Ok(telemetry) => return Self::RenderQuantum(telemetry),
                    Err(e) => {
                        log::warn!("malformed render-quantum payload dropped: {e}");
                        return Self::Unrecognized;
                    }
                }
            }
        }
        match payload.binary {
            Some(data) => Self::Pcm(PcmFrame::new(data)),
            None => Self::Unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_quantum_round_trip() {
        let telemetry = RenderQuantumTelemetry {
            frame_count: 96,
            expected_frame_count: 128,
            underrun: true,
            dropped_frames: 32,
            sequence: 7,
            ..Default::default()
        };
        let message = EncoderMessage::from_wire(WirePayload::render_quantum(&telemetry));
        match message {
            EncoderMessage::RenderQuantum(parsed) => assert_eq!(parsed, telemetry),
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn missing_wire_fields_default() {
        let payload = WirePayload {
            descriptor: Some(json!({ "type": "render-quantum", "frameCount": 128 })),
            binary: None,
        };
        match EncoderMessage::from_wire(payload) {
            EncoderMessage::RenderQuantum(telemetry) => {
                assert_eq!(telemetry.frame_count, 128);
                assert_eq!(telemetry.expected_frame_count, 0);
                assert!(!telemetry.underrun);
                assert_eq!(telemetry.totals, None);
            }
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn binary_payload_routes_to_pcm() {
        let payload = WirePayload {
            descriptor: Some(json!({ "type": "frame" })),
            binary: Some(vec![1, 2, 3, 4]),
        };
        match EncoderMessage::from_wire(payload) {
            EncoderMessage::Pcm(frame) => assert_eq!(frame.data, vec![1, 2, 3, 4]),
            other => panic!("expected pcm, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_is_unrecognized() {
        assert!(matches!(
            EncoderMessage::from_wire(WirePayload::default()),
            EncoderMessage::Unrecognized
        ));
    }

    #[test]
    fn clean_quantum_detection() {
        let clean = RenderQuantumTelemetry {
            frame_count: 128,
            expected_frame_count: 128,
            ..Default::default()
        };
        assert!(clean.is_clean());
        let dirty = RenderQuantumTelemetry {
            underrun: true,
            ..clean
        };
        assert!(!dirty.is_clean());
    }
}
