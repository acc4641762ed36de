//! Wire events pushed by the assist pipeline while a run is in progress.
//!
//! Every event arrives as a JSON envelope:
//!
//! ```text
//! { "type": "stt-end", "timestamp": "2023-04-01T12:00:03Z", "data": { ... } }
//! ```
//!
//! [`PipelineRunEvent`] decodes the envelope into the closed set of
//! [`EventData`] variants.  Kinds this crate does not know about (e.g.
//! `stt-vad-start`) are kept verbatim in [`EventData::Other`] so a newer
//! server never breaks an older client.
//!
//! Only the structural shape of each payload is checked.  Field values are
//! passed through untouched.

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Kind strings
// ---------------------------------------------------------------------------

pub const RUN_START: &str = "run-start";
pub const RUN_END: &str = "run-end";
pub const ERROR: &str = "error";
pub const STT_START: &str = "stt-start";
pub const STT_END: &str = "stt-end";
pub const INTENT_START: &str = "intent-start";
pub const INTENT_END: &str = "intent-end";
pub const TTS_START: &str = "tts-start";
pub const TTS_END: &str = "tts-end";

/// `true` for the kinds that close a run (`run-end` and `error`).
pub fn is_terminal_kind(kind: &str) -> bool {
    matches!(kind, RUN_END | ERROR)
}

// ---------------------------------------------------------------------------
// EventDecodeError
// ---------------------------------------------------------------------------

/// A message could not be decoded into a [`PipelineRunEvent`].
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The message is not a `{ type, timestamp, data }` object.
    #[error("malformed event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The envelope is fine but `data` does not fit the shape of its kind.
    #[error("malformed `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Runner parameters announced by `run-start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerData {
    /// Handler id for streaming binary audio into the STT stage.  `None` when
    /// the run does not start at STT.
    #[serde(default)]
    pub stt_binary_handler_id: Option<u32>,
    /// Server-side run timeout in seconds.  Opaque to this crate.
    pub timeout: Number,
}

/// Payload of `run-start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartData {
    pub pipeline: String,
    pub language: String,
    pub runner_data: RunnerData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

/// Audio format announced to the STT engine.
///
/// Every field is optional; engines report what they know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SttMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttStartData {
    pub engine: String,
    #[serde(default)]
    pub metadata: SttMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttOutput {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttEndData {
    pub stt_output: SttOutput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentStartData {
    pub engine: String,
    pub language: String,
    pub intent_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Fields such as `device_id` that only some servers send.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Conversation agent result.
///
/// Only `conversation_id` is lifted out; the response body is carried as-is
/// in `extra` because its shape belongs to the conversation agent, not to
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEndData {
    pub intent_output: IntentOutput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsStartData {
    pub engine: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub tts_input: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsOutput {
    pub media_id: String,
    pub url: String,
    pub mime_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsEndData {
    pub tts_output: TtsOutput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// EventData
// ---------------------------------------------------------------------------

/// Kind-specific payload of a [`PipelineRunEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    RunStart(RunStartData),
    RunEnd,
    Error(ErrorData),
    SttStart(SttStartData),
    SttEnd(SttEndData),
    IntentStart(IntentStartData),
    IntentEnd(IntentEndData),
    TtsStart(TtsStartData),
    TtsEnd(TtsEndData),
    /// A kind this crate does not model, kept verbatim.
    Other { kind: String, data: Value },
}

impl EventData {
    /// The wire `type` string for this payload.
    pub fn kind(&self) -> &str {
        match self {
            EventData::RunStart(_) => RUN_START,
            EventData::RunEnd => RUN_END,
            EventData::Error(_) => ERROR,
            EventData::SttStart(_) => STT_START,
            EventData::SttEnd(_) => STT_END,
            EventData::IntentStart(_) => INTENT_START,
            EventData::IntentEnd(_) => INTENT_END,
            EventData::TtsStart(_) => TTS_START,
            EventData::TtsEnd(_) => TTS_END,
            EventData::Other { kind, .. } => kind,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRunEvent
// ---------------------------------------------------------------------------

/// One timestamped event of a pipeline run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireEvent")]
pub struct PipelineRunEvent {
    pub timestamp: String,
    pub data: EventData,
}

impl PipelineRunEvent {
    pub fn new(timestamp: impl Into<String>, data: EventData) -> Self {
        Self {
            timestamp: timestamp.into(),
            data,
        }
    }

    /// Decode a raw transport message.
    pub fn from_value(value: Value) -> Result<Self, EventDecodeError> {
        let wire: WireEvent = serde_json::from_value(value).map_err(EventDecodeError::Envelope)?;
        Self::try_from(wire)
    }

    pub fn kind(&self) -> &str {
        self.data.kind()
    }

    /// `run-end` and `error` close a run.
    pub fn is_terminal(&self) -> bool {
        is_terminal_kind(self.kind())
    }
}

impl Serialize for PipelineRunEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PipelineRunEvent", 3)?;
        state.serialize_field("type", self.kind())?;
        state.serialize_field("timestamp", &self.timestamp)?;
        match &self.data {
            EventData::RunStart(data) => state.serialize_field("data", data)?,
            EventData::RunEnd => state.serialize_field("data", &Map::new())?,
            EventData::Error(data) => state.serialize_field("data", data)?,
            EventData::SttStart(data) => state.serialize_field("data", data)?,
            EventData::SttEnd(data) => state.serialize_field("data", data)?,
            EventData::IntentStart(data) => state.serialize_field("data", data)?,
            EventData::IntentEnd(data) => state.serialize_field("data", data)?,
            EventData::TtsStart(data) => state.serialize_field("data", data)?,
            EventData::TtsEnd(data) => state.serialize_field("data", data)?,
            EventData::Other { data, .. } => state.serialize_field("data", data)?,
        }
        state.end()
    }
}

/// The untyped envelope as it appears on the wire.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    timestamp: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, EventDecodeError> {
    serde_json::from_value(data).map_err(|source| EventDecodeError::Payload {
        kind: kind.to_string(),
        source,
    })
}

impl TryFrom<WireEvent> for PipelineRunEvent {
    type Error = EventDecodeError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let kind = wire.kind.as_str();
        let data = match kind {
            RUN_START => EventData::RunStart(payload(kind, wire.data)?),
            RUN_END => EventData::RunEnd,
            ERROR => EventData::Error(payload(kind, wire.data)?),
            STT_START => EventData::SttStart(payload(kind, wire.data)?),
            STT_END => EventData::SttEnd(payload(kind, wire.data)?),
            INTENT_START => EventData::IntentStart(payload(kind, wire.data)?),
            INTENT_END => EventData::IntentEnd(payload(kind, wire.data)?),
            TTS_START => EventData::TtsStart(payload(kind, wire.data)?),
            TTS_END => EventData::TtsEnd(payload(kind, wire.data)?),
            _ => EventData::Other {
                kind: wire.kind.clone(),
                data: wire.data,
            },
        };
        Ok(Self {
            timestamp: wire.timestamp,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> PipelineRunEvent {
        PipelineRunEvent::from_value(value).expect("event should decode")
    }

    // ---- decoding known kinds ---

    #[test]
    fn decodes_run_start() {
        let event = decode(json!({
            "type": "run-start",
            "timestamp": "2023-04-01T12:00:00Z",
            "data": {
                "pipeline": "01gx",
                "language": "en",
                "runner_data": { "stt_binary_handler_id": 1, "timeout": 300 }
            }
        }));

        assert_eq!(event.kind(), RUN_START);
        assert_eq!(event.timestamp, "2023-04-01T12:00:00Z");
        match event.data {
            EventData::RunStart(data) => {
                assert_eq!(data.pipeline, "01gx");
                assert_eq!(data.runner_data.stt_binary_handler_id, Some(1));
                assert_eq!(data.runner_data.timeout.as_u64(), Some(300));
            }
            other => panic!("expected run-start, got {other:?}"),
        }
    }

    #[test]
    fn run_start_accepts_null_handler_id() {
        let event = decode(json!({
            "type": "run-start",
            "timestamp": "t",
            "data": {
                "pipeline": "p",
                "language": "en",
                "runner_data": { "stt_binary_handler_id": null, "timeout": 30 }
            }
        }));
        assert!(matches!(
            event.data,
            EventData::RunStart(RunStartData {
                runner_data: RunnerData {
                    stt_binary_handler_id: None,
                    ..
                },
                ..
            })
        ));
    }

    #[test]
    fn run_start_accepts_fractional_timeout() {
        let event = decode(json!({
            "type": "run-start",
            "timestamp": "t",
            "data": {
                "pipeline": "p",
                "language": "en",
                "runner_data": { "stt_binary_handler_id": 1, "timeout": 300.5 }
            }
        }));
        match event.data {
            EventData::RunStart(data) => {
                assert_eq!(data.runner_data.timeout.as_f64(), Some(300.5));
            }
            other => panic!("expected run-start, got {other:?}"),
        }
    }

    #[test]
    fn stt_start_tolerates_partial_metadata() {
        let event = decode(json!({
            "type": "stt-start",
            "timestamp": "t",
            "data": {
                "engine": "stt.cloud",
                "metadata": { "language": "en", "sample_rate": 44100.0, "channels": 2 }
            }
        }));
        match event.data {
            EventData::SttStart(data) => {
                assert_eq!(data.metadata.language.as_deref(), Some("en"));
                assert_eq!(data.metadata.sample_rate.and_then(|n| n.as_f64()), Some(44_100.0));
                assert!(data.metadata.codec.is_none());
                assert_eq!(data.metadata.extra["channels"], 2);
            }
            other => panic!("expected stt-start, got {other:?}"),
        }

        let bare = decode(json!({ "type": "stt-start", "timestamp": "t", "data": { "engine": "e" } }));
        assert!(matches!(bare.data, EventData::SttStart(_)));
    }

    #[test]
    fn decodes_run_end_with_empty_data() {
        let event = decode(json!({ "type": "run-end", "timestamp": "t", "data": {} }));
        assert_eq!(event.data, EventData::RunEnd);
        assert!(event.is_terminal());
    }

    #[test]
    fn decodes_error() {
        let event = decode(json!({
            "type": "error",
            "timestamp": "t",
            "data": { "code": "stt-no-text-recognized", "message": "No text recognized" }
        }));
        assert!(event.is_terminal());
        assert_eq!(
            event.data,
            EventData::Error(ErrorData {
                code: "stt-no-text-recognized".into(),
                message: "No text recognized".into(),
            })
        );
    }

    #[test]
    fn decodes_intent_end_and_keeps_response_body() {
        let event = decode(json!({
            "type": "intent-end",
            "timestamp": "t",
            "data": {
                "intent_output": {
                    "conversation_id": "abc",
                    "response": { "speech": { "plain": { "speech": "Turned on" } } }
                }
            }
        }));
        match event.data {
            EventData::IntentEnd(data) => {
                assert_eq!(data.intent_output.conversation_id.as_deref(), Some("abc"));
                assert!(data.intent_output.extra.contains_key("response"));
            }
            other => panic!("expected intent-end, got {other:?}"),
        }
    }

    #[test]
    fn stage_events_are_not_terminal() {
        let event = decode(json!({
            "type": "tts-start",
            "timestamp": "t",
            "data": { "engine": "tts.piper", "language": "en", "tts_input": "hello" }
        }));
        assert!(!event.is_terminal());
    }

    // ---- forward compatibility ---

    #[test]
    fn unknown_kind_is_kept_verbatim() {
        let event = decode(json!({
            "type": "stt-vad-start",
            "timestamp": "t",
            "data": { "timestamp": 1200 }
        }));
        assert_eq!(event.kind(), "stt-vad-start");
        assert_eq!(
            event.data,
            EventData::Other {
                kind: "stt-vad-start".into(),
                data: json!({ "timestamp": 1200 }),
            }
        );
        assert!(!event.is_terminal());
    }

    // ---- shape errors ---

    #[test]
    fn missing_type_is_an_envelope_error() {
        let err = PipelineRunEvent::from_value(json!({ "timestamp": "t", "data": {} }))
            .unwrap_err();
        assert!(matches!(err, EventDecodeError::Envelope(_)));
    }

    #[test]
    fn wrong_payload_shape_names_the_kind() {
        let err = PipelineRunEvent::from_value(json!({
            "type": "stt-end",
            "timestamp": "t",
            "data": { "text": "hi" }
        }))
        .unwrap_err();
        match &err {
            EventDecodeError::Payload { kind, .. } => assert_eq!(kind, STT_END),
            other => panic!("expected payload error, got {other:?}"),
        }
        assert!(err.to_string().contains("stt-end"));
    }

    // ---- encoding ---

    #[test]
    fn serializes_back_to_wire_shape() {
        let event = PipelineRunEvent::new(
            "t",
            EventData::SttEnd(SttEndData {
                stt_output: SttOutput {
                    text: "hi".into(),
                    extra: Map::new(),
                },
                extra: Map::new(),
            }),
        );
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "stt-end", "timestamp": "t", "data": { "stt_output": { "text": "hi" } } })
        );
    }

    #[test]
    fn run_end_serializes_empty_object() {
        let event = PipelineRunEvent::new("t", EventData::RunEnd);
        assert_eq!(
            serde_json::to_value(&event).unwrap()["data"],
            json!({})
        );
    }
}
