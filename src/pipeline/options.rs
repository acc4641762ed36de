//! Launch options for a pipeline run.
//!
//! [`RunOptions`] is what the caller asks for; [`RunOptions::subscribe_payload`]
//! turns it into the message that opens the run subscription.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message type that asks the server to start a run.
pub const RUN_MESSAGE_TYPE: &str = "assist_pipeline/run";

// ---------------------------------------------------------------------------
// PipelineStage
// ---------------------------------------------------------------------------

/// A processing stage a run can start or end at.
///
/// Ordered in pipeline order, so `start <= end` is the valid range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Stt,
    Intent,
    Tts,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Stt => "stt",
            PipelineStage::Intent => "intent",
            PipelineStage::Tts => "tts",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunInput
// ---------------------------------------------------------------------------

/// Stage-appropriate input.  Audio for STT, text for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunInput {
    Audio { sample_rate: u32 },
    Text { text: String },
}

// ---------------------------------------------------------------------------
// OptionsError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("a run starting at `{0}` needs {expected} input", expected = expected_input(.0))]
    InputMismatch(PipelineStage),

    #[error("end stage `{end}` comes before start stage `{start}`")]
    StageOrder {
        start: PipelineStage,
        end: PipelineStage,
    },
}

fn expected_input(stage: &PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Stt => "audio (`sample_rate`)",
        PipelineStage::Intent | PipelineStage::Tts => "text",
    }
}

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Options a run is launched with.
///
/// ```
/// use assist_pipeline::pipeline::{PipelineStage, RunOptions};
///
/// let options = RunOptions::text(PipelineStage::Intent, "turn on the lights", PipelineStage::Tts)
///     .with_pipeline("01gx");
/// assert!(options.validate().is_ok());
///
/// let payload = options.subscribe_payload().unwrap();
/// assert_eq!(payload["type"], "assist_pipeline/run");
/// assert_eq!(payload["input"]["text"], "turn on the lights");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub start_stage: PipelineStage,
    pub end_stage: PipelineStage,
    pub input: RunInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl RunOptions {
    /// A run fed with streamed audio, starting at STT.
    pub fn audio(sample_rate: u32, end_stage: PipelineStage) -> Self {
        Self {
            start_stage: PipelineStage::Stt,
            end_stage,
            input: RunInput::Audio { sample_rate },
            pipeline: None,
            conversation_id: None,
        }
    }

    /// A run fed with text, starting at `intent` or `tts`.
    pub fn text(start_stage: PipelineStage, text: impl Into<String>, end_stage: PipelineStage) -> Self {
        Self {
            start_stage,
            end_stage,
            input: RunInput::Text { text: text.into() },
            pipeline: None,
            conversation_id: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Check that the input kind matches the start stage and that the stage
    /// range is not inverted.
    pub fn validate(&self) -> Result<(), OptionsError> {
        let input_ok = match (&self.start_stage, &self.input) {
            (PipelineStage::Stt, RunInput::Audio { .. }) => true,
            (PipelineStage::Intent | PipelineStage::Tts, RunInput::Text { .. }) => true,
            _ => false,
        };
        if !input_ok {
            return Err(OptionsError::InputMismatch(self.start_stage));
        }
        if self.end_stage < self.start_stage {
            return Err(OptionsError::StageOrder {
                start: self.start_stage,
                end: self.end_stage,
            });
        }
        Ok(())
    }

    /// The subscribe message: these options plus the run-request `type`.
    pub fn subscribe_payload(&self) -> Result<Value, serde_json::Error> {
        let mut payload = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut payload {
            map.insert("type".into(), Value::from(RUN_MESSAGE_TYPE));
        }
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
