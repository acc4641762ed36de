//! Run snapshot and the coarse run stage.
//!
//! [`PipelineRun`] is the folded view of one run: every event seen so far
//! plus the state derived from them.  Snapshots are values.  The reducer
//! never mutates one in place; it clones the previous snapshot (cheap, the
//! heavy parts sit behind `Arc`) and changes the copy, so a caller holding an
//! older snapshot keeps seeing exactly what it was given.

use std::sync::Arc;

use serde::Serialize;

use super::event::{
    ErrorData, IntentEndData, IntentStartData, PipelineRunEvent, RunStartData, SttEndData,
    SttStartData, TtsEndData, TtsStartData,
};
use super::options::RunOptions;

// ---------------------------------------------------------------------------
// RunStage
// ---------------------------------------------------------------------------

/// Coarse state of a run.
///
/// ```text
/// run-start ──▶ Ready ──stt-start──▶ Stt ──intent-start──▶ Intent ──tts-start──▶ Tts
///                                                                   run-end ──▶ Done
/// any stage ──error──▶ Error
/// ```
///
/// `*-end` events mark their stage record done but do not move the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    /// `run-start` seen, no stage started yet.
    Ready,
    Stt,
    Intent,
    Tts,
    /// `run-end` seen.
    Done,
    /// `error` seen.
    Error,
}

impl RunStage {
    /// Returns `true` for the two stages no further events are expected after.
    ///
    /// ```
    /// use assist_pipeline::pipeline::RunStage;
    ///
    /// assert!(!RunStage::Ready.is_terminal());
    /// assert!(!RunStage::Stt.is_terminal());
    /// assert!(!RunStage::Intent.is_terminal());
    /// assert!(!RunStage::Tts.is_terminal());
    /// assert!(RunStage::Done.is_terminal());
    /// assert!(RunStage::Error.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Error)
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::Ready => "ready",
            RunStage::Stt => "stt",
            RunStage::Intent => "intent",
            RunStage::Tts => "tts",
            RunStage::Done => "done",
            RunStage::Error => "error",
        }
    }
}

impl Default for RunStage {
    fn default() -> Self {
        RunStage::Ready
    }
}

// ---------------------------------------------------------------------------
// StageRecord
// ---------------------------------------------------------------------------

/// One processing stage: its start payload, the end payload once it arrives,
/// and whether it has finished.
///
/// Serialized flat, so the end fields appear next to the start fields:
/// `{ "engine": .., "metadata": .., "stt_output": .., "done": true }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord<S, E> {
    #[serde(flatten)]
    pub start: S,
    #[serde(flatten)]
    pub end: Option<E>,
    pub done: bool,
}

impl<S: Clone, E> StageRecord<S, E> {
    pub fn started(start: S) -> Self {
        Self {
            start,
            end: None,
            done: false,
        }
    }

    /// A copy of this record with `end` merged in.
    pub fn finished(&self, end: E) -> Self {
        Self {
            start: self.start.clone(),
            end: Some(end),
            done: true,
        }
    }
}

pub type SttRecord = StageRecord<SttStartData, SttEndData>;
pub type IntentRecord = StageRecord<IntentStartData, IntentEndData>;
pub type TtsRecord = StageRecord<TtsStartData, TtsEndData>;

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// Snapshot of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    /// Options the run was launched with, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_options: Option<Arc<RunOptions>>,

    /// Every event folded so far, in arrival order.
    pub events: Vec<Arc<PipelineRunEvent>>,

    pub stage: RunStage,

    /// `run-start` payload.
    pub run: Arc<RunStartData>,

    /// Set only when `stage == RunStage::Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt: Option<Arc<SttRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Arc<IntentRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<Arc<TtsRecord>>,
}

impl PipelineRun {
    /// A fresh snapshot for a run that has just started.
    pub fn new(
        run: RunStartData,
        first_event: Arc<PipelineRunEvent>,
        init_options: Option<Arc<RunOptions>>,
    ) -> Self {
        Self {
            init_options,
            events: vec![first_event],
            stage: RunStage::Ready,
            run: Arc::new(run),
            error: None,
            stt: None,
            intent: None,
            tts: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Handler id to stream audio to, when the run starts at STT.
    pub fn stt_binary_handler_id(&self) -> Option<u32> {
        self.run.runner_data.stt_binary_handler_id
    }

    /// Recognized speech, once STT has finished.
    pub fn stt_text(&self) -> Option<&str> {
        self.stt
            .as_ref()
            .and_then(|record| record.end.as_ref())
            .map(|end| end.stt_output.text.as_str())
    }

    /// URL of the synthesized reply, once TTS has finished.
    pub fn tts_url(&self) -> Option<&str> {
        self.tts
            .as_ref()
            .and_then(|record| record.end.as_ref())
            .map(|end| end.tts_output.url.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
