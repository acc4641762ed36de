//! Run reducer: folds one event into a run snapshot.
//!
//! [`process_event`] is pure.  It takes the current snapshot (if any) by
//! reference and returns a new one, leaving the input untouched.  Problems
//! with event order come back as a [`SequencingViolation`] instead of being
//! logged here, so the caller decides how loud to be about them.
//!
//! Ordering rules:
//!
//! * `run-start` always begins a new snapshot, discarding whatever came
//!   before.
//! * Any other event needs a snapshot to fold into.
//! * `*-start` replaces the stage record and moves the stage.
//! * `*-end` merges into the existing record and flips `done`; the stage
//!   stays where it is.
//! * `run-end` and `error` move to the terminal stages.
//! * Unknown kinds only extend the event history.

use std::sync::Arc;

use thiserror::Error;

use super::event::{EventData, PipelineRunEvent};
use super::options::RunOptions;
use super::state::{PipelineRun, RunStage, StageRecord};

// ---------------------------------------------------------------------------
// SequencingViolation
// ---------------------------------------------------------------------------

/// An event arrived where the run's causal order does not allow it.
///
/// Non-fatal: the event is dropped and the previous snapshot stays current.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingViolation {
    /// A non-`run-start` event arrived with no run to fold it into.
    #[error("`{kind}` event received with no active run")]
    NoActiveRun { kind: String },

    /// A `*-end` event arrived for a stage that never started.
    #[error("`{kind}` event received before its stage started")]
    EndWithoutStart { kind: String },
}

// ---------------------------------------------------------------------------
// process_event
// ---------------------------------------------------------------------------

/// Fold `event` into `run`.
///
/// `options` are recorded on the snapshot when `event` is `run-start` and
/// ignored otherwise.
///
/// ```
/// use std::sync::Arc;
/// use assist_pipeline::pipeline::{process_event, PipelineRunEvent, RunStage};
/// use serde_json::json;
///
/// let start = PipelineRunEvent::from_value(json!({
///     "type": "run-start",
///     "timestamp": "t0",
///     "data": {
///         "pipeline": "01gx",
///         "language": "en",
///         "runner_data": { "stt_binary_handler_id": null, "timeout": 300 }
///     }
/// })).unwrap();
/// let end = PipelineRunEvent::from_value(json!({
///     "type": "run-end", "timestamp": "t1", "data": {}
/// })).unwrap();
///
/// let run = process_event(None, Arc::new(start), None).unwrap();
/// let done = process_event(Some(&run), Arc::new(end), None).unwrap();
///
/// assert_eq!(run.stage, RunStage::Ready);
/// assert_eq!(done.stage, RunStage::Done);
/// assert_eq!(done.events.len(), 2);
/// ```
pub fn process_event(
    run: Option<&PipelineRun>,
    event: Arc<PipelineRunEvent>,
    options: Option<&Arc<RunOptions>>,
) -> Result<PipelineRun, SequencingViolation> {
    let mut next = match (&event.data, run) {
        (EventData::RunStart(data), _) => {
            return Ok(PipelineRun::new(
                data.clone(),
                Arc::clone(&event),
                options.cloned(),
            ));
        }
        (_, None) => {
            return Err(SequencingViolation::NoActiveRun {
                kind: event.kind().to_string(),
            });
        }
        (_, Some(current)) => current.clone(),
    };

    match &event.data {
        // run-start is handled above; unknown kinds only extend the history.
        EventData::RunStart(_) | EventData::Other { .. } => {}

        EventData::SttStart(start) => {
            next.stage = RunStage::Stt;
            next.stt = Some(Arc::new(StageRecord::started(start.clone())));
        }
        EventData::SttEnd(end) => {
            next.stt = Some(Arc::new(finish(next.stt.as_deref(), end, &event)?));
        }

        EventData::IntentStart(start) => {
            next.stage = RunStage::Intent;
            next.intent = Some(Arc::new(StageRecord::started(start.clone())));
        }
        EventData::IntentEnd(end) => {
            next.intent = Some(Arc::new(finish(next.intent.as_deref(), end, &event)?));
        }

        EventData::TtsStart(start) => {
            next.stage = RunStage::Tts;
            next.tts = Some(Arc::new(StageRecord::started(start.clone())));
        }
        EventData::TtsEnd(end) => {
            next.tts = Some(Arc::new(finish(next.tts.as_deref(), end, &event)?));
        }

        EventData::RunEnd => {
            next.stage = RunStage::Done;
        }
        EventData::Error(error) => {
            next.stage = RunStage::Error;
            next.error = Some(error.clone());
        }
    }

    next.events.push(event);
    Ok(next)
}

fn finish<S: Clone, E: Clone>(
    record: Option<&StageRecord<S, E>>,
    end: &E,
    event: &PipelineRunEvent,
) -> Result<StageRecord<S, E>, SequencingViolation> {
    record
        .map(|record| record.finished(end.clone()))
        .ok_or_else(|| SequencingViolation::EndWithoutStart {
            kind: event.kind().to_string(),
        })
}

// ---------------------------------------------------------------------------
// replay_events
// ---------------------------------------------------------------------------

/// Fold a recorded event list (e.g. a debug run fetched from the server)
/// from scratch.
///
/// Out-of-order events are skipped with a warning, exactly as a live run
/// would skip them.  Returns `None` if the recording never contains a
/// `run-start`.
pub fn replay_events<I>(events: I, options: Option<Arc<RunOptions>>) -> Option<PipelineRun>
where
    I: IntoIterator<Item = PipelineRunEvent>,
{
    let mut current: Option<PipelineRun> = None;
    for event in events {
        match process_event(current.as_ref(), Arc::new(event), options.as_ref()) {
            Ok(run) => current = Some(run),
            Err(violation) => log::warn!("replay: skipping event: {violation}"),
        }
    }
    current
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
