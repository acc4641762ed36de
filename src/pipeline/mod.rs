//! Pipeline run tracking.
//!
//! This module folds the event stream of one assist pipeline run into
//! snapshots and manages the subscription that carries it.
//!
//! # Architecture
//!
//! ```text
//! Transport::subscribe({ type: "assist_pipeline/run", ..RunOptions })
//!        │
//!        ▼  pushed messages, in order
//! RunListener (runner.rs)
//!        │  decode ─▶ PipelineRunEvent        (event.rs)
//!        │  process_event(slot, event)        (reducer.rs, pure)
//!        ▼
//! on_run(PipelineRun)                         (state.rs)
//!
//! run-end / error ─▶ teardown watcher ─▶ Subscription::unsubscribe (once)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use assist_pipeline::pipeline::{start_run, PipelineStage, RunOptions, RunStage};
//! use assist_pipeline::transport::ReplayTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     # let recorded = Vec::new();
//!     let transport = ReplayTransport::new(recorded);
//!     let options = RunOptions::audio(16_000, PipelineStage::Tts);
//!
//!     let handle = start_run(&transport, options, |run| {
//!         if run.stage == RunStage::Error {
//!             eprintln!("run failed: {:?}", run.error);
//!         }
//!     })
//!     .await
//!     .expect("subscribe failed");
//!
//!     handle.closed().await;
//! }
//! ```

pub mod event;
pub mod options;
pub mod reducer;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use event::{EventData, EventDecodeError, PipelineRunEvent};
pub use options::{OptionsError, PipelineStage, RunInput, RunOptions, RUN_MESSAGE_TYPE};
pub use reducer::{process_event, replay_events, SequencingViolation};
pub use runner::{start_run, RunError, RunHandle};
pub use state::{IntentRecord, PipelineRun, RunStage, StageRecord, SttRecord, TtsRecord};
