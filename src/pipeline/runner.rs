//! Run orchestrator: subscribes to a run, folds its events and tears the
//! subscription down when the run ends.
//!
//! # Flow
//!
//! ```text
//! start_run(transport, options, on_run)
//!   └─▶ transport.subscribe({ type: "assist_pipeline/run", ..options })
//!         │
//!         ▼  every pushed message (delivery context)
//!       decode ─▶ process_event(slot, event) ─▶ slot
//!         │                                     └─▶ on_run(snapshot)
//!         └─ run-end / error ─▶ signal watcher ─▶ unsubscribe (once)
//! ```
//!
//! Folding happens synchronously inside the transport's listener.  The only
//! task spawned is the teardown watcher, which sleeps until the run ends and
//! then unsubscribes.  [`RunHandle::cancel`] unsubscribes early; whichever
//! path gets there first does the unsubscribe, the other is a no-op.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::transport::{EventCallback, Subscription, Transport, TransportError};

use super::event::{is_terminal_kind, EventData, PipelineRunEvent};
use super::options::{OptionsError, RunOptions};
use super::reducer::process_event;
use super::state::PipelineRun;

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Errors that prevent a run from starting.
///
/// Failures reported by the server during the run are not errors here; they
/// arrive as a snapshot with `stage == RunStage::Error`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run options: {0}")]
    InvalidOptions(#[from] OptionsError),

    #[error("failed to encode run request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// Owns the subscription and hands it out for unsubscribing exactly once.
struct Teardown {
    subscription: Mutex<Option<Box<dyn Subscription>>>,
}

impl Teardown {
    /// Unsubscribe if nobody has yet.  Returns `false` when already done.
    ///
    /// The lock is held across the unsubscribe so a concurrent caller waits
    /// for it to finish instead of returning early.
    async fn unsubscribe(&self) -> Result<bool, TransportError> {
        let mut slot = self.subscription.lock().await;
        match slot.take() {
            Some(mut subscription) => {
                subscription.unsubscribe().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// RunHandle
// ---------------------------------------------------------------------------

/// Handle to a started run.
///
/// Dropping the handle does not stop the run; it still ends (and
/// unsubscribes) when the server finishes it.
pub struct RunHandle {
    teardown: Arc<Teardown>,
    watcher: JoinHandle<()>,
}

impl RunHandle {
    /// Stop the run now.
    ///
    /// Messages already in flight may still be folded and delivered before the
    /// transport stops pushing.  Returns the transport's error if the
    /// unsubscribe fails; succeeds without doing anything if the run already
    /// tore itself down.
    pub async fn cancel(self) -> Result<(), TransportError> {
        let result = self.teardown.unsubscribe().await;
        self.watcher.abort();
        match result {
            Ok(true) => log::debug!("pipeline: run cancelled"),
            Ok(false) => log::debug!("pipeline: cancel after run already closed"),
            Err(ref e) => log::warn!("pipeline: cancel failed: {e}"),
        }
        result.map(|_| ())
    }

    /// Wait until the run has ended and its subscription is closed, or the
    /// transport dropped the listener without a terminal event.
    pub async fn closed(self) {
        if let Err(e) = self.watcher.await {
            log::warn!("pipeline: teardown task failed: {e}");
        }
    }

    /// `true` once the teardown watcher has exited.
    pub fn is_closed(&self) -> bool {
        self.watcher.is_finished()
    }
}

// ---------------------------------------------------------------------------
// start_run
// ---------------------------------------------------------------------------

/// Start a pipeline run.
///
/// `on_run` receives every new snapshot, synchronously, from the transport's
/// delivery context.  It is not called for events that were rejected before
/// any `run-start`, nor for anything delivered after the terminal event.
///
/// Must be called from within a tokio runtime.
///
/// ```rust,no_run
/// use assist_pipeline::pipeline::{start_run, PipelineStage, RunOptions};
/// use assist_pipeline::transport::ReplayTransport;
///
/// # async fn example() -> Result<(), assist_pipeline::pipeline::RunError> {
/// let transport = ReplayTransport::new(Vec::new());
/// let options = RunOptions::text(PipelineStage::Intent, "what time is it", PipelineStage::Tts);
///
/// let handle = start_run(&transport, options, |run| {
///     println!("{} ({} events)", run.stage.label(), run.events.len());
/// })
/// .await?;
/// handle.closed().await;
/// # Ok(())
/// # }
/// ```
pub async fn start_run<F>(
    transport: &dyn Transport,
    options: RunOptions,
    on_run: F,
) -> Result<RunHandle, RunError>
where
    F: FnMut(PipelineRun) + Send + 'static,
{
    options.validate()?;
    let payload = options.subscribe_payload()?;

    let (terminal_tx, terminal_rx) = oneshot::channel();
    let listener = RunListener::new(Arc::new(options), on_run, terminal_tx);

    log::debug!("pipeline: subscribing to run");
    let subscription = transport
        .subscribe(payload, listener.into_callback())
        .await?;

    let teardown = Arc::new(Teardown {
        subscription: Mutex::new(Some(subscription)),
    });

    let watcher = tokio::spawn({
        let teardown = Arc::clone(&teardown);
        async move {
            // An error means the listener was dropped without a terminal
            // event: the transport closed the subscription on its own.
            if terminal_rx.await.is_err() {
                log::debug!("pipeline: listener dropped before the run ended");
                return;
            }
            match teardown.unsubscribe().await {
                Ok(true) => log::debug!("pipeline: run ended, unsubscribed"),
                Ok(false) => {}
                Err(e) => log::warn!("pipeline: unsubscribe after run end failed: {e}"),
            }
        }
    });

    Ok(RunHandle { teardown, watcher })
}

// ---------------------------------------------------------------------------
// RunListener
// ---------------------------------------------------------------------------

/// Per-run state owned by the transport listener.
struct RunListener<F> {
    options: Arc<RunOptions>,
    current: Option<PipelineRun>,
    on_run: F,
    terminal_tx: Option<oneshot::Sender<()>>,
}

impl<F> RunListener<F>
where
    F: FnMut(PipelineRun) + Send + 'static,
{
    fn new(options: Arc<RunOptions>, on_run: F, terminal_tx: oneshot::Sender<()>) -> Self {
        Self {
            options,
            current: None,
            on_run,
            terminal_tx: Some(terminal_tx),
        }
    }

    fn into_callback(mut self) -> EventCallback {
        Box::new(move |message| self.handle(message))
    }

    fn finished(&self) -> bool {
        self.terminal_tx.is_none()
    }

    fn signal_terminal(&mut self) {
        if let Some(tx) = self.terminal_tx.take() {
            let _ = tx.send(());
        }
    }

    fn handle(&mut self, message: Value) {
        if self.finished() {
            log::debug!("pipeline: ignoring message delivered after the run ended");
            return;
        }

        // Read before decoding so a terminal envelope with a bad payload
        // still closes the run.
        let terminal_envelope = message
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(is_terminal_kind);

        let event = match PipelineRunEvent::from_value(message) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                log::warn!("pipeline: dropping undecodable message: {e}");
                if terminal_envelope {
                    self.signal_terminal();
                }
                return;
            }
        };

        if matches!(event.data, EventData::RunStart(_)) && self.current.is_some() {
            log::debug!("pipeline: run-start during an active run, starting over");
        }

        let terminal = event.is_terminal();
        match process_event(self.current.as_ref(), event, Some(&self.options)) {
            Ok(run) => self.current = Some(run),
            Err(violation) => log::warn!("pipeline: dropping event: {violation}"),
        }

        if terminal {
            self.signal_terminal();
        }

        if let Some(run) = &self.current {
            (self.on_run)(run.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
