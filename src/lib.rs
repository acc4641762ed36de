//! Client-side tracking of voice assistant pipeline runs.
//!
//! A run is one pass through speech-to-text, intent recognition and
//! text-to-speech on a remote server, reported back as a stream of typed
//! events.  This crate folds that stream into run snapshots and manages the
//! subscription carrying it.
//!
//! * [`pipeline`]: wire events, the pure run reducer, and the run
//!   orchestrator ([`pipeline::start_run`]).
//! * [`transport`]: the subscribe/call seam to the server, plus a replay
//!   transport for recorded runs.
//! * [`client`]: pipeline management and debug-run calls.
//! * [`config`]: TOML settings.

pub mod client;
pub mod config;
pub mod pipeline;
pub mod transport;
