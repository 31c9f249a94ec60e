//! Dev-server support (§6 "Dev-server wire protocol", §9 rebuild-dispatch
//! redesign flag): the wire message types, the watcher abstraction, and
//! the `Idle → Building → {Success|Failed} → Idle` state machine that
//! `bundler_core` drives its incremental rebuild loop with.
//!
//! The HTTP/WebSocket transport itself is out of scope (§1 "the
//! HTTP/WebSocket server framework" is an external collaborator) — this
//! crate only owns the message shapes and the dispatch state, matching how
//! the teacher never bundles a web server either.

pub mod protocol;
pub mod state_machine;
pub mod watcher;

pub use protocol::{ClientMessage, ModuleUpdate, ServerMessage, UpdateKind};
pub use state_machine::{BuildOutcome, BuildState, BuildStateMachine};
pub use watcher::{NotifyWatcher, WatchEvent, WatchEventKind, Watcher};
