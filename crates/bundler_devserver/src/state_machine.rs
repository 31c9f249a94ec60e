//! The rebuild dispatch state machine (§9 redesign flag: "the watcher +
//! rebundle dispatch uses callback chains that implicitly capture state.
//! Reformulate as an explicit state machine: `Idle → Building →
//! {Success → Idle | Failed → Idle}`, with watcher events queued between
//! transitions").
//!
//! No teacher precedent (`good_fences` runs once and exits); this is a
//! from-scratch state machine grounded directly on §9's description.

use crate::watcher::WatchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Building,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failed,
}

/// Owns exactly one of `Idle`/`Building` at a time, plus the watcher
/// events that arrived while a build was already running — those queue
/// instead of starting a second, overlapping build, and are handed back
/// the next time [`BuildStateMachine::begin_build`] succeeds.
#[derive(Debug, Default)]
pub struct BuildStateMachine {
    state_is_building: bool,
    pending: Vec<WatchEvent>,
}

impl BuildStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuildState {
        if self.state_is_building {
            BuildState::Building
        } else {
            BuildState::Idle
        }
    }

    /// A watcher event arrived. Queued regardless of current state; picked
    /// up by the next successful `begin_build`.
    pub fn queue_event(&mut self, event: WatchEvent) {
        self.pending.push(event);
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    /// `Idle -> Building`. Returns the queued events that triggered this
    /// build, draining the queue. `None` if a build is already running.
    pub fn begin_build(&mut self) -> Option<Vec<WatchEvent>> {
        if self.state_is_building {
            return None;
        }
        self.state_is_building = true;
        Some(std::mem::take(&mut self.pending))
    }

    /// `Building -> {Success|Failed} -> Idle`: the `Success`/`Failed` leg
    /// exists only to tell the caller what message to broadcast next; the
    /// machine itself always lands back on `Idle` so a queued watcher
    /// event (if any) can start the next build.
    pub fn finish_build(&mut self, outcome: BuildOutcome) -> BuildOutcome {
        self.state_is_building = false;
        outcome
    }
}
