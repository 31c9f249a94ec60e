//! Incremental dev-mode rebuild loop: drives a [`Watcher`] through the
//! `Idle → Building → {Success|Failed} → Idle` state machine (§9) and
//! turns each rebuild's outcome into the dev-server message to broadcast
//! (§6, §7 "abort the current incremental build, leave the previous
//! successful emission in place, and broadcast an `error` message to
//! clients. The next watcher event retries.").
//!
//! A per-module HMR diff compares each rebuild's [`BuildOutput::chunk_modules`]
//! snapshot against the previous successful build's: if every chunk's member
//! set is unchanged (by path, in order) and only some modules' content
//! hashes moved, the rebuild is patchable and broadcasts `update` with the
//! affected chunks' new bytes; otherwise (a chunk appeared, disappeared, or
//! gained/lost a member — the graph's shape itself changed) it falls back to
//! `full-reload`, which §6 lists as an always-valid response. There is no
//! HMR accept/dispose protocol here, so "patchable" is scoped to same-shape
//! content edits only — anything that would change which modules a chunk
//! registers is treated as unpatchable rather than risk replaying a stale
//! module graph into a running page.

use std::path::{Path, PathBuf};

use bundler_config::BuildConfig;
use bundler_devserver::{BuildOutcome, BuildStateMachine, ModuleUpdate, ServerMessage, UpdateKind, Watcher};
use bundler_diag::Diagnostic;
use bundler_plugin::PluginPipeline;
use logger::Logger;

use crate::build::{build, write_output, BuildOutput};
use crate::env::BuildEnv;

/// Owns the watcher, the rebuild state machine, and the transform cache for
/// one dev session. `config.outdir` still receives the latest successful
/// build's output — §7's "leave the previous successful emission in place"
/// on failure is satisfied by construction, since [`write_output`] is only
/// ever called after a successful [`build`]. The `TransformCache` is
/// constructed once in [`DevSession::start`] and threaded into every
/// rebuild, so unchanged modules across the session never re-transform
/// (§4.4 "the cache survives across runs... otherwise it is process-local";
/// here the session itself is that process-local lifetime).
pub struct DevSession<W: Watcher> {
    watcher: W,
    state: BuildStateMachine,
    previous: Option<BuildOutput>,
    cache: bundler_graph::cache::TransformCache,
}

impl<W: Watcher> DevSession<W> {
    pub fn start(mut watcher: W, project_root: &Path) -> Result<Self, Diagnostic> {
        watcher.watch(project_root)?;
        Ok(Self {
            watcher,
            state: BuildStateMachine::new(),
            previous: None,
            cache: bundler_graph::cache::TransformCache::new(),
        })
    }

    /// Blocks for the next watcher event, then runs (at most) one
    /// incremental build and returns the message to broadcast. `None` only
    /// when the watcher itself has shut down (its channel disconnected).
    pub fn next_cycle<L: Logger>(
        &mut self,
        project_root: &PathBuf,
        config: &BuildConfig,
        logger: L,
        plugins: &PluginPipeline,
        timestamp: u64,
    ) -> Option<ServerMessage> {
        let event = self.watcher.next_event()?;
        self.state.queue_event(event);

        // Another build is already running: this event just joined the
        // queue `begin_build` will drain next time, per §9's "watcher
        // events queued between transitions".
        let _events = self.state.begin_build()?;

        let env = BuildEnv::new(project_root.clone(), config, logger);
        let result = build(&env, plugins, &self.cache);

        let message = match &result {
            Ok(output) => match &self.previous {
                Some(previous) => diff_outputs(previous, output, timestamp),
                None => ServerMessage::FullReload { timestamp },
            },
            Err(diagnostics) => ServerMessage::Error {
                message: diagnostics.to_string(),
                stack: None,
                file: None,
                line: None,
                column: None,
            },
        };

        let outcome = if result.is_ok() { BuildOutcome::Success } else { BuildOutcome::Failed };
        self.state.finish_build(outcome);

        if let Ok(output) = result {
            self.persist(project_root, config, &output);
            self.previous = Some(output);
        }

        Some(message)
    }

    fn persist(&self, project_root: &Path, config: &BuildConfig, output: &BuildOutput) {
        // A write failure here does not fail the build that already
        // succeeded in memory; it surfaces as an `IO.Unreadable`-flavored
        // problem the next time the CLI reads `outdir`, same as any other
        // filesystem hazard outside this crate's control.
        let _ = write_output(project_root, config, output);
    }
}

/// Compares two successive successful builds' chunk/module snapshots and
/// decides whether the change is patchable (§6 `update`) or must fall back
/// to `full-reload`. A rebuild is patchable only when every chunk that
/// existed before still exists, under the same id, with the exact same
/// ordered member-module list — anything else (a module added/removed, a
/// module moving to a different chunk, a chunk appearing or disappearing)
/// means the running page's module registry can no longer be brought in
/// line by replaying individual module bodies, so the whole page reloads.
fn diff_outputs(previous: &BuildOutput, current: &BuildOutput, timestamp: u64) -> ServerMessage {
    if previous.chunk_modules.len() != current.chunk_modules.len() {
        return ServerMessage::FullReload { timestamp };
    }

    let mut updates = Vec::new();
    for (chunk_id, current_members) in &current.chunk_modules {
        let Some(previous_members) = previous.chunk_modules.get(chunk_id) else {
            return ServerMessage::FullReload { timestamp };
        };
        if previous_members.len() != current_members.len()
            || previous_members.iter().zip(current_members).any(|(p, c)| p.path != c.path)
        {
            return ServerMessage::FullReload { timestamp };
        }

        let changed_ids: Vec<String> = current_members
            .iter()
            .zip(previous_members)
            .filter(|(c, p)| c.source_hash != p.source_hash)
            .map(|(c, _)| c.path.to_string_lossy().into_owned())
            .collect();

        if changed_ids.is_empty() {
            continue;
        }

        let Some(chunk) = current.chunks.iter().find(|c| &c.id == chunk_id) else { continue };
        updates.push(ModuleUpdate {
            kind: UpdateKind::Js,
            chunk_id: chunk_id.clone(),
            module_ids: changed_ids,
            new_bytes: chunk.code.clone(),
        });
    }

    if updates.is_empty() {
        // The watcher fired but nothing this build tracks actually moved
        // (e.g. a touched file whose content hash is unchanged) — nothing
        // to push, and nothing to reload either.
        return ServerMessage::FullReload { timestamp };
    }

    updates.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
    ServerMessage::Update { timestamp, updates }
}
