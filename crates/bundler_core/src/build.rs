//! The one-shot build orchestrator: wires the Resolver, Graph Builder,
//! Tree Shaker + Chunker and Emitter together (components A, D, E, F of
//! §2's pipeline table — the Parser and Transformer, B and C, run inside
//! the Graph Builder's per-module discovery step, as `bundler_graph`
//! already does). Grounded on the teacher's
//! `good_fences_runner::GoodFencesRunner`: a constructor that assembles
//! every input (there, fences + source files; here, the resolver + caches)
//! followed by one driving method that runs the whole analysis and
//! returns the aggregated result.

use std::fs;
use std::path::{Path, PathBuf};

use ahashmap::AHashMap;
use bundler_config::BuildConfig;
use bundler_diag::{Diagnostic, Diagnostics};
use bundler_emit::{EmittedChunk, Manifest};
use bundler_graph::Graph;
use bundler_plugin::{BuildSummary, PluginPipeline};
use bundler_shake::ChunkedGraph;
use bundler_transform::TransformOptions;
use import_resolver::contract::Resolver;
use import_resolver::swc_resolver::MonorepoResolver;
use logger::Logger;
use swc_ecma_loader::TargetEnv;

use crate::env::BuildEnv;

fn target_env(target: bundler_graph::Target) -> TargetEnv {
    match target {
        bundler_graph::Target::Browser => TargetEnv::Browser,
        bundler_graph::Target::Server => TargetEnv::Node,
    }
}

fn single_diagnostic(diag: Diagnostic) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    diagnostics.push(diag);
    diagnostics
}

/// One surviving module's identity-and-content fingerprint within a chunk,
/// at the granularity the dev-mode diff (`dev::diff_outputs`) needs to
/// decide whether a rebuild is patchable (§6 `update` vs `full-reload`).
#[derive(Debug, Clone)]
pub struct ModuleSnapshot {
    pub path: PathBuf,
    pub source_hash: [u8; 32],
}

/// The full result of one successful build (§4.6 Contract output, plus
/// the counts `onEnd` plugin hooks and the CLI summary line both want).
pub struct BuildOutput {
    pub chunks: Vec<EmittedChunk>,
    pub manifest: Manifest,
    pub module_count: usize,
    pub chunk_count: usize,
    /// Each surviving chunk's member modules, in chunk order, keyed by
    /// chunk id. Not part of §4.6's emission contract itself; carried
    /// purely so a later dev-mode rebuild can diff against it (§6 `update`).
    pub chunk_modules: AHashMap<String, Vec<ModuleSnapshot>>,
}

/// Runs the whole pipeline once: resolve, discover the module graph,
/// shake and chunk it, emit. Fails with every aggregated diagnostic rather
/// than the first (§7 "any error... fails the build with the aggregated
/// diagnostics; no partial output is written" — this function writes
/// nothing to disk itself; see [`write_output`]).
///
/// `cache` is the content-addressed transform cache (§4.4 "the cache
/// survives across runs when a persistent store is configured; otherwise
/// it is process-local"): a one-shot build can hand it a fresh
/// `TransformCache`, but a `DevSession` keeps one alive across every
/// incremental rebuild so unchanged modules skip re-transforming.
pub fn build<L: Logger>(
    env: &BuildEnv<'_, L>,
    plugins: &PluginPipeline,
    cache: &bundler_graph::cache::TransformCache,
) -> Result<BuildOutput, Diagnostics> {
    plugins.dispatch_start().map_err(single_diagnostic)?;

    let resolve_env = env.resolve_env();
    let monorepo = MonorepoResolver::new_resolver(
        env.project_root.clone(),
        target_env(env.config.target),
        AHashMap::default(),
        true,
    );
    let resolver = Resolver::new(&monorepo, resolve_env.externals, resolve_env.alias);

    let transform_options = TransformOptions {
        define: env.config.define.clone().into_iter().collect(),
        jsx_import_source: None,
    };

    env.logger.log(format!(
        "discovering modules from {} entry point(s)",
        env.config.entry.len()
    ));
    let graph = run_graph_phase(&env.project_root, &env.config.entry, &resolver, cache, &transform_options)?;
    env.logger.log(format!("{} module(s) discovered", graph.len()));

    let chunked = bundler_shake::shake_and_chunk(&graph, &env.project_root, &env.config.shake);
    env.logger.log(format!("{} chunk(s) after shaking", chunked.chunks.len()));

    let chunk_modules: AHashMap<String, Vec<ModuleSnapshot>> = chunked
        .chunks
        .iter()
        .map(|chunk| {
            let snapshots = chunk
                .modules
                .iter()
                .map(|&id| {
                    let module = graph.module(id);
                    ModuleSnapshot {
                        path: module.path.as_path().to_path_buf(),
                        source_hash: module.source_hash,
                    }
                })
                .collect();
            (chunk.id.clone(), snapshots)
        })
        .collect();

    let emit_env = env.emit_env();
    let (chunks, manifest) = bundler_emit::emit(&graph, &chunked, emit_env.project_root, emit_env.options)?;

    let summary = BuildSummary {
        module_count: graph.len(),
        chunk_count: chunks.len(),
        had_errors: false,
    };
    plugins.dispatch_end(&summary);

    Ok(BuildOutput {
        module_count: graph.len(),
        chunk_count: chunked.chunks.len(),
        chunks,
        manifest,
        chunk_modules,
    })
}

/// Split out so a future plugin-aware discovery pass (`onResolve`/
/// `onLoad`/`onTransform` interception during the graph walk) has a single
/// seam to change; today it delegates to `bundler_graph::build` unchanged.
/// Full plugin interception of per-module resolution/loading is §1's
/// "plugin API surface... out of scope" external-collaborator boundary —
/// the pipeline's hook *dispatch* mechanics exist and are tested in
/// `bundler_plugin`, but this orchestrator does not yet thread them
/// through the graph walk's internals.
fn run_graph_phase(
    project_root: &Path,
    entries: &[String],
    resolver: &Resolver,
    cache: &bundler_graph::cache::TransformCache,
    transform_options: &TransformOptions,
) -> Result<Graph, Diagnostics> {
    bundler_graph::build(project_root, entries, resolver, cache, transform_options)
}

/// Writes every emitted chunk and the manifest to `config.outdir` (§6
/// `outdir`). Called only after [`build`] returns `Ok`, so a failed build
/// never leaves partial output on disk (§7 "no partial output is written").
pub fn write_output(project_root: &Path, config: &BuildConfig, output: &BuildOutput) -> Result<(), Diagnostic> {
    let outdir = if config.outdir.is_absolute() {
        config.outdir.clone()
    } else {
        project_root.join(&config.outdir)
    };

    fs::create_dir_all(&outdir).map_err(|err| Diagnostic::IoUnreadable {
        path: outdir.clone(),
        message: err.to_string(),
    })?;

    for chunk in &output.chunks {
        let path: PathBuf = outdir.join(&chunk.file_name);
        fs::write(&path, &chunk.code).map_err(|err| Diagnostic::IoUnreadable {
            path,
            message: err.to_string(),
        })?;
    }

    // Sorted by chunk id, matching `bundler_emit`'s own manifest encoding,
    // so the co-emitted file is byte-identical across runs (§8).
    let manifest_path = outdir.join("manifest.json");
    let manifest_json = bundler_emit::manifest_json_string(&output.manifest);
    fs::write(&manifest_path, manifest_json).map_err(|err| Diagnostic::IoUnreadable {
        path: manifest_path,
        message: err.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use bundler_config::{CliOverrides, RawConfig};
    use logger::VecLogger;

    #[test]
    fn builds_a_minimal_esm_project_into_a_single_chunk() {
        let tmp = test_tmpdir::test_tmpdir!(
            "a.js" => "export const x = 1;",
            "b.js" => "import {x} from './a.js'; console.log(x);"
        );
        let mut raw = RawConfig::from_json_str(
            r#"{"entry": ["./b.js"], "outdir": "dist", "splitting": false}"#,
        )
        .unwrap();
        raw.apply_overrides(&CliOverrides::default());
        let config = BuildConfig::try_from(raw).unwrap();

        let vec_logger = VecLogger::new();
        let env = BuildEnv::new(tmp.root().to_path_buf(), &config, &vec_logger);
        let plugins = PluginPipeline::build(&[]).unwrap();
        let cache = bundler_graph::cache::TransformCache::new();

        let output = build(&env, &plugins, &cache).unwrap();
        assert_eq!(output.chunk_count, 1);
        assert_eq!(output.module_count, 2);
        assert!(output.manifest.contains_key(&output.chunks[0].id));
    }

    #[test]
    fn unresolvable_entry_fails_the_whole_build() {
        let tmp = test_tmpdir::test_tmpdir!("a.js" => "export const x = 1;");
        let mut raw =
            RawConfig::from_json_str(r#"{"entry": ["./missing.js"], "outdir": "dist"}"#).unwrap();
        raw.apply_overrides(&CliOverrides::default());
        let config = BuildConfig::try_from(raw).unwrap();

        let vec_logger = VecLogger::new();
        let env = BuildEnv::new(tmp.root().to_path_buf(), &config, &vec_logger);
        let plugins = PluginPipeline::build(&[]).unwrap();
        let cache = bundler_graph::cache::TransformCache::new();

        let result = build(&env, &plugins, &cache);
        assert!(result.is_err());
    }
}
