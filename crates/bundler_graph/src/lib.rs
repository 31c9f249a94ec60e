//! Graph Builder (component D, §4.4): discovers every module transitively
//! reachable from a set of entries, resolving and (re)transforming each one
//! exactly once, and records the static/dynamic/re-export edges between
//! them.
//!
//! Grounded on `unused_finder::graph::Graph`/`GraphFile` for the
//! arena-of-modules-addressed-by-a-small-integer-id shape (a `path_to_id`
//! sidecar map, edges stored as id -> id rather than path -> path) and on
//! `unused_finder::walk`'s rayon `par_iter` parallel-processing pattern —
//! adapted from "walk the whole tree up front, then parse every file in
//! parallel" (the teacher always knew its file list ahead of time from a
//! directory walk) to a wave-by-wave frontier walk, since here the set of
//! reachable files is only discovered incrementally by following imports.
//! Each wave's reads/parses/transforms run in parallel (rayon); resolution
//! and all graph mutation happen on the driver thread between waves, per
//! §5 "resolution and graph mattion run on the driver thread".

pub mod cache;
pub mod side_effects;

use std::fs;
use std::path::{Path, PathBuf};

use abspath::AbsPath;
use ahashmap::AHashMap;
use bundler_diag::{Diagnostic, Diagnostics};
use bundler_parse::{ExportEntry, ImportEntry, ImportKind, ModuleKind};
use bundler_transform::TransformOptions;
use import_resolver::contract::{Resolved, Resolver};
use rayon::prelude::*;

/// §6 `target`: selects condition-name priority at resolve time, the
/// runtime preamble's dynamic loader, and the builtin-externals list.
/// Kept distinct from `swc_ecma_loader::TargetEnv` (the resolver's own
/// condition-priority type) since this one is a build-wide configuration
/// value shared by the resolver, the emitter, and the config layer, while
/// `TargetEnv` is the resolver crate's internal vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Browser,
    Server,
}

/// A small integer id addressing one [`Module`] within a [`Graph`]. Stable
/// for the lifetime of one build; never reused across builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// §3 "Dependency edge": `(from-module, specifier, resolved-target, kind,
/// type-only?)`. `from-module` is implicit (the edge lives on that
/// module's `static_edges`/`dynamic_edges` list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Static,
    Dynamic,
    ReExport,
    SideEffect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Internal(ModuleId),
    External(String),
}

#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub specifier: String,
    pub target: EdgeTarget,
    pub kind: EdgeKind,
    /// Type-only edges are recorded but do not keep the target alive
    /// (§3 "Dependency edge").
    pub type_only: bool,
}

/// One discovered module (§3 "Module"). Exactly one `Module` exists per
/// `AbsPath` within a build.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub path: AbsPath,
    pub source_hash: [u8; 32],
    pub kind: ModuleKind,
    pub exports: Vec<ExportEntry>,
    pub edges: Vec<DependencyEdge>,
    /// True unless the nearest `package.json`'s `sideEffects` field rules
    /// this module out (§4.5 "Side-effect determination").
    pub has_side_effects: bool,
    pub is_entry: bool,
    /// The transformed, emission-ready source text (§3 "transformed text").
    pub code: String,
}

impl Module {
    pub fn static_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| matches!(e.kind, EdgeKind::Static | EdgeKind::ReExport))
    }

    pub fn dynamic_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| matches!(e.kind, EdgeKind::Dynamic))
    }
}

/// The complete, acyclic-with-respect-to-import-type module graph produced
/// by one discovery pass (§4.4 Contract).
#[derive(Debug)]
pub struct Graph {
    modules: Vec<Module>,
    path_to_id: AHashMap<AbsPath, ModuleId>,
    entries: Vec<ModuleId>,
}

impl Graph {
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    pub fn find(&self, path: &AbsPath) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// A single module's per-wave parse+transform outcome, before edges have
/// been resolved against the rest of the graph.
struct Discovered {
    path: AbsPath,
    source_hash: [u8; 32],
    kind: ModuleKind,
    exports: Vec<ExportEntry>,
    imports: Vec<ImportEntry>,
    code: String,
    has_side_effects: bool,
    errors: Vec<Diagnostic>,
}

fn hash_source(source: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.finalize().into()
}

/// Reads, parses and transforms one module. Parallelizable — touches only
/// the filesystem and the shared transform cache, never the graph.
fn discover_one(path: &AbsPath, cache: &cache::TransformCache, options: &TransformOptions) -> Discovered {
    let filename_hint = path.as_path().to_string_lossy().into_owned();

    let source = match fs::read_to_string(path.as_path()) {
        Ok(s) => s,
        Err(err) => {
            return Discovered {
                path: path.clone(),
                source_hash: [0u8; 32],
                kind: ModuleKind::Script,
                exports: Vec::new(),
                imports: Vec::new(),
                code: String::new(),
                has_side_effects: true,
                errors: vec![Diagnostic::IoUnreadable {
                    path: path.as_path().to_path_buf(),
                    message: err.to_string(),
                }],
            };
        }
    };

    let source_hash = hash_source(&source);
    let parsed = bundler_parse::parse(&source, &filename_hint);
    let mut errors = parsed.errors;

    let code = match cache.get_or_transform(&source, &filename_hint, options) {
        Ok(output) => output.code,
        Err(diag) => {
            errors.push(diag);
            String::new()
        }
    };

    Discovered {
        path: path.clone(),
        source_hash,
        kind: parsed.kind.unwrap_or(ModuleKind::Script),
        exports: parsed.exports,
        imports: parsed.imports,
        code,
        has_side_effects: side_effects::has_side_effects(path),
        errors,
    }
}

fn edge_kind_for(kind: ImportKind) -> EdgeKind {
    match kind {
        ImportKind::StaticFrom | ImportKind::RequireCall => EdgeKind::Static,
        ImportKind::StaticSideEffect => EdgeKind::SideEffect,
        ImportKind::DynamicCall => EdgeKind::Dynamic,
        ImportKind::ReExport | ImportKind::ReExportAll => EdgeKind::ReExport,
    }
}

/// `resolve each entry through the Resolver; mark each as isEntry` then
/// `discover`/drain the work queue (§4.4 Algorithm, steps 1-4).
pub fn build(
    project_root: &Path,
    entries: &[String],
    resolver: &Resolver,
    cache: &cache::TransformCache,
    transform_options: &TransformOptions,
) -> Result<Graph, Diagnostics> {
    let mut modules: Vec<Option<Module>> = Vec::new();
    let mut id_to_path: Vec<AbsPath> = Vec::new();
    let mut path_to_id: AHashMap<AbsPath, ModuleId> = AHashMap::default();
    let mut entry_ids = Vec::new();
    let mut diagnostics = Diagnostics::new();

    fn reserve(
        path: AbsPath,
        modules: &mut Vec<Option<Module>>,
        id_to_path: &mut Vec<AbsPath>,
        path_to_id: &mut AHashMap<AbsPath, ModuleId>,
    ) -> (ModuleId, bool) {
        if let Some(id) = path_to_id.get(&path) {
            return (*id, false);
        }
        let id = ModuleId(modules.len() as u32);
        modules.push(None);
        id_to_path.push(path.clone());
        path_to_id.insert(path, id);
        (id, true)
    }

    let mut frontier: Vec<ModuleId> = Vec::new();

    for specifier in entries {
        match resolver.resolve(project_root, specifier) {
            Ok(Resolved::File { path, .. }) => {
                let (id, fresh) = reserve(path, &mut modules, &mut id_to_path, &mut path_to_id);
                entry_ids.push(id);
                if fresh {
                    frontier.push(id);
                }
            }
            Ok(Resolved::External(name)) => {
                diagnostics.push(Diagnostic::ConfigInvalid {
                    message: format!("entry `{specifier}` resolved to an external module (`{name}`); entries must be bundleable files"),
                });
            }
            Err(diag) => diagnostics.push(diag),
        }
    }

    while !frontier.is_empty() {
        // Parallel wave: read + parse + transform every module newly
        // discovered in the previous wave (§5 "discovery may fan out as
        // widely as there are CPU cores").
        let paths: Vec<AbsPath> = frontier.iter().map(|id| id_to_path[id.0 as usize].clone()).collect();

        let discovered: Vec<Discovered> = paths.par_iter().map(|path| discover_one(path, cache, transform_options)).collect();

        let mut next_frontier = Vec::new();

        // Sequential: resolution and graph mutation happen on the driver
        // thread only (§5), and in path order so edge resolution — and
        // therefore the assignment of new module ids — is deterministic
        // (§4.5 "sort by absolute path when the algorithm does not dictate
        // a total order").
        let mut ordered: Vec<(ModuleId, Discovered)> = frontier.into_iter().zip(discovered).collect();
        ordered.sort_by(|a, b| a.1.path.as_path().cmp(b.1.path.as_path()));

        for (id, disc) in ordered {
            diagnostics.extend(disc.errors.into_iter().collect());

            let mut edges = Vec::new();
            for import in &disc.imports {
                let target = match resolver.resolve(disc.path.as_path(), &import.specifier) {
                    Ok(Resolved::External(name)) => EdgeTarget::External(name),
                    Ok(Resolved::File { path, .. }) => {
                        let (target_id, fresh) = reserve(path, &mut modules, &mut id_to_path, &mut path_to_id);
                        if fresh {
                            next_frontier.push(target_id);
                        }
                        EdgeTarget::Internal(target_id)
                    }
                    Err(diag) => {
                        diagnostics.push(diag);
                        continue;
                    }
                };
                edges.push(DependencyEdge {
                    specifier: import.specifier.clone(),
                    target,
                    kind: edge_kind_for(import.kind),
                    type_only: import.type_only,
                });
            }

            for export in &disc.exports {
                let Some(re_export) = &export.re_export_from else { continue };
                let target = match resolver.resolve(disc.path.as_path(), &re_export.specifier) {
                    Ok(Resolved::External(name)) => EdgeTarget::External(name),
                    Ok(Resolved::File { path, .. }) => {
                        let (target_id, fresh) = reserve(path, &mut modules, &mut id_to_path, &mut path_to_id);
                        if fresh {
                            next_frontier.push(target_id);
                        }
                        EdgeTarget::Internal(target_id)
                    }
                    Err(diag) => {
                        diagnostics.push(diag);
                        continue;
                    }
                };
                edges.push(DependencyEdge {
                    specifier: re_export.specifier.clone(),
                    target,
                    kind: EdgeKind::ReExport,
                    type_only: false,
                });
            }

            modules[id.0 as usize] = Some(Module {
                id,
                path: disc.path,
                source_hash: disc.source_hash,
                kind: disc.kind,
                exports: disc.exports,
                edges,
                has_side_effects: disc.has_side_effects,
                is_entry: entry_ids.contains(&id),
                code: disc.code,
            });
        }

        next_frontier.sort();
        next_frontier.dedup();
        frontier = next_frontier;
    }

    diagnostics.into_result()?;

    let modules: Vec<Module> = modules
        .into_iter()
        .map(|m| m.expect("every reserved module id is filled before the frontier drains"))
        .collect();

    Ok(Graph {
        modules,
        path_to_id,
        entries: entry_ids,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use import_resolver::contract::ExternalsConfig;
    use import_resolver::swc_resolver::MonorepoResolver;
    use std::collections::HashMap;
    use swc_ecma_loader::TargetEnv;

    fn resolver_for(root: &Path) -> MonorepoResolver {
        MonorepoResolver::new_resolver(root.to_owned(), TargetEnv::Browser, Default::default(), true)
    }

    #[test]
    fn discovers_every_transitively_reachable_module() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/a.js" => "export const x = 1;",
            "p/b.js" => "import {x} from './a.js'; console.log(x);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = cache::TransformCache::new();
        let graph = build(
            tmp.root(),
            &["./p/b.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        assert_eq!(graph.len(), 2);
        let b = graph.module(graph.entries()[0]);
        assert!(b.path.as_path().ends_with("p/b.js"));
        assert_eq!(b.edges.len(), 1);
        match &b.edges[0].target {
            EdgeTarget::Internal(a_id) => {
                let a = graph.module(*a_id);
                assert!(a.path.as_path().ends_with("p/a.js"));
            }
            EdgeTarget::External(_) => panic!("expected an internal edge"),
        }
    }

    #[test]
    fn two_modules_with_identical_source_are_distinct() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/a.js" => "export const x = 1;",
            "p/b.js" => "export const x = 1;",
            "p/main.js" => "import './a.js'; import './b.js';"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = cache::TransformCache::new();
        let graph = build(
            tmp.root(),
            &["./p/main.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn unresolvable_entry_fails_the_whole_build() {
        let tmp = test_tmpdir::test_tmpdir!("p/main.js" => "console.log(1);");
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = cache::TransformCache::new();
        let err = build(
            tmp.root(),
            &["./p/missing.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn cyclic_static_imports_are_permitted() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/a.js" => "import './b.js'; export const a = 1;",
            "p/b.js" => "import './a.js'; export const b = 2;"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = cache::TransformCache::new();
        let graph = build(
            tmp.root(),
            &["./p/a.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();
        assert_eq!(graph.len(), 2);
    }
}
