//! Tree Shaker + Chunker (component E, §4.5): prunes modules the build
//! output can never reach, then partitions the survivors into chunks so
//! that every module is emitted exactly once and every dynamic `import()`
//! has somewhere to land.
//!
//! Shaking reuses the teacher's `unused_finder::graph` vocabulary — walk
//! the graph from a root set, mark everything reachable, drop the rest —
//! but the teacher marks *files* reachable from export usage; here the
//! reachability walk follows §4.5's kind-aware edge rules instead (a
//! type-only edge never keeps its target alive; a side-effect-only import
//! keeps its target alive regardless of the target's own `sideEffects`
//! flag). Chunking has no teacher precedent (`good_fences` never emitted
//! anything); the greatest-lower-bound placement rule below follows §4.5
//! "Chunker contract" directly.

use std::collections::BTreeSet;

use ahashmap::{AHashMap, AHashSet};
use bundler_graph::{EdgeKind, EdgeTarget, Graph, ModuleId};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ShakeOptions {
    /// When `false`, every module reachable from the entries by any edge
    /// (including type-only ones) survives; nothing is pruned (§6 `treeshake`).
    pub treeshake: bool,
    /// When `false`, every surviving module is placed into a single chunk
    /// and dynamic `import()` roots are not split out (§6 `splitting`).
    pub splitting: bool,
}

impl Default for ShakeOptions {
    fn default() -> Self {
        Self { treeshake: true, splitting: true }
    }
}

/// A chunk root: what forced this chunk to exist in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRoot {
    Entry(ModuleId),
    Dynamic(ModuleId),
    /// No single module forces this chunk; it exists because two or more
    /// other chunks share a dependency (§4.5 "greatest lower bound").
    Shared,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable, human-readable id derived from the chunk's root(s) (§3
    /// "Chunk" — "a stable id derived from its root module(s)").
    pub id: String,
    pub root: ChunkRoot,
    /// Topologically ordered, dependencies before dependents ("roots last").
    pub modules: Vec<ModuleId>,
}

/// The shaken, chunked result of one build (§4.5 output).
#[derive(Debug, Clone)]
pub struct ChunkedGraph {
    /// Surviving modules, sorted by path (§4.5/§8 determinism).
    pub survivors: Vec<ModuleId>,
    pub chunks: Vec<Chunk>,
    /// Which chunk (index into `chunks`) owns each surviving module.
    pub module_chunk: AHashMap<ModuleId, usize>,
}

impl ChunkedGraph {
    pub fn chunk_of(&self, module: ModuleId) -> &Chunk {
        &self.chunks[self.module_chunk[&module]]
    }
}

/// Whether following `edge` from a live module keeps its target alive.
///
/// A type-only edge is erased before it ever reaches the bundle and never
/// keeps anything alive, tree-shaking on or off — there is no JS left to
/// execute through it (§3 "Dependency edge").
///
/// A side-effect-only import (`import './x'`) keeps its target alive
/// unconditionally: the Open Question in §9 resolves in favor of the
/// import site, not the target's own `sideEffects` declaration, since the
/// importer explicitly asked for that code to run.
fn keeps_alive(graph: &Graph, edge: &bundler_graph::DependencyEdge, options: &ShakeOptions) -> bool {
    if edge.type_only {
        return !options.treeshake;
    }
    if !options.treeshake {
        return true;
    }
    match edge.kind {
        EdgeKind::SideEffect | EdgeKind::Dynamic | EdgeKind::Static | EdgeKind::ReExport => {
            // At module granularity, the edge existing at all already means
            // some binding (named, default, namespace, or a side-effect
            // import) was demanded from the target; whether the target's
            // own package declares `sideEffects: false` only ever rules out
            // modules nothing imports, which this walk never reaches.
            let _ = graph;
            true
        }
    }
}

/// Reachability walk from the entries (§4.5 Algorithm: "mark reachable,
/// drop the rest").
fn reachable(graph: &Graph, options: &ShakeOptions) -> Vec<ModuleId> {
    let mut seen: AHashSet<ModuleId> = AHashSet::default();
    let mut stack: Vec<ModuleId> = graph.entries().to_vec();
    for &id in graph.entries() {
        seen.insert(id);
    }

    while let Some(id) = stack.pop() {
        for edge in &graph.module(id).edges {
            let EdgeTarget::Internal(target) = &edge.target else { continue };
            if !keeps_alive(graph, edge, options) {
                continue;
            }
            if seen.insert(*target) {
                stack.push(*target);
            }
        }
    }

    let mut survivors: Vec<ModuleId> = seen.into_iter().collect();
    survivors.sort_by_key(|id| graph.module(*id).path.as_path().to_path_buf());
    survivors
}

/// Every surviving module that is the target of at least one surviving
/// dynamic edge, sorted by path for deterministic root ordering.
fn dynamic_targets(graph: &Graph, survivors: &AHashSet<ModuleId>) -> Vec<ModuleId> {
    let mut targets = BTreeSet::new();
    for &id in survivors {
        for edge in graph.module(id).dynamic_edges() {
            if let EdgeTarget::Internal(target) = &edge.target {
                if survivors.contains(target) {
                    targets.insert(*target);
                }
            }
        }
    }
    let mut targets: Vec<ModuleId> = targets.into_iter().collect();
    targets.sort_by_key(|id| graph.module(*id).path.as_path().to_path_buf());
    targets
}

/// The set of modules reachable from `root` by following only static/
/// re-export/side-effect edges — i.e. modules guaranteed to already be
/// loaded once `root` runs, without waiting on a dynamic `import()`.
fn static_closure(graph: &Graph, root: ModuleId, survivors: &AHashSet<ModuleId>) -> AHashSet<ModuleId> {
    let mut seen = AHashSet::default();
    seen.insert(root);
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for edge in graph.module(id).static_edges() {
            if edge.type_only {
                continue;
            }
            if let EdgeTarget::Internal(target) = &edge.target {
                if survivors.contains(target) && seen.insert(*target) {
                    stack.push(*target);
                }
            }
        }
        for edge in &graph.module(id).edges {
            if edge.kind == EdgeKind::SideEffect {
                if let EdgeTarget::Internal(target) = &edge.target {
                    if survivors.contains(target) && seen.insert(*target) {
                        stack.push(*target);
                    }
                }
            }
        }
    }
    seen
}

fn relative_slug(graph: &Graph, project_root: &std::path::Path, id: ModuleId) -> String {
    let path = graph.module(id).path.as_path();
    let relative = path.strip_prefix(project_root).unwrap_or(path);
    let slug = relative.with_extension("");
    slug.to_string_lossy().replace('\\', "/")
}

fn shared_chunk_id(owner_ids: &[String]) -> String {
    let mut sorted = owner_ids.to_vec();
    sorted.sort();
    let mut hasher = Sha256::new();
    for id in &sorted {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    let digest: [u8; 32] = hasher.finalize().into();
    let prefix = digest.iter().take(8).map(|b| format!("{b:02x}")).collect::<String>();
    format!("shared-{prefix}")
}

/// Dependencies-before-dependents order within a chunk's own module set,
/// via post-order DFS over static/side-effect edges (dynamic edges never
/// force ordering — their targets live in other chunks).
fn topo_order(graph: &Graph, members: &AHashSet<ModuleId>) -> Vec<ModuleId> {
    let mut order = Vec::with_capacity(members.len());
    let mut visited: AHashSet<ModuleId> = AHashSet::default();

    let mut sorted_members: Vec<ModuleId> = members.iter().copied().collect();
    sorted_members.sort_by_key(|id| graph.module(*id).path.as_path().to_path_buf());

    fn visit(
        graph: &Graph,
        id: ModuleId,
        members: &AHashSet<ModuleId>,
        visited: &mut AHashSet<ModuleId>,
        order: &mut Vec<ModuleId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let mut deps: Vec<ModuleId> = graph
            .module(id)
            .edges
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Static | EdgeKind::ReExport | EdgeKind::SideEffect))
            .filter_map(|e| match &e.target {
                EdgeTarget::Internal(t) if members.contains(t) => Some(*t),
                _ => None,
            })
            .collect();
        deps.sort_by_key(|id| graph.module(*id).path.as_path().to_path_buf());
        for dep in deps {
            visit(graph, dep, members, visited, order);
        }
        order.push(id);
    }

    for id in sorted_members {
        visit(graph, id, members, &mut visited, &mut order);
    }
    order
}

/// Runs the full shake-then-chunk pipeline (§4.5 Algorithm end to end).
pub fn shake_and_chunk(graph: &Graph, project_root: &std::path::Path, options: &ShakeOptions) -> ChunkedGraph {
    let survivors_sorted = reachable(graph, options);
    let survivor_set: AHashSet<ModuleId> = survivors_sorted.iter().copied().collect();

    if !options.splitting {
        let modules = topo_order(graph, &survivor_set);
        let id = "bundle".to_string();
        let chunk = Chunk { id, root: ChunkRoot::Shared, modules: modules.clone() };
        let module_chunk = modules.iter().map(|m| (*m, 0usize)).collect();
        return ChunkedGraph { survivors: survivors_sorted, chunks: vec![chunk], module_chunk };
    }

    // Roots: one per entry, plus one per dynamic-import target not already
    // guaranteed loaded by some entry's static closure (§4.5 "unless
    // already in the same entry chunk via another path that would force
    // load").
    let mut entry_closures: Vec<(ModuleId, AHashSet<ModuleId>)> = graph
        .entries()
        .iter()
        .filter(|e| survivor_set.contains(e))
        .map(|&e| (e, static_closure(graph, e, &survivor_set)))
        .collect();
    entry_closures.sort_by_key(|(id, _)| graph.module(*id).path.as_path().to_path_buf());

    let dynamic_candidates = dynamic_targets(graph, &survivor_set);
    let dynamic_roots: Vec<ModuleId> = dynamic_candidates
        .into_iter()
        .filter(|target| !entry_closures.iter().any(|(_, closure)| closure.contains(target)))
        .collect();

    #[derive(Clone, Copy)]
    enum RootRef {
        Entry(usize),
        Dynamic(usize),
    }

    let mut roots: Vec<(RootRef, ModuleId)> = Vec::new();
    for (i, (e, _)) in entry_closures.iter().enumerate() {
        roots.push((RootRef::Entry(i), *e));
    }
    for (i, d) in dynamic_roots.iter().enumerate() {
        roots.push((RootRef::Dynamic(i), *d));
    }

    let root_closures: Vec<AHashSet<ModuleId>> = roots
        .iter()
        .map(|(r, id)| match r {
            RootRef::Entry(i) => entry_closures[*i].1.clone(),
            RootRef::Dynamic(_) => static_closure(graph, *id, &survivor_set),
        })
        .collect();

    let root_ids: Vec<String> = roots
        .iter()
        .map(|(_, id)| relative_slug(graph, project_root, *id))
        .collect();

    // Owners of every survivor: which root closures contain it.
    let mut owners: AHashMap<ModuleId, Vec<usize>> = AHashMap::default();
    for (root_idx, closure) in root_closures.iter().enumerate() {
        for &member in closure {
            owners.entry(member).or_default().push(root_idx);
        }
    }

    // Any survivor reached by no root closure (a module reachable only
    // through a nested dynamic chain whose own root was not yet a dynamic
    // target above — cannot happen since dynamic_targets scans every
    // survivor, but guard defensively) becomes its own dynamic root.
    for &m in &survivors_sorted {
        owners.entry(m).or_default();
    }

    let mut chunk_members: Vec<AHashSet<ModuleId>> = roots.iter().map(|_| AHashSet::default()).collect();
    let mut shared_groups: AHashMap<Vec<usize>, AHashSet<ModuleId>> = AHashMap::default();

    let mut sorted_owned: Vec<ModuleId> = owners.keys().copied().collect();
    sorted_owned.sort_by_key(|id| graph.module(*id).path.as_path().to_path_buf());

    for module in sorted_owned {
        let mut owner_roots = owners.get(&module).cloned().unwrap_or_default();
        owner_roots.sort_unstable();
        owner_roots.dedup();
        match owner_roots.len() {
            1 => {
                chunk_members[owner_roots[0]].insert(module);
            }
            0 => {
                // Orphaned survivor (defensive fallback): fold into the
                // first root's chunk so nothing is silently dropped.
                if let Some(members) = chunk_members.first_mut() {
                    members.insert(module);
                }
            }
            _ => {
                shared_groups.entry(owner_roots).or_default().insert(module);
            }
        }
    }

    let mut chunks = Vec::new();
    let mut module_chunk: AHashMap<ModuleId, usize> = AHashMap::default();

    for (idx, (root_ref, root_id)) in roots.iter().enumerate() {
        let members = &chunk_members[idx];
        let modules = topo_order(graph, members);
        let chunk_root = match root_ref {
            RootRef::Entry(_) => ChunkRoot::Entry(*root_id),
            RootRef::Dynamic(_) => ChunkRoot::Dynamic(*root_id),
        };
        let id = root_ids[idx].clone();
        let chunk_idx = chunks.len();
        for &m in &modules {
            module_chunk.insert(m, chunk_idx);
        }
        chunks.push(Chunk { id, root: chunk_root, modules });
    }

    let mut shared_entries: Vec<(Vec<usize>, AHashSet<ModuleId>)> = shared_groups.into_iter().collect();
    shared_entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (owner_roots, members) in shared_entries {
        let owner_ids: Vec<String> = owner_roots.iter().map(|&i| root_ids[i].clone()).collect();
        let modules = topo_order(graph, &members);
        let id = shared_chunk_id(&owner_ids);
        let chunk_idx = chunks.len();
        for &m in &modules {
            module_chunk.insert(m, chunk_idx);
        }
        chunks.push(Chunk { id, root: ChunkRoot::Shared, modules });
    }

    ChunkedGraph { survivors: survivors_sorted, chunks, module_chunk }
}

#[cfg(test)]
mod test {
    use super::*;
    use bundler_transform::TransformOptions;
    use import_resolver::contract::{ExternalsConfig, Resolver};
    use import_resolver::swc_resolver::MonorepoResolver;
    use std::collections::HashMap;
    use swc_ecma_loader::TargetEnv;

    fn resolver_for(root: &std::path::Path) -> MonorepoResolver {
        MonorepoResolver::new_resolver(root.to_owned(), TargetEnv::Browser, Default::default(), true)
    }

    #[test]
    fn drops_modules_unreachable_from_any_entry() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/used.js" => "export const x = 1;",
            "p/unused.js" => "export const y = 2;",
            "p/main.js" => "import {x} from './used.js'; console.log(x);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/main.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let result = shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());
        assert_eq!(result.survivors.len(), 2);
        assert!(!result
            .survivors
            .iter()
            .any(|id| graph.module(*id).path.as_path().ends_with("unused.js")));
    }

    #[test]
    fn side_effect_only_import_survives_even_when_side_effect_free() {
        let tmp = test_tmpdir::test_tmpdir!(
            "package.json" => r#"{"sideEffects": false}"#,
            "p/polyfill.js" => "window.fetch = window.fetch || (() => {});",
            "p/main.js" => "import './polyfill.js'; console.log(1);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/main.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let result = shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());
        assert_eq!(result.survivors.len(), 2);
    }

    #[test]
    fn disabling_treeshake_keeps_type_only_imports_too() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/types.ts" => "export type T = number;",
            "p/main.ts" => "import type {T} from './types'; const x: T = 1; console.log(x);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/main.ts".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let shaken = shake_and_chunk(&graph, tmp.root(), &ShakeOptions { treeshake: true, splitting: true });
        assert_eq!(shaken.survivors.len(), 1);

        let unshaken = shake_and_chunk(&graph, tmp.root(), &ShakeOptions { treeshake: false, splitting: true });
        assert_eq!(unshaken.survivors.len(), 2);
    }

    #[test]
    fn dynamic_import_target_gets_its_own_chunk() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/lazy.js" => "export const z = 3;",
            "p/main.js" => "import('./lazy.js').then(m => console.log(m.z));"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/main.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let result = shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());
        assert_eq!(result.chunks.len(), 2);
        let entry_chunk = result.chunk_of(graph.entries()[0]);
        assert!(matches!(entry_chunk.root, ChunkRoot::Entry(_)));

        let lazy = result
            .survivors
            .iter()
            .find(|id| graph.module(**id).path.as_path().ends_with("lazy.js"))
            .copied()
            .unwrap();
        let lazy_chunk = result.chunk_of(lazy);
        assert!(matches!(lazy_chunk.root, ChunkRoot::Dynamic(_)));
    }

    #[test]
    fn shared_dependency_of_two_entries_gets_its_own_chunk() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/shared.js" => "export const s = 1;",
            "p/a.js" => "import {s} from './shared.js'; console.log(s);",
            "p/b.js" => "import {s} from './shared.js'; console.log(s + 1);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/a.js".to_string(), "./p/b.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let result = shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());
        assert_eq!(result.chunks.len(), 3);
        let shared = result
            .survivors
            .iter()
            .find(|id| graph.module(**id).path.as_path().ends_with("shared.js"))
            .copied()
            .unwrap();
        assert!(matches!(result.chunk_of(shared).root, ChunkRoot::Shared));
    }

    #[test]
    fn disabling_splitting_collapses_everything_into_one_chunk() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/lazy.js" => "export const z = 3;",
            "p/main.js" => "import('./lazy.js').then(m => console.log(m.z));"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = bundler_graph::cache::TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/main.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();

        let result = shake_and_chunk(&graph, tmp.root(), &ShakeOptions { treeshake: true, splitting: false });
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].modules.len(), 2);
    }
}
