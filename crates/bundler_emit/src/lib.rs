//! Emitter (component F, §4.6): for each chunk of a [`bundler_shake::ChunkedGraph`],
//! rewrites every member module's linkage into runtime calls
//! ([`rewrite::rewrite_module`]), prepends the runtime preamble
//! ([`runtime::preamble`]), and appends the entry trailer, producing a
//! self-contained chunk artifact plus the code-splitting manifest (§6).
//!
//! No teacher precedent for any of this (`good_fences` only ever read
//! import graphs; it never emitted a bundle). Module/chunk ids reuse
//! `bundler_shake`'s project-relative, extension-stripped path slug scheme
//! so that a chunk's *id* and its root module's *registered module id* are
//! the same string — which is what lets the runtime's
//! `__dynamicImport(chunkId)` resolve straight to `__require(chunkId)`
//! without a separate chunk-id-to-module-id indirection table.

pub mod rewrite;
pub mod runtime;

use std::path::Path;

use ahashmap::AHashMap;
use bundler_diag::{Diagnostic, Diagnostics};
use bundler_graph::{EdgeTarget, Graph, ModuleId, Target};
use bundler_shake::{ChunkRoot, ChunkedGraph};
use rewrite::{rewrite_module, MapEdgeResolver, RewriteTarget};
use sha2::{Digest, Sha256};

/// §6 `format`: emission shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Iife,
    Cjs,
    Esm,
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub format: Format,
    pub target: Target,
    /// Whether the content hash is folded into each chunk's file name
    /// (§4.6 step 5, "if hashed output is configured").
    pub hashed_filenames: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { format: Format::Iife, target: Target::Browser, hashed_filenames: false }
    }
}

/// One emitted chunk (§4.6 Contract: "a self-contained executable artifact").
#[derive(Debug, Clone)]
pub struct EmittedChunk {
    pub id: String,
    pub is_entry: bool,
    pub code: String,
    /// Stable content hash of `code` (§4.6 step 5).
    pub content_hash: String,
    /// The file name this chunk should be written under (§6 `outdir`-relative).
    pub file_name: String,
}

/// One entry of the code-splitting manifest (§6 "Code-splitting manifest").
/// `css` is always `None` from this crate; a CSS-loader plugin would
/// populate it, and no such plugin is in scope here (§1 Out of scope).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManifestEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

pub type Manifest = AHashMap<String, ManifestEntry>;

/// The project-relative, extension-stripped slug used as both a module's
/// registered runtime id and (for a chunk's root module) the chunk's own
/// id. Mirrors `bundler_shake::relative_slug`'s scheme exactly — the two
/// must stay in lock-step for `__dynamicImport`'s `__require(chunkId)`
/// shortcut (see module docs) to resolve the right module.
fn module_id(graph: &Graph, project_root: &Path, id: ModuleId) -> String {
    let path = graph.module(id).path.as_path();
    let relative = path.strip_prefix(project_root).unwrap_or(path);
    relative.with_extension("").to_string_lossy().replace('\\', "/")
}

fn content_hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest: [u8; 32] = hasher.finalize().into();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn wrap(format: Format, is_entry: bool, body: String) -> String {
    match format {
        Format::Iife => format!("(function () {{\n{body}}})();\n"),
        Format::Cjs => body,
        Format::Esm => {
            if is_entry {
                format!("{body}export {{}};\n")
            } else {
                body
            }
        }
    }
}

/// Builds the [`rewrite::EdgeResolver`] for one module: a specifier -> target
/// map for static/re-export edges, and a specifier -> chunk-id map for
/// dynamic edges whose target module survived (§4.6 step 3).
fn edge_resolver_for(graph: &Graph, project_root: &Path, chunked: &ChunkedGraph, module: ModuleId) -> MapEdgeResolver {
    let mut targets = AHashMap::default();
    let mut dynamic_chunks = AHashMap::default();

    for edge in &graph.module(module).edges {
        let target = match &edge.target {
            EdgeTarget::Internal(target_id) => RewriteTarget::Internal(module_id(graph, project_root, *target_id)),
            EdgeTarget::External(name) => RewriteTarget::External(name.clone()),
        };
        targets.entry(edge.specifier.clone()).or_insert(target);
    }

    for edge in graph.module(module).dynamic_edges() {
        if let EdgeTarget::Internal(target_id) = &edge.target {
            if chunked.survivors.contains(target_id) {
                dynamic_chunks.insert(edge.specifier.clone(), chunked.chunk_of(*target_id).id.clone());
            }
        }
    }

    MapEdgeResolver { targets, dynamic_chunks }
}

/// Runs the Emitter end to end (§4.6 Algorithm) over every chunk of
/// `chunked`, returning the emitted chunks (in chunk order) plus the
/// code-splitting manifest.
pub fn emit(
    graph: &Graph,
    chunked: &ChunkedGraph,
    project_root: &Path,
    options: &EmitOptions,
) -> Result<(Vec<EmittedChunk>, Manifest), Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    // Pass 1: rewrite every chunk's module bodies. A chunk's *body* never
    // references any chunk's file name (only module/chunk *ids*, which are
    // fixed before hashing), so hashing the body first and only folding the
    // manifest in afterwards sidesteps the chicken-and-egg problem of a
    // hashed file name that would otherwise need to appear inside the very
    // bytes it is a hash of.
    let mut bodies: Vec<(bool, String)> = Vec::with_capacity(chunked.chunks.len());
    for chunk in &chunked.chunks {
        let is_entry = matches!(chunk.root, ChunkRoot::Entry(_));
        let mut body = String::new();

        for &module_idx in &chunk.modules {
            let resolver = edge_resolver_for(graph, project_root, chunked, module_idx);
            let module = graph.module(module_idx);
            let filename_hint = module.path.as_path().to_string_lossy().into_owned();

            match rewrite_module(&module.code, &filename_hint, &resolver) {
                Ok(rewritten) => {
                    let id = module_id(graph, project_root, module_idx);
                    body.push_str(&format!(
                        "__define(\"{id}\", function (require, exports, module) {{\n{rewritten}\n}});\n"
                    ));
                }
                Err(diag) => diagnostics.push(diag),
            }
        }

        if is_entry {
            body.push_str(&format!("__require(\"{}\");\n", chunk.id));
        }

        bodies.push((is_entry, body));
    }

    diagnostics.into_result()?;

    // File names are now fully determined (each depends only on its own
    // chunk's body, never on the manifest), so the manifest every chunk
    // embeds can be built once, in full, before any chunk's final bytes.
    let mut manifest = Manifest::default();
    let mut file_names = Vec::with_capacity(chunked.chunks.len());
    for (chunk, (_, body)) in chunked.chunks.iter().zip(&bodies) {
        let body_hash = content_hash_hex(body.as_bytes());
        let file_name = if options.hashed_filenames {
            format!("{}.{}.js", chunk.id, body_hash)
        } else {
            format!("{}.js", chunk.id)
        };
        manifest.insert(chunk.id.clone(), ManifestEntry { path: file_name.clone(), css: None });
        file_names.push(file_name);
    }
    let manifest_json = manifest_json_string(&manifest);

    let mut chunks = Vec::with_capacity(chunked.chunks.len());
    for ((chunk, (is_entry, body)), file_name) in chunked.chunks.iter().zip(bodies).zip(file_names) {
        let mut full = runtime::preamble(options.target, &manifest_json);
        full.push_str(&body);
        let code = wrap(options.format, is_entry, full);
        let content_hash = content_hash_hex(code.as_bytes());
        chunks.push(EmittedChunk { id: chunk.id.clone(), is_entry, code, content_hash, file_name });
    }

    Ok((chunks, manifest))
}

/// Renders `manifest` as the JSON object embedded into every chunk's runtime
/// preamble (§6 "Code-splitting manifest"), sorted by chunk id for
/// byte-stable output (§8 "running the pipeline twice... produces
/// byte-identical chunk outputs").
pub fn manifest_json_string(manifest: &Manifest) -> String {
    let mut sorted: Vec<(&String, &ManifestEntry)> = manifest.iter().collect();
    sorted.sort_by_key(|(id, _)| id.as_str());
    let ordered: std::collections::BTreeMap<&str, &ManifestEntry> =
        sorted.into_iter().map(|(id, entry)| (id.as_str(), entry)).collect();
    serde_json::to_string(&ordered).expect("manifest entries always serialize")
}

#[cfg(test)]
mod test {
    use super::*;
    use bundler_graph::cache::TransformCache;
    use bundler_shake::ShakeOptions;
    use bundler_transform::TransformOptions;
    use import_resolver::contract::{ExternalsConfig, Resolver};
    use import_resolver::swc_resolver::MonorepoResolver;
    use std::collections::HashMap;
    use swc_ecma_loader::TargetEnv;

    fn resolver_for(root: &Path) -> MonorepoResolver {
        MonorepoResolver::new_resolver(root.to_owned(), TargetEnv::Browser, Default::default(), true)
    }

    #[test]
    fn emits_a_single_chunk_that_requires_the_entry() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/a.js" => "export const x = 1;",
            "p/b.js" => "import {x} from './a.js'; console.log(x);"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/b.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();
        let chunked = bundler_shake::shake_and_chunk(&graph, tmp.root(), &ShakeOptions { treeshake: true, splitting: false });

        let (chunks, manifest) = emit(&graph, &chunked, tmp.root(), &EmitOptions::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].code.contains("__define(\"p/a\""));
        assert!(chunks[0].code.contains("__define(\"p/b\""));
        assert!(chunks[0].code.contains("__require(\"p/b\");"));
        assert!(chunks[0].code.contains("require(\"p/a\")"));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn dynamic_split_produces_two_chunks_wired_by_the_manifest() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/e.js" => "export default 7;",
            "p/m.js" => "const m = import('./e.js'); m.then(mod => console.log(mod.default));"
        );
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = TransformCache::new();
        let graph = bundler_graph::build(
            tmp.root(),
            &["./p/m.js".to_string()],
            &resolver,
            &cache,
            &TransformOptions::default(),
        )
        .unwrap();
        let chunked = bundler_shake::shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());

        let (chunks, manifest) = emit(&graph, &chunked, tmp.root(), &EmitOptions::default()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(manifest.len(), 2);

        let entry = chunks.iter().find(|c| c.is_entry).unwrap();
        assert!(entry.code.contains("__dynamicImport(\"p/e\")"));
        let dynamic = chunks.iter().find(|c| !c.is_entry).unwrap();
        assert!(dynamic.code.contains("__define(\"p/e\""));
        assert_eq!(dynamic.id, "p/e");
    }

    #[test]
    fn iife_format_wraps_the_chunk_in_an_immediately_invoked_function() {
        let tmp = test_tmpdir::test_tmpdir!("p/a.js" => "export const x = 1;");
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = TransformCache::new();
        let graph =
            bundler_graph::build(tmp.root(), &["./p/a.js".to_string()], &resolver, &cache, &TransformOptions::default()).unwrap();
        let chunked = bundler_shake::shake_and_chunk(&graph, tmp.root(), &ShakeOptions { treeshake: true, splitting: false });

        let (chunks, _) = emit(&graph, &chunked, tmp.root(), &EmitOptions { format: Format::Iife, ..EmitOptions::default() }).unwrap();
        assert!(chunks[0].code.starts_with("(function () {"));
        assert!(chunks[0].code.trim_end().ends_with("})();"));
    }

    #[test]
    fn identical_inputs_produce_byte_identical_output() {
        let tmp = test_tmpdir::test_tmpdir!("p/a.js" => "export const x = 1; console.log(x);");
        let monorepo = resolver_for(tmp.root());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let cache = TransformCache::new();
        let graph =
            bundler_graph::build(tmp.root(), &["./p/a.js".to_string()], &resolver, &cache, &TransformOptions::default()).unwrap();
        let chunked = bundler_shake::shake_and_chunk(&graph, tmp.root(), &ShakeOptions::default());

        let (first, _) = emit(&graph, &chunked, tmp.root(), &EmitOptions::default()).unwrap();
        let (second, _) = emit(&graph, &chunked, tmp.root(), &EmitOptions::default()).unwrap();
        assert_eq!(first[0].code, second[0].code);
        assert_eq!(first[0].content_hash, second[0].content_hash);
    }
}
