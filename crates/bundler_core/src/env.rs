//! Per-phase environment structs (§9 redesign flag: "the source pervasively
//! threads a mutable context object with global state... reformulate as an
//! explicit `BuildEnv` passed by reference, plus per-phase structs...
//! carrying only what that phase needs. No process-global singletons").
//!
//! No teacher precedent — `good_fences` threads its `TsconfigPathsJson`
//! and file lists as plain constructor arguments, never a shared mutable
//! context object, so there was nothing here to imitate the *problem* of;
//! these types exist purely to satisfy the redesign flag's *solution*.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bundler_config::BuildConfig;
use import_resolver::contract::ExternalsConfig;
use logger::Logger;

/// Everything the Resolver phase needs and nothing else.
pub struct ResolveEnv<'a> {
    pub project_root: &'a Path,
    pub externals: ExternalsConfig,
    pub alias: HashMap<String, String>,
}

impl<'a> ResolveEnv<'a> {
    pub fn from_config(project_root: &'a Path, config: &BuildConfig) -> Self {
        Self {
            project_root,
            externals: ExternalsConfig::new(config.external.clone()),
            alias: merge_tsconfig_alias(project_root, &config.alias),
        }
    }
}

/// Folds a project-root `tsconfig.json`'s `compilerOptions.paths` (if one
/// exists and parses) together with the config-level `alias` map, via
/// `tsconfig_paths::TsconfigPathsCompilerOptions::merged_paths`, keeping
/// only the first candidate of each pattern — the
/// `import_resolver::contract::Resolver`'s alias-substitution layer only
/// ever does a single prefix rewrite, not a fall-through candidate list.
/// `MonorepoResolver`'s own nearest-tsconfig walk (`swc_resolver::tsconfig`)
/// remains the full-fidelity, multi-candidate path-mapping implementation;
/// this is a best-effort shortcut so an `alias`-style override also applies
/// to tsconfig `paths` entries before the specifier ever reaches it. Silent
/// no-op when no `tsconfig.json` is present — that is the common case for a
/// plain JavaScript project.
fn merge_tsconfig_alias(project_root: &Path, alias: &HashMap<String, String>) -> HashMap<String, String> {
    let tsconfig_path = project_root.join("tsconfig.json");
    match tsconfig_paths::TsconfigPathsJson::from_path(&tsconfig_path.to_string_lossy()) {
        Ok(tsconfig) => tsconfig
            .compiler_options
            .merged_paths(alias)
            .into_iter()
            .filter_map(|(specifier, mut candidates)| (!candidates.is_empty()).then(|| (specifier, candidates.remove(0))))
            .collect(),
        Err(_) => alias.clone(),
    }
}

/// Everything the Emitter phase needs and nothing else.
pub struct EmitEnv<'a> {
    pub project_root: &'a Path,
    pub options: &'a bundler_emit::EmitOptions,
}

impl<'a> EmitEnv<'a> {
    pub fn from_config(project_root: &'a Path, config: &'a BuildConfig) -> Self {
        Self { project_root, options: &config.emit }
    }
}

/// The top-level handle passed by reference through one build: the project
/// root, the resolved configuration, and a logger. Replaces the source's
/// mutable global context; nothing here is mutated once constructed.
pub struct BuildEnv<'a, L: Logger> {
    pub project_root: PathBuf,
    pub config: &'a BuildConfig,
    pub logger: L,
}

impl<'a, L: Logger> BuildEnv<'a, L> {
    pub fn new(project_root: PathBuf, config: &'a BuildConfig, logger: L) -> Self {
        Self { project_root, config, logger }
    }

    pub fn resolve_env(&self) -> ResolveEnv<'_> {
        ResolveEnv::from_config(&self.project_root, self.config)
    }

    pub fn emit_env(&self) -> EmitEnv<'_> {
        EmitEnv::from_config(&self.project_root, self.config)
    }
}
