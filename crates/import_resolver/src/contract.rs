//! The public `resolve(specifier, importing-file-or-dir) -> Resolved`
//! contract of spec §4.1, layered on top of `swc_resolver::MonorepoResolver`
//! (path-mapping, file probe, node_modules walk, `exports` resolution).
//!
//! This module owns the two steps that run *before* `MonorepoResolver` sees
//! anything: externals detection and `alias` substitution-with-restart. The
//! `alias` table carried inside `swc_resolver::node_resolver`'s
//! `NodeModulesResolverOptions` stays available for node-internal shims
//! (e.g. `stream` -> `stream-browserify`); this layer's `alias` is the
//! config-level `{specifier-prefix: replacement}` map named in §6.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use abspath::AbsPath;
use bundler_diag::Diagnostic;
use packagejson::PackageJson;
use swc_common::FileName;
use swc_ecma_loader::{resolve::Resolve, NODE_BUILTINS};

use crate::swc_resolver::MonorepoResolver;

/// Literal names and `prefix*` patterns marked as external (§6 `external`).
#[derive(Debug, Clone, Default)]
pub struct ExternalsConfig {
    literal: HashSet<String>,
    prefixes: Vec<String>,
}

impl ExternalsConfig {
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        let mut literal = HashSet::new();
        let mut prefixes = Vec::new();
        for entry in entries {
            match entry.strip_suffix('*') {
                Some(prefix) => prefixes.push(prefix.to_string()),
                None => {
                    literal.insert(entry);
                }
            }
        }
        Self { literal, prefixes }
    }

    pub fn matches(&self, specifier: &str) -> bool {
        self.literal.contains(specifier) || self.prefixes.iter().any(|p| specifier.starts_with(p.as_str()))
    }
}

/// The package.json-derived descriptor attached to a resolved file, when one
/// covers it (§3 "Package descriptor").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    pub version: Option<String>,
    pub root: PathBuf,
}

/// The result of a single `resolve()` call (§4.1 Contract).
#[derive(Debug, Clone)]
pub enum Resolved {
    File {
        path: AbsPath,
        package: Option<PackageDescriptor>,
    },
    External(String),
}

/// Restart-loop guard for alias substitution: a misconfigured alias cycle
/// (`"a" -> "b"`, `"b" -> "a"`) must not hang the resolver.
const MAX_ALIAS_RESTARTS: usize = 16;

pub struct Resolver<'a> {
    inner: &'a MonorepoResolver,
    externals: ExternalsConfig,
    alias: HashMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(inner: &'a MonorepoResolver, externals: ExternalsConfig, alias: HashMap<String, String>) -> Self {
        Self {
            inner,
            externals,
            alias,
        }
    }

    /// §4.1 Algorithm, steps 1-2 (externals, alias) run here; steps 3-5
    /// (path-mapping, file probe, bare-specifier walk) are delegated to
    /// `MonorepoResolver`.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Result<Resolved, Diagnostic> {
        let mut current = specifier.to_string();

        for _ in 0..MAX_ALIAS_RESTARTS {
            if self.is_external(&current) {
                return Ok(Resolved::External(current));
            }

            if let Some(substituted) = self.substitute_alias(&current) {
                current = substituted;
                continue;
            }

            let base = FileName::Real(importer.to_path_buf());
            return match self.inner.resolve(&base, &current) {
                Ok(resolution) => self.to_resolved(resolution, importer),
                Err(err) => Err(self.to_not_found(&current, importer, err)),
            };
        }

        Err(Diagnostic::ConfigInvalid {
            message: format!(
                "alias substitution for `{specifier}` did not terminate after {MAX_ALIAS_RESTARTS} restarts"
            ),
        })
    }

    fn is_external(&self, specifier: &str) -> bool {
        specifier.starts_with("node:") || NODE_BUILTINS.contains(&specifier) || self.externals.matches(specifier)
    }

    /// §4.1 step 2: "If the specifier equals a configured alias key, or
    /// begins with `alias/`, substitute and restart." — a key may alias the
    /// whole specifier (`"react"` -> `"preact/compat"`) or act as a path
    /// prefix (`"@x"` -> `"/p/x"` rewriting `"@x/v.js"` to `"/p/x/v.js"`).
    fn substitute_alias(&self, specifier: &str) -> Option<String> {
        if let Some(target) = self.alias.get(specifier) {
            return Some(target.clone());
        }
        for (key, target) in &self.alias {
            if let Some(rest) = specifier.strip_prefix(key.as_str()) {
                if let Some(rest) = rest.strip_prefix('/') {
                    return Some(format!("{}/{}", target.trim_end_matches('/'), rest));
                }
            }
        }
        None
    }

    fn to_resolved(&self, resolution: swc_ecma_loader::resolve::Resolution, importer: &Path) -> Result<Resolved, Diagnostic> {
        match resolution.filename {
            FileName::Real(path) => {
                let package = nearest_package_descriptor(&path);
                let path = AbsPath::from_absolute(path).map_err(|_| Diagnostic::IoUnreadable {
                    path: importer.to_path_buf(),
                    message: "resolved path was not absolute".to_string(),
                })?;
                Ok(Resolved::File { path, package })
            }
            FileName::Custom(name) => Ok(Resolved::External(name)),
            other => Err(Diagnostic::ResolutionNotFound {
                specifier: other.to_string(),
                importer: importer.to_path_buf(),
                suggestions: Vec::new(),
            }),
        }
    }

    fn to_not_found(&self, specifier: &str, importer: &Path, err: anyhow::Error) -> Diagnostic {
        // `exports` being present-but-unmatched reports as `Ambiguous`
        // (§7 "a package exports field matched no condition"); a probe that
        // ran to `ftree_cache`'s depth ceiling without terminating is a
        // symlink cycle in `node_modules` (§3's walk, spec line 81's "cyclic
        // symlinks terminate the walk"), reported as the fatal
        // `GraphCyclicPackage` rather than an ordinary not-found; everything
        // else is a plain `NotFound`.
        let message = format!("{err:#}");
        if message.contains("Max probe depth reached") {
            Diagnostic::GraphCyclicPackage { path: importer.to_path_buf() }
        } else if message.contains("exports") {
            Diagnostic::ResolutionAmbiguous {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
                candidate: importer.to_path_buf(),
            }
        } else {
            let suggestions = installed_package_names(importer)
                .map(|names| {
                    bundler_diag::suggest_similar(
                        crate::swc_resolver::util::package_name(specifier).unwrap_or(specifier),
                        names.iter().map(String::as_str),
                    )
                })
                .unwrap_or_default();

            Diagnostic::ResolutionNotFound {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
                suggestions,
            }
        }
    }
}

/// Walks upward from `file`'s directory to the nearest `package.json`,
/// returning its `name`/`version` plus the directory it was found in.
fn nearest_package_descriptor(file: &Path) -> Option<PackageDescriptor> {
    let mut dir = file.parent()?;
    loop {
        let candidate = dir.join("package.json");
        if candidate.is_file() {
            let pkg: PackageJson = File::open(&candidate)
                .ok()
                .and_then(|f| serde_json::from_reader(BufReader::new(f)).ok())?;
            return Some(PackageDescriptor {
                name: pkg.name,
                version: pkg.version,
                root: dir.to_path_buf(),
            });
        }
        dir = dir.parent()?;
    }
}

/// Lists the package names installed in the nearest `node_modules`
/// ancestor of `importer`, for the §2 "did you mean" suggestion feature.
fn installed_package_names(importer: &Path) -> Option<Vec<String>> {
    let mut dir = importer.parent()?;
    loop {
        let node_modules = dir.join("node_modules");
        if node_modules.is_dir() {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&node_modules).ok()?.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('@') {
                    if let Ok(scoped) = std::fs::read_dir(entry.path()) {
                        for scoped_entry in scoped.flatten() {
                            names.push(format!("{name}/{}", scoped_entry.file_name().to_string_lossy()));
                        }
                    }
                } else {
                    names.push(name);
                }
            }
            return Some(names);
        }
        dir = dir.parent()?;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use swc_ecma_loader::TargetEnv;

    #[test]
    fn externals_config_matches_literal_and_prefix() {
        let externals = ExternalsConfig::new(vec!["react".to_string(), "lodash/*".to_string()]);
        assert!(externals.matches("react"));
        assert!(externals.matches("lodash/debounce"));
        assert!(!externals.matches("preact"));
    }

    #[test]
    fn resolve_reports_external_for_node_builtin() {
        let tmp = test_tmpdir::test_tmpdir!("src/index.ts" => "import fs from 'fs';");
        let monorepo = MonorepoResolver::new_resolver(
            tmp.root().to_owned(),
            TargetEnv::Node,
            Default::default(),
            true,
        );
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());
        let resolved = resolver
            .resolve(&tmp.root().join("src/index.ts"), "fs")
            .unwrap();
        assert!(matches!(resolved, Resolved::External(name) if name == "fs"));
    }

    #[test]
    fn resolve_substitutes_configured_alias() {
        let tmp = test_tmpdir::test_tmpdir!(
            "p/main.js" => "import v from '@x/v.js';",
            "p/x/v.js" => "export default 5;"
        );
        let monorepo =
            MonorepoResolver::new_resolver(tmp.root().to_owned(), TargetEnv::Browser, Default::default(), true);
        let mut alias = HashMap::new();
        alias.insert("@x".to_string(), tmp.root().join("p/x").to_string_lossy().into_owned());
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), alias);

        let resolved = resolver
            .resolve(&tmp.root().join("p/main.js"), "@x/v.js")
            .unwrap();
        match resolved {
            Resolved::File { path, .. } => {
                assert_eq!(path.as_path(), tmp.root().join("p/x/v.js"));
            }
            Resolved::External(_) => panic!("expected a file resolution"),
        }
    }

    #[test]
    fn a_probe_depth_error_reports_as_a_cyclic_package_not_a_plain_not_found() {
        let tmp = test_tmpdir::test_tmpdir!("src/index.ts" => "import x from 'x';");
        let monorepo =
            MonorepoResolver::new_resolver(tmp.root().to_owned(), TargetEnv::Browser, Default::default(), true);
        let resolver = Resolver::new(&monorepo, ExternalsConfig::default(), HashMap::new());

        let err = anyhow::anyhow!(
            "Max probe depth reached while searching for node_modules in parent directories"
        );
        let importer = tmp.root().join("src/index.ts");
        let diagnostic = resolver.to_not_found("x", &importer, err);
        assert!(matches!(diagnostic, Diagnostic::GraphCyclicPackage { path } if path == importer));
    }
}
