//! The configuration surface of §6 (`entry`, `outdir`, `target`, `format`,
//! `splitting`, `treeshake`, `minify`, `sourcemap`, `external`, `alias`,
//! `define`): JSON-file loading with CLI-flag overrides layered on top, in
//! the style of the teacher's `src/bin/good-fences.rs` (`--base-url`
//! overriding `tsconfig.json`'s `compilerOptions.baseUrl` after the file is
//! parsed).
//!
//! Unlike the teacher's `TsconfigPathsJson::from_path` (permissive,
//! unknown keys ignored), this is deliberately strict: unknown keys are a
//! hard `Config.Invalid` error (`#[serde(deny_unknown_fields)]`), per §1
//! "a bundler config typo silently producing the wrong output is strictly
//! worse than a refused build."
//!
//! `plugins` (§6) and `minify`'s post-processor callback are not
//! JSON-representable — only a `minify: bool` toggle lives here; the
//! actual callback and plugin list are composed in code by whatever
//! constructs a [`BuildConfig`] (`bundler_core`), same as the teacher never
//! tries to deserialize a closure either.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use bundler_diag::Diagnostic;
use bundler_emit::{EmitOptions, Format};
use bundler_graph::Target;
use bundler_shake::ShakeOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigTarget {
    Browser,
    Server,
}

impl Default for ConfigTarget {
    fn default() -> Self {
        ConfigTarget::Browser
    }
}

impl From<ConfigTarget> for Target {
    fn from(value: ConfigTarget) -> Self {
        match value {
            ConfigTarget::Browser => Target::Browser,
            ConfigTarget::Server => Target::Server,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Iife,
    Cjs,
    Esm,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        ConfigFormat::Iife
    }
}

impl From<ConfigFormat> for Format {
    fn from(value: ConfigFormat) -> Self {
        match value {
            ConfigFormat::Iife => Format::Iife,
            ConfigFormat::Cjs => Format::Cjs,
            ConfigFormat::Esm => Format::Esm,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    None,
    Inline,
    External,
}

impl Default for SourceMapMode {
    fn default() -> Self {
        SourceMapMode::None
    }
}

/// The deserialized shape of a config file, before any CLI override is
/// applied. Field names match §6's table verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RawConfig {
    pub entry: Vec<String>,
    pub outdir: String,
    pub target: ConfigTarget,
    pub format: ConfigFormat,
    pub splitting: bool,
    pub treeshake: bool,
    pub minify: bool,
    pub sourcemap: SourceMapMode,
    pub external: Vec<String>,
    pub alias: HashMap<String, String>,
    pub define: HashMap<String, String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            outdir: "dist".to_string(),
            target: ConfigTarget::default(),
            format: ConfigFormat::default(),
            splitting: true,
            treeshake: true,
            minify: false,
            sourcemap: SourceMapMode::default(),
            external: Vec::new(),
            alias: HashMap::new(),
            define: HashMap::new(),
        }
    }
}

impl RawConfig {
    pub fn from_json_str(source: &str) -> Result<Self, Diagnostic> {
        serde_json::from_str(source).map_err(|err| Diagnostic::ConfigInvalid {
            message: format!("invalid config: {err}"),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, Diagnostic> {
        let source = fs::read_to_string(path).map_err(|err| Diagnostic::IoUnreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&source)
    }
}

/// CLI flags that may override individual [`RawConfig`] fields after load,
/// mirroring the teacher's lone `--base-url` override of `tsconfig.json`'s
/// `compilerOptions.baseUrl`. Every field is optional; `None` leaves the
/// loaded config's value untouched.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub entry: Vec<String>,
    pub outdir: Option<String>,
    pub target: Option<ConfigTarget>,
    pub format: Option<ConfigFormat>,
    pub splitting: Option<bool>,
    pub treeshake: Option<bool>,
    pub minify: Option<bool>,
}

impl RawConfig {
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if !overrides.entry.is_empty() {
            self.entry = overrides.entry.clone();
        }
        if let Some(outdir) = &overrides.outdir {
            self.outdir = outdir.clone();
        }
        if let Some(target) = overrides.target {
            self.target = target;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(splitting) = overrides.splitting {
            self.splitting = splitting;
        }
        if let Some(treeshake) = overrides.treeshake {
            self.treeshake = treeshake;
        }
        if let Some(minify) = overrides.minify {
            self.minify = minify;
        }
    }
}

/// The fully resolved, validated configuration a build runs with —
/// [`RawConfig`] split into the shapes each downstream component actually
/// wants (`ShakeOptions`, `EmitOptions`, a plain `Target`), so `bundler_core`
/// never has to know the JSON field layout.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub entry: Vec<String>,
    pub outdir: PathBuf,
    pub target: Target,
    pub minify: bool,
    pub sourcemap: SourceMapMode,
    pub external: Vec<String>,
    /// Specifier-prefix -> replacement, merged with any tsconfig-style
    /// `paths` entries by the caller (see `tsconfig_paths::merged_paths`).
    pub alias: HashMap<String, String>,
    pub define: HashMap<String, String>,
    pub shake: ShakeOptions,
    pub emit: EmitOptions,
}

impl TryFrom<RawConfig> for BuildConfig {
    type Error = Diagnostic;

    fn try_from(raw: RawConfig) -> Result<Self, Diagnostic> {
        if raw.entry.is_empty() {
            return Err(Diagnostic::ConfigInvalid {
                message: "`entry` must name at least one entry path".to_string(),
            });
        }

        let target: Target = raw.target.into();
        Ok(BuildConfig {
            entry: raw.entry,
            outdir: PathBuf::from(raw.outdir),
            target,
            minify: raw.minify,
            sourcemap: raw.sourcemap,
            external: raw.external,
            alias: raw.alias,
            define: raw.define,
            shake: ShakeOptions {
                treeshake: raw.treeshake,
                splitting: raw.splitting,
            },
            emit: EmitOptions {
                format: raw.format.into(),
                target,
                hashed_filenames: !matches!(raw.sourcemap, SourceMapMode::Inline),
            },
        })
    }
}

impl BuildConfig {
    /// Load a config file, apply CLI overrides, then validate and split it
    /// into the per-component shapes (`RawConfig::from_path` ->
    /// `apply_overrides` -> `try_into`, in that order — this is the entire
    /// "load, then override" pipeline named in §6's `bundler_config`
    /// description).
    pub fn load(path: &Path, overrides: &CliOverrides) -> Result<Self, Diagnostic> {
        let mut raw = RawConfig::from_path(path)?;
        raw.apply_overrides(overrides);
        raw.try_into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RawConfig::from_json_str(r#"{"entyr": ["/p/main.js"]}"#).unwrap_err();
        assert!(matches!(err, Diagnostic::ConfigInvalid { .. }));
    }

    #[test]
    fn defaults_match_spec_table() {
        let raw = RawConfig::from_json_str(r#"{"entry": ["/p/main.js"], "outdir": "dist"}"#).unwrap();
        assert_eq!(raw.target, ConfigTarget::Browser);
        assert_eq!(raw.format, ConfigFormat::Iife);
        assert!(raw.splitting);
        assert!(raw.treeshake);
        assert!(!raw.minify);
    }

    #[test]
    fn cli_overrides_win_over_file_values() {
        let mut raw = RawConfig::from_json_str(r#"{"entry": ["/p/a.js"], "target": "browser"}"#).unwrap();
        raw.apply_overrides(&CliOverrides {
            target: Some(ConfigTarget::Server),
            ..Default::default()
        });
        assert_eq!(raw.target, ConfigTarget::Server);
    }

    #[test]
    fn empty_entry_list_is_invalid() {
        let raw = RawConfig::from_json_str(r#"{"outdir": "dist"}"#).unwrap();
        let err = BuildConfig::try_from(raw).unwrap_err();
        assert!(matches!(err, Diagnostic::ConfigInvalid { .. }));
    }

    #[test]
    fn valid_config_converts_into_per_component_options() {
        let raw = RawConfig::from_json_str(
            r#"{"entry": ["/p/main.js"], "outdir": "dist", "target": "server", "splitting": false}"#,
        )
        .unwrap();
        let config = BuildConfig::try_from(raw).unwrap();
        assert_eq!(config.target, Target::Server);
        assert!(!config.shake.splitting);
        assert!(config.shake.treeshake);
    }
}
