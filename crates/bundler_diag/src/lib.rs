//! The error taxonomy (§7) and a `MultiErr`-style aggregator so a one-shot
//! build can report every failure instead of just the first.

use std::fmt::Debug;
use std::path::PathBuf;

/// One of the seven expected-error kinds a build can produce. Bugs
/// (programming errors, not expected-error kinds) are not represented here;
/// they propagate as panics instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Diagnostic {
    #[error("could not resolve `{specifier}` from `{importer}`")]
    ResolutionNotFound {
        specifier: String,
        importer: PathBuf,
        /// Installed package names within Levenshtein distance 2 of
        /// `specifier`'s package name, offered as a best-effort hint.
        suggestions: Vec<String>,
    },

    #[error("`{specifier}` matched no export condition in `{candidate}`")]
    ResolutionAmbiguous {
        specifier: String,
        importer: PathBuf,
        candidate: PathBuf,
    },

    #[error("syntax error in {file}:{line}:{column}: {message}")]
    ParseSyntaxError {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("transform of {file} failed: {message}")]
    TransformFailure { file: PathBuf, message: String },

    #[error("cyclic symlink detected while walking node_modules at {path}")]
    GraphCyclicPackage { path: PathBuf },

    #[error("could not read {path}: {message}")]
    IoUnreadable { path: PathBuf, message: String },

    #[error("invalid configuration: {message}")]
    ConfigInvalid { message: String },
}

impl Diagnostic {
    /// Wrap an `onResolve` plugin failure with the offending plugin's name,
    /// per §7 "Plugin exceptions are caught, wrapped with the plugin name...
    /// surfaced as... Resolution.NotFound".
    pub fn from_plugin_resolve_failure(
        plugin_name: &str,
        specifier: impl Into<String>,
        importer: PathBuf,
    ) -> Self {
        Diagnostic::ResolutionNotFound {
            specifier: format!("{} (via plugin `{plugin_name}`)", specifier.into()),
            importer,
            suggestions: Vec::new(),
        }
    }

    /// Wrap any other plugin hook's failure (`onLoad`/`onTransform`/
    /// `onStart`/`onEnd`) with the offending plugin's name, surfaced as
    /// `Transform.Failure`.
    pub fn from_plugin_failure(plugin_name: &str, hook: &str, file: PathBuf, message: impl Into<String>) -> Self {
        Diagnostic::TransformFailure {
            file,
            message: format!("plugin `{plugin_name}` ({hook}): {}", message.into()),
        }
    }
}

/// Aggregates every `Diagnostic` raised while building, so a one-shot build
/// fails with everything wrong at once rather than the first error found.
/// Grounded on `multi_err::MultiErr`, specialised to `Diagnostic`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// `Ok(())` if nothing was collected, else `Err(self)` — the
    /// one-shot-build "fail with the aggregated diagnostics" policy of §7.
    pub fn into_result(self) -> Result<(), Self> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} error(s):", self.items.len())?;
        for (i, diag) in self.items.iter().enumerate() {
            writeln!(f, "  {}: {}", i, diag)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// The smallest edit distance between `a` and `b`, used for the
/// "did you mean" package-name suggestions attached to
/// `Diagnostic::ResolutionNotFound` (§2, supplemented feature).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for i in 1..=a.len() {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j - 1])
            };
            prev_diag = cur;
        }
    }

    row[b.len()]
}

/// Package names in `candidates` within Levenshtein distance 2 of `target`,
/// closest first. Used to populate `ResolutionNotFound::suggestions`.
pub fn suggest_similar<'a>(target: &str, candidates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|c| (levenshtein(target, c), c))
        .filter(|(dist, _)| *dist <= 2)
        .collect();
    scored.sort_by_key(|(dist, name)| (*dist, name.to_string()));
    scored.into_iter().map(|(_, name)| name.to_string()).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levenshtein_identical_strings_is_zero() {
        assert_eq!(levenshtein("react", "react"), 0);
    }

    #[test]
    fn levenshtein_catches_common_typo() {
        assert_eq!(levenshtein("raect", "react"), 2);
    }

    #[test]
    fn suggest_similar_filters_by_distance_and_sorts() {
        let candidates = vec!["react", "react-dom", "redux", "lodash"];
        let suggestions = suggest_similar("raect", candidates);
        assert_eq!(suggestions, vec!["react".to_string()]);
    }

    #[test]
    fn diagnostics_aggregates_and_reports_all() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::ResolutionNotFound {
            specifier: "missing-pkg".into(),
            importer: PathBuf::from("/p/main.js"),
            suggestions: vec![],
        });
        diags.push(Diagnostic::ConfigInvalid {
            message: "unknown key `outidr`".into(),
        });

        let err = diags.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
    }
}
