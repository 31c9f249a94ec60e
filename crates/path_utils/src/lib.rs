use anyhow::{Context, Result};
use path_slash::PathExt;
use relative_path::RelativePathBuf;
use std::path::{Path, PathBuf};

/// Extension probe order for a bare module specifier with no extension,
/// preferring TypeScript sources over their compiled JS output so a resolver
/// walking a mixed `src`/`dist` tree picks up the source, not the artifact.
pub const EXTENSION_PROBE_ORDER: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs", ".json",
];

/// Index filenames probed, in order, when a specifier resolves to a directory.
pub const INDEX_FILE_PROBE_ORDER: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.mts",
    "index.cts",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
    "index.json",
];

/// Extensions the parser treats as TypeScript syntax (enables type-only
/// import/export stripping and the TS transform pass).
pub const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Extensions the parser parses with JSX enabled.
pub const JSX_EXTENSIONS: &[&str] = &["tsx", "jsx"];

fn extension_str(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// True if `path`'s extension is one of the TypeScript extensions.
pub fn is_typescript_path<P: AsRef<Path>>(path: P) -> bool {
    extension_str(path.as_ref())
        .map(|ext| TYPESCRIPT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// True if `path`'s extension calls for JSX parsing.
pub fn is_jsx_path<P: AsRef<Path>>(path: P) -> bool {
    extension_str(path.as_ref())
        .map(|ext| JSX_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Candidate file paths for a bare (extensionless) specifier, in probe order:
/// `base.ts`, `base.tsx`, ... per [`EXTENSION_PROBE_ORDER`].
pub fn candidate_extensions<P: AsRef<Path>>(base: P) -> Vec<PathBuf> {
    let base = base.as_ref();
    EXTENSION_PROBE_ORDER
        .iter()
        .map(|ext| {
            let mut s = base.as_os_str().to_owned();
            s.push(ext);
            PathBuf::from(s)
        })
        .collect()
}

/// Candidate index files for a directory, in probe order per
/// [`INDEX_FILE_PROBE_ORDER`].
pub fn candidate_index_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    INDEX_FILE_PROBE_ORDER.iter().map(|f| dir.join(f)).collect()
}

pub fn as_relative_slash_path<P: AsRef<Path>>(p: P) -> Result<RelativePathBuf> {
    let pref = p.as_ref();
    let relative_fence_path: RelativePathBuf =
        RelativePathBuf::from_path(pref).with_context(|| {
            let pref_str = pref.to_string_lossy();
            format!("failed to convert path to relative-path: \"{pref_str}\"")
        })?;
    let slashed_pbuf = PathBuf::from(relative_fence_path.as_str())
        .to_slash()
        .map(|s| s.to_string())
        .with_context(|| {
            let rel_fence_str = relative_fence_path.as_str();
            format!("failed to convert relative-path to a slashed path: \"{rel_fence_str}\"")
        })?;
    Ok(RelativePathBuf::from(slashed_pbuf))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn candidate_extensions_prefers_typescript() {
        let candidates = candidate_extensions("/repo/src/foo");
        assert_eq!(candidates[0], PathBuf::from("/repo/src/foo.ts"));
        assert_eq!(candidates[1], PathBuf::from("/repo/src/foo.tsx"));
        assert!(candidates.contains(&PathBuf::from("/repo/src/foo.js")));
    }

    #[test]
    fn candidate_index_files_are_dir_relative() {
        let candidates = candidate_index_files("/repo/src/foo");
        assert_eq!(candidates[0], PathBuf::from("/repo/src/foo/index.ts"));
        assert!(candidates.contains(&PathBuf::from("/repo/src/foo/index.js")));
    }

    #[test]
    fn typescript_and_jsx_classification() {
        assert!(is_typescript_path("a/b.ts"));
        assert!(is_typescript_path("a/b.tsx"));
        assert!(!is_typescript_path("a/b.js"));
        assert!(is_jsx_path("a/b.tsx"));
        assert!(is_jsx_path("a/b.jsx"));
        assert!(!is_jsx_path("a/b.ts"));
    }
}
