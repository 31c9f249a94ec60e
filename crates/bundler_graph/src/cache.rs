//! Content-addressed transform cache (§4.4 "a module is only re-transformed
//! when its content hash or the transform-options fingerprint changes").
//!
//! No teacher precedent (`good_fences` never cached a derived artifact);
//! grounded on the key shape, not the storage — a `dashmap::DashMap` keyed
//! by digest, the same concurrent-map choice the teacher's own
//! `ftree_cache` and `import_resolver` caches make for the same reason
//! (many worker threads reading/writing one cache during a parallel walk).

use std::path::Path;

use bundler_diag::Diagnostic;
use bundler_transform::{TransformOptions, TransformOutput};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey([u8; 32]);

/// Caches `bundler_transform::transform` output by `(source, filename
/// extension, options)` digest so unchanged modules skip re-parsing and
/// re-printing across incremental builds.
#[derive(Default)]
pub struct TransformCache {
    entries: DashMap<CacheKey, TransformOutput>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_transform(
        &self,
        source: &str,
        filename_hint: &str,
        options: &TransformOptions,
    ) -> Result<TransformOutput, Diagnostic> {
        let key = CacheKey(fingerprint(source, filename_hint, options));

        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }

        let output = bundler_transform::transform(source, filename_hint, options)?;
        self.entries.insert(key, output.clone());
        Ok(output)
    }
}

fn fingerprint(source: &str, filename_hint: &str, options: &TransformOptions) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);

    let ext = Path::new(filename_hint).extension().and_then(|e| e.to_str()).unwrap_or("");
    hasher.update(ext.as_bytes());
    hasher.update([0u8]);

    let mut define: Vec<(&String, &String)> = options.define.iter().collect();
    define.sort_by(|a, b| a.0.cmp(b.0));
    for (k, v) in define {
        hasher.update(k.as_bytes());
        hasher.update([0u8]);
        hasher.update(v.as_bytes());
        hasher.update([0u8]);
    }

    if let Some(src) = &options.jsx_import_source {
        hasher.update(src.as_bytes());
    }

    hasher.finalize().into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identical_inputs_share_a_cache_entry() {
        let cache = TransformCache::new();
        let options = TransformOptions::default();
        cache.get_or_transform("const x = 1;", "a.js", &options).unwrap();
        cache.get_or_transform("const x = 1;", "a.js", &options).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_options_fingerprint_separately() {
        let cache = TransformCache::new();
        let mut with_define = TransformOptions::default();
        with_define.define.insert("DEBUG".to_string(), "false".to_string());

        cache.get_or_transform("const x = DEBUG;", "a.js", &TransformOptions::default()).unwrap();
        cache.get_or_transform("const x = DEBUG;", "a.js", &with_define).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
