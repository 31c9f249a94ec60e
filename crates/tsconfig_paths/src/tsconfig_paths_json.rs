use crate::error::OpenTsConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::vec::Vec;

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TsconfigPathsJson {
    pub compiler_options: TsconfigPathsCompilerOptions,
}

impl TsconfigPathsJson {
    // Reads and parses the tsconfig.json at the provided path
    pub fn from_path(tsconfig_path: &str) -> Result<Self, OpenTsConfigError> {
        let file = match File::open(tsconfig_path) {
            Ok(f) => f,
            Err(err) => return Err(OpenTsConfigError::IOError(err)),
        };
        let buf_reader = BufReader::new(file);
        let tsconfig_paths_json: TsconfigPathsJson = match serde_json::from_reader(buf_reader) {
            Ok(tsconfig) => tsconfig,
            Err(e) => return Err(OpenTsConfigError::SerdeError(e)),
        };
        Ok(tsconfig_paths_json)
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TsconfigPathsCompilerOptions {
    pub base_url: Option<String>,
    pub paths: HashMap<String, Vec<String>>,
}

impl TsconfigPathsCompilerOptions {
    /// Merges config-level `alias` entries (simple specifier -> single target
    /// string, as `bundler_config::BuildConfig::alias` carries them) into the
    /// tsconfig-style `paths` map, so a single resolver pass can walk one
    /// pattern table for both.
    ///
    /// An `alias` entry for a specifier already present in `paths` overrides
    /// it: an explicit `--alias` flag is a more specific, later-applied
    /// override than whatever the project's tsconfig.json says.
    pub fn merged_paths(&self, alias: &HashMap<String, String>) -> HashMap<String, Vec<String>> {
        let mut merged = self.paths.clone();
        for (from, to) in alias {
            merged.insert(from.clone(), vec![to.clone()]);
        }
        merged
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merged_paths_adds_new_alias_entries() {
        let opts = TsconfigPathsCompilerOptions {
            base_url: Some(".".to_string()),
            paths: HashMap::from([("@app/*".to_string(), vec!["src/*".to_string()])]),
        };
        let alias = HashMap::from([("react".to_string(), "preact/compat".to_string())]);
        let merged = opts.merged_paths(&alias);
        assert_eq!(merged.get("@app/*"), Some(&vec!["src/*".to_string()]));
        assert_eq!(
            merged.get("react"),
            Some(&vec!["preact/compat".to_string()])
        );
    }

    #[test]
    fn merged_paths_alias_overrides_tsconfig_paths() {
        let opts = TsconfigPathsCompilerOptions {
            base_url: Some(".".to_string()),
            paths: HashMap::from([("@app/*".to_string(), vec!["src/*".to_string()])]),
        };
        let alias = HashMap::from([("@app/*".to_string(), "shared/*".to_string())]);
        let merged = opts.merged_paths(&alias);
        assert_eq!(merged.get("@app/*"), Some(&vec!["shared/*".to_string()]));
    }
}
