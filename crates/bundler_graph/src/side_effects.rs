//! Nearest-package `sideEffects` lookup, used to seed each module's
//! side-effect flag for `bundler_shake`'s reachability walk.
//!
//! Grounded on `import_resolver::contract`'s private `nearest_package_descriptor`
//! (same upward walk for the nearest `package.json`), paired with the
//! teacher-adjacent `packagejson::PackageJson::module_has_side_effects`.

use std::fs::File;
use std::io::BufReader;

use abspath::AbsPath;
use packagejson::PackageJson;

/// `true` when no ancestor `package.json` is found, or when the nearest one
/// marks `path` as side-effectful (absent field means "has side effects").
pub(crate) fn has_side_effects(path: &AbsPath) -> bool {
    let Some(mut dir) = path.as_path().parent() else {
        return true;
    };

    loop {
        let candidate = dir.join("package.json");
        if candidate.is_file() {
            return File::open(&candidate)
                .ok()
                .and_then(|f| serde_json::from_reader::<_, PackageJson>(BufReader::new(f)).ok())
                .map(|pkg| {
                    let relative = path.as_path().strip_prefix(dir).unwrap_or(path.as_path());
                    pkg.module_has_side_effects(&relative.to_string_lossy())
                })
                .unwrap_or(true);
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_to_has_side_effects_without_a_package_json() {
        let tmp = test_tmpdir::test_tmpdir!("src/index.js" => "console.log(1);");
        let path = AbsPath::from_absolute(tmp.root().join("src/index.js")).unwrap();
        assert!(has_side_effects(&path));
    }

    #[test]
    fn honors_side_effects_false() {
        let tmp = test_tmpdir::test_tmpdir!(
            "package.json" => r#"{"sideEffects": false}"#,
            "src/index.js" => "console.log(1);"
        );
        let path = AbsPath::from_absolute(tmp.root().join("src/index.js")).unwrap();
        assert!(!has_side_effects(&path));
    }

    #[test]
    fn honors_side_effects_globs() {
        let tmp = test_tmpdir::test_tmpdir!(
            "package.json" => r#"{"sideEffects": ["*.css"]}"#,
            "src/style.css" => "body {}",
            "src/index.js" => "console.log(1);"
        );
        let css = AbsPath::from_absolute(tmp.root().join("src/style.css")).unwrap();
        let js = AbsPath::from_absolute(tmp.root().join("src/index.js")).unwrap();
        assert!(has_side_effects(&css));
        assert!(!has_side_effects(&js));
    }
}
