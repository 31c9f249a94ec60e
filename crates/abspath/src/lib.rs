use path_clean::PathClean;
use std::{
    fmt,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Base path is not absolute")]
    BasePathNotAbsolute,
}

pub fn join_abspath(base: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let base = base.as_ref();
    let path = path.as_ref();
    if !base.is_absolute() {
        return Err(Error::BasePathNotAbsolute);
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path).to_path_buf()
    }
    .clean();

    Ok(absolute_path)
}

/// A cleaned, absolute filesystem path.
///
/// This is the Module key named in the data model: exactly one `Module`
/// exists per `AbsPath` within a build, and every edge/chunk/manifest entry
/// addresses modules through this type rather than a raw `PathBuf` so the
/// "must be absolute" invariant can't be forgotten at a call site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Cleans and wraps `path`. Does not touch the filesystem: a non-existent
    /// path is a perfectly valid `AbsPath` (resolution failure is reported
    /// separately, by the resolver).
    pub fn new(base: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self, Error> {
        join_abspath(base, path).map(AbsPath)
    }

    /// Wraps a path already known to be absolute, cleaning it.
    pub fn from_absolute(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(Error::BasePathNotAbsolute);
        }
        Ok(AbsPath(path.clean()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn parent(&self) -> Option<AbsPath> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> AbsPath {
        AbsPath(self.0.join(rel).clean())
    }
}

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
