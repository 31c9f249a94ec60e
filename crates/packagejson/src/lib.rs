mod packagejson;
pub mod exported_path;

pub use crate::packagejson::{
    Browser, BrowserMap, PackageJson, PackageJsonExport, PackageJsonExports, SideEffects,
    StringOrBool,
};
pub use exported_path::ExportedPath;
