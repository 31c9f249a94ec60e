pub mod pkgname;
pub mod to_absolute_path;

pub use pkgname::{package_name, split_package_import};
pub use to_absolute_path::to_absolute_path;
