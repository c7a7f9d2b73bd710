// Stateless helpers shared by checks

pub mod license;
pub mod location;
pub mod version;

pub use license::LicenseRules;
pub use location::{is_plugin_file, plugin_location};
pub use version::{
    major_minor, next_release, stable_version, VersionInfo, RECOMMENDED_PHP_FALLBACK,
};
