// Plugin directory requirements

pub mod plugin_readme;
pub mod readme;

pub use plugin_readme::{PluginReadmeCheck, DEFAULT_IGNORED_README_WARNINGS};
pub use readme::{ParserWarning, Readme, ReadmeParser};
