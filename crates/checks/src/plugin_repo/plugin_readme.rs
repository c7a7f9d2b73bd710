// Plugin Readme Check
// Validates the readme against the plugin header and the latest WordPress release

use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use plugin_check_core::application::{CheckError, StaticCheck};
use plugin_check_core::domain::{CheckContext, CheckResult, Finding, IgnoreList, PluginHeaders};

use crate::plugin_repo::readme::{Readme, ReadmeParser};
use crate::util::{major_minor, next_release, LicenseRules, VersionInfo};

/// Parser warnings dropped unless the caller overrides the list
pub const DEFAULT_IGNORED_README_WARNINGS: &[&str] = &["contributor_ignored"];

const README_NAMES: &[&str] = &["readme.txt", "readme.md"];
const DEFAULT_SHORT_DESCRIPTION: &str = "Here is a short description of the plugin.";
const DEFAULT_NAME: &str = "Plugin Name";

/// Placeholder usernames copied from readme templates
const RESTRICTED_CONTRIBUTORS: &[&str] = &[
    "username",
    "your-username",
    "your_username",
    "yourusername",
    "your-wordpress-org-username",
];

/// WordPress.org accounts that never author plugins
const RESERVED_CONTRIBUTORS: &[&str] = &["admin", "administrator", "root", "wordpress", "wordpressdotorg"];

pub struct PluginReadmeCheck {
    parser: ReadmeParser,
    licenses: LicenseRules,
    url: Regex,
    version_info: VersionInfo,
    ignored_warnings: IgnoreList,
}

impl PluginReadmeCheck {
    /// `ignored_warnings == None` keeps the default ignore list
    pub fn new(
        version_info: VersionInfo,
        ignored_warnings: Option<Vec<String>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            parser: ReadmeParser::new()?,
            licenses: LicenseRules::new()?,
            url: Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+[^\s]*$")?,
            version_info,
            ignored_warnings: IgnoreList::new(DEFAULT_IGNORED_README_WARNINGS.iter().copied())
                .with_overrides(ignored_warnings),
        })
    }

    fn check_name(&self, readme: &Readme, headers: &PluginHeaders, file: &str, result: &CheckResult) {
        if readme.name.is_empty() {
            result.add_finding(
                Finding::error(
                    "empty_plugin_name",
                    "The plugin name header in the readme is missing. Use \"=== Plugin Name ===\" as the first line.",
                )
                .in_file(file),
            );
            return;
        }

        if readme.name == DEFAULT_NAME {
            result.add_finding(
                Finding::error(
                    "invalid_plugin_name",
                    format!(
                        "Plugin name \"{}\" is not valid. Use the real name of your plugin in the readme.",
                        readme.name
                    ),
                )
                .in_file(file),
            );
            return;
        }

        if let Some(header_name) = headers.name() {
            if header_name != readme.name {
                result.add_finding(
                    Finding::warning(
                        "mismatched_plugin_name",
                        format!(
                            "Plugin name \"{}\" is different from the name declared in the plugin header \"{}\".",
                            readme.name, header_name
                        ),
                    )
                    .in_file(file),
                );
            }
        }
    }

    fn check_default_text(&self, readme: &Readme, file: &str, result: &CheckResult) {
        let uses_default = readme.short_description.contains(DEFAULT_SHORT_DESCRIPTION)
            || readme.tags.iter().any(|t| t == "tag1")
            || readme
                .donate_link()
                .map(|l| l.contains("example.com"))
                .unwrap_or(false);

        if uses_default {
            result.add_finding(
                Finding::error(
                    "default_readme_text",
                    "The readme appears to contain default text. Replace the placeholder content with details of your plugin.",
                )
                .in_file(file),
            );
        }
    }

    fn check_contributors(&self, readme: &Readme, file: &str, result: &CheckResult) {
        let matching = |names: &[&str]| -> Vec<String> {
            readme
                .contributors
                .iter()
                .filter(|c| names.iter().any(|n| c.eq_ignore_ascii_case(n)))
                .cloned()
                .collect()
        };

        let restricted = matching(RESTRICTED_CONTRIBUTORS);
        if !restricted.is_empty() {
            result.add_finding(
                Finding::error(
                    "readme_restricted_contributors",
                    format!(
                        "The \"Contributors\" header in the readme file contains restricted username(s). Found: \"{}\"",
                        restricted.join("\", \"")
                    ),
                )
                .in_file(file),
            );
        }

        let reserved = matching(RESERVED_CONTRIBUTORS);
        if !reserved.is_empty() {
            result.add_finding(
                Finding::warning(
                    "readme_reserved_contributors",
                    format!(
                        "The \"Contributors\" header in the readme file contains reserved username(s). Found: \"{}\"",
                        reserved.join("\", \"")
                    ),
                )
                .in_file(file),
            );
        }

        if !readme.invalid_contributors.is_empty() {
            result.add_finding(
                Finding::warning(
                    "readme_invalid_contributors",
                    "The \"Contributors\" header in the readme file must be a comma-separated list of WordPress.org-formatted usernames.",
                )
                .in_file(file),
            );
        }
    }

    fn check_donate_link(&self, readme: &Readme, file: &str, result: &CheckResult) {
        let Some(link) = readme.donate_link() else {
            return;
        };
        if !self.url.is_match(link) {
            result.add_finding(
                Finding::warning(
                    "readme_invalid_donate_link",
                    format!(
                        "The \"Donate link\" header in the readme file is not a valid URL: \"{}\"",
                        link
                    ),
                )
                .in_file(file),
            );
        }
    }

    fn check_stable_tag(&self, readme: &Readme, headers: &PluginHeaders, file: &str, result: &CheckResult) {
        let Some(stable_tag) = readme.stable_tag() else {
            result.add_finding(
                Finding::error("no_stable_tag", "Invalid or missing Stable Tag in the readme.")
                    .in_file(file),
            );
            return;
        };

        if stable_tag.eq_ignore_ascii_case("trunk") {
            result.add_finding(
                Finding::error(
                    "trunk_stable_tag",
                    "It's recommended not to use \"Stable Tag: trunk\".",
                )
                .in_file(file),
            );
            return;
        }

        if let Some(version) = headers.version() {
            if version != stable_tag {
                result.add_finding(
                    Finding::error(
                        "stable_tag_mismatch",
                        format!(
                            "Mismatched Stable Tag: {} != {}. The Stable Tag in the readme must match the plugin Version header.",
                            stable_tag, version
                        ),
                    )
                    .in_file(file),
                );
            }
        }
    }

    fn check_license(&self, readme: &Readme, headers: &PluginHeaders, file: &str, result: &CheckResult) {
        let Some(license) = readme.license() else {
            result.add_finding(
                Finding::error(
                    "no_license",
                    "Missing \"License\" in the readme. Please update it with a GPLv2 (or later) compatible license.",
                )
                .in_file(file),
            );
            return;
        };

        let normalized = self.licenses.normalize_license(license);
        let compatible =
            self.licenses.is_gpl_compatible(license) || self.licenses.is_gpl_compatible(&normalized);
        if !self.licenses.is_valid_license_identifier(license) || !compatible {
            result.add_finding(
                Finding::error(
                    "invalid_license",
                    format!(
                        "Invalid license specified: \"{}\". Please use a valid, GPLv2 (or later) compatible license identifier.",
                        license
                    ),
                )
                .in_file(file),
            );
        }

        if let Some(header_license) = headers.license() {
            if self.licenses.normalize_license(header_license) != normalized {
                result.add_finding(
                    Finding::error(
                        "license_mismatch",
                        format!(
                            "Your plugin has a different license declared in the readme ({}) and the plugin header ({}).",
                            license, header_license
                        ),
                    )
                    .in_file(file),
                );
            }
        }
    }

    fn check_tested_up_to(&self, readme: &Readme, file: &str, result: &CheckResult) {
        let Some(tested) = readme.tested.as_deref() else {
            return;
        };
        let (Some(tested_version), Some(latest)) = (
            major_minor(tested),
            self.version_info.latest_version().and_then(major_minor),
        ) else {
            return;
        };

        let stable = format!("{}.{}", latest.0, latest.1);
        if tested_version.cmp(&latest) == Ordering::Less {
            result.add_finding(
                Finding::error(
                    "outdated_tested_upto_header",
                    format!(
                        "Tested up to: {} < {}. The \"Tested up to\" value in your plugin is not set to the current version of WordPress.",
                        tested, stable
                    ),
                )
                .in_file(file),
            );
        } else if tested_version > next_release(latest) {
            result.add_finding(
                Finding::error(
                    "nonexistent_tested_upto_header",
                    format!(
                        "Tested up to: {}. This version of WordPress does not exist (yet).",
                        tested
                    ),
                )
                .in_file(file),
            );
        }
    }

    fn report_parser_warnings(&self, readme: &Readme, file: &str, result: &CheckResult) {
        for warning in &readme.warnings {
            if self.ignored_warnings.is_ignored(&warning.key) {
                debug!(warning = %warning.key, "Readme parser warning ignored");
                continue;
            }
            result.add_finding(
                Finding::warning(
                    format!("readme_parser_warnings_{}", warning.key),
                    warning.message.clone(),
                )
                .in_file(file),
            );
        }
    }
}

impl StaticCheck for PluginReadmeCheck {
    fn run(&self, context: &CheckContext, result: &CheckResult) -> Result<(), CheckError> {
        if context.is_single_file() {
            return Ok(());
        }

        let Some(readme_path) = find_readme(context) else {
            result.add_finding(
                Finding::error(
                    "no_plugin_readme",
                    "The plugin readme.txt does not exist.",
                )
                .in_file(README_NAMES[0]),
            );
            return Ok(());
        };

        let source =
            fs::read_to_string(&readme_path).map_err(|e| CheckError::io(&readme_path, e))?;
        let main_source = fs::read_to_string(context.main_file())
            .map_err(|e| CheckError::io(context.main_file(), e))?;
        let headers = PluginHeaders::parse(&main_source);

        let stable = self
            .version_info
            .stable_version()
            .unwrap_or_else(|| "trunk".to_string());
        let readme = self.parser.parse(
            &source,
            &stable,
            self.version_info.recommended_php_version(),
        );
        let file = context.relative_path(&readme_path);

        self.check_name(&readme, &headers, &file, result);
        self.check_default_text(&readme, &file, result);
        self.check_contributors(&readme, &file, result);
        self.check_donate_link(&readme, &file, result);
        self.check_stable_tag(&readme, &headers, &file, result);
        self.check_license(&readme, &headers, &file, result);
        self.check_tested_up_to(&readme, &file, result);
        self.report_parser_warnings(&readme, &file, result);
        Ok(())
    }
}

/// Root-level readme, `readme.txt` preferred, names matched case-insensitively
fn find_readme(context: &CheckContext) -> Option<PathBuf> {
    let root = context.plugin_root();
    README_NAMES.iter().find_map(|wanted| {
        context
            .files()
            .iter()
            .find(|f| f.parent() == Some(root) && file_name_is(f, wanted))
            .cloned()
    })
}

fn file_name_is(path: &Path, wanted: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}
