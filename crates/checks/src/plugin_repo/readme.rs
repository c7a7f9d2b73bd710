// Readme Reader
// Title, `Key: value` headers and short description of a plugin readme (txt or markdown)

use regex::Regex;
use std::collections::BTreeMap;

/// Short descriptions longer than this are trimmed
pub const SHORT_DESCRIPTION_MAX_CHARS: usize = 150;

/// Tags beyond this count are dropped
pub const MAX_TAGS: usize = 5;

/// Sections longer than this many words are trimmed
pub const SECTION_MAX_WORDS: usize = 2500;

/// Limit for the changelog and FAQ sections
pub const LONG_SECTION_MAX_WORDS: usize = 5000;

const IGNORED_TAGS: &[&str] = &["plugin", "wordpress"];

/// A readme problem the reader recovered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserWarning {
    pub key: String,
    pub message: String,
}

impl ParserWarning {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }

    fn section(section_key: &str, message: String) -> Self {
        Self::new(&format!("trimmed_section_{}", section_key), message)
    }
}

/// Normalized section key, `Frequently Asked Questions` -> `faq`
pub fn section_key(title: &str) -> String {
    let key = title.trim().to_lowercase().replace([' ', '-'], "_");
    match key.as_str() {
        "frequently_asked_questions" => "faq".to_string(),
        "change_log" => "changelog".to_string(),
        "screenshot" => "screenshots".to_string(),
        _ => key,
    }
}

/// Word limit before a section is trimmed
pub fn section_word_limit(key: &str) -> usize {
    match key {
        "changelog" | "faq" => LONG_SECTION_MAX_WORDS,
        _ => SECTION_MAX_WORDS,
    }
}

/// Parsed readme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readme {
    pub name: String,
    /// Raw header values keyed by lower-case header name
    pub headers: BTreeMap<String, String>,
    pub short_description: String,
    pub tags: Vec<String>,
    pub contributors: Vec<String>,
    /// Contributor entries that are not WordPress.org usernames
    pub invalid_contributors: Vec<String>,
    pub requires: Option<String>,
    pub tested: Option<String>,
    pub requires_php: Option<String>,
    /// Section keys in order of appearance (`description`, `faq`, ...)
    pub sections: Vec<String>,
    pub warnings: Vec<ParserWarning>,
}

impl Readme {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn stable_tag(&self) -> Option<&str> {
        self.header("stable tag")
    }

    pub fn license(&self) -> Option<&str> {
        self.header("license")
    }

    pub fn donate_link(&self) -> Option<&str> {
        self.header("donate link")
    }
}

/// Compiled readme patterns
pub struct ReadmeParser {
    title: Regex,
    header: Regex,
    section: Regex,
    wp_version: Regex,
    php_version: Regex,
    username: Regex,
}

impl ReadmeParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            title: Regex::new(r"^\s*(?:=+|#+)\s*(.*?)\s*[=#]*\s*$")?,
            header: Regex::new(r"^\s*\**\s*([A-Za-z][A-Za-z ]*?)\s*:\**\s*(.*?)\s*$")?,
            section: Regex::new(r"^\s*(?:==|##)(?:[^=#]|$)")?,
            wp_version: Regex::new(r"^\d+\.\d+(?:\.\d+)?$")?,
            php_version: Regex::new(r"^\d+(?:\.\d+){1,2}$")?,
            username: Regex::new(r"^[a-z0-9_\-.@]+$")?,
        })
    }

    /// Read a readme; the versions are quoted in version-header warnings
    pub fn parse(&self, source: &str, stable_version: &str, recommended_php: &str) -> Readme {
        let mut readme = Readme::default();
        let mut lines = source
            .lines()
            .map(|l| l.trim_start_matches('\u{feff}'))
            .skip_while(|l| l.trim().is_empty())
            .peekable();

        if let Some(first) = lines.peek() {
            if first.trim_start().starts_with('=') || first.trim_start().starts_with('#') {
                if let Some(caps) = self.title.captures(first) {
                    readme.name = caps[1].to_string();
                }
                lines.next();
            }
        }

        // Headers run until the first blank line after at least one header
        let mut first_section = None;
        let mut description = Vec::new();
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                if readme.headers.is_empty() {
                    continue;
                }
                break;
            }
            if self.section.is_match(line) {
                first_section = Some(line);
                break;
            }
            match self.header.captures(line) {
                Some(caps) => {
                    readme
                        .headers
                        .insert(caps[1].to_ascii_lowercase(), caps[2].to_string());
                }
                None => {
                    description.push(line.trim().to_string());
                    break;
                }
            }
        }

        // Short description is the first paragraph after the headers
        if first_section.is_none() && description.is_empty() {
            if let Some(line) = lines.by_ref().find(|l| !l.trim().is_empty()) {
                if self.section.is_match(line) {
                    first_section = Some(line);
                } else {
                    description.push(line.trim().to_string());
                }
            }
        }
        if first_section.is_none() && !description.is_empty() {
            for line in lines.by_ref() {
                if self.section.is_match(line) {
                    first_section = Some(line);
                    break;
                }
                if line.trim().is_empty() {
                    break;
                }
                description.push(line.trim().to_string());
            }
        }
        readme.short_description = description.join(" ");
        if readme.short_description.chars().count() > SHORT_DESCRIPTION_MAX_CHARS {
            readme.short_description = readme
                .short_description
                .chars()
                .take(SHORT_DESCRIPTION_MAX_CHARS)
                .collect();
            readme.warnings.push(ParserWarning::new(
                "trimmed_short_description",
                format!(
                    "The \"Short Description\" section is too long and was truncated. A maximum of {} characters is supported.",
                    SHORT_DESCRIPTION_MAX_CHARS
                ),
            ));
        }

        self.read_tags(&mut readme);
        self.read_contributors(&mut readme);
        self.read_versions(&mut readme, stable_version, recommended_php);
        self.read_sections(&mut readme, first_section, lines);
        readme
    }

    fn read_sections<'a>(
        &self,
        readme: &mut Readme,
        first: Option<&'a str>,
        rest: impl Iterator<Item = &'a str>,
    ) {
        let mut sections: Vec<(String, usize)> = Vec::new();
        let mut current = first.and_then(|line| self.section_title(line));
        let mut words = 0;

        for line in rest {
            if self.section.is_match(line) {
                if let Some(title) = current.take() {
                    sections.push((title, words));
                }
                current = self.section_title(line);
                words = 0;
            } else if current.is_some() {
                words += line.split_whitespace().count();
            }
        }
        if let Some(title) = current {
            sections.push((title, words));
        }

        for (title, words) in sections {
            let key = section_key(&title);
            let limit = section_word_limit(&key);
            if words > limit {
                readme.warnings.push(ParserWarning::section(
                    &key,
                    format!(
                        "The \"{}\" section is too long and was truncated. A maximum of {} words is supported.",
                        title, limit
                    ),
                ));
            }
            readme.sections.push(key);
        }
    }

    fn section_title(&self, line: &str) -> Option<String> {
        self.title
            .captures(line)
            .map(|caps| caps[1].to_string())
            .filter(|t| !t.is_empty())
    }

    fn read_tags(&self, readme: &mut Readme) {
        let Some(raw) = readme.headers.get("tags") else {
            return;
        };
        let mut tags: Vec<String> = raw
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let ignored: Vec<String> = tags
            .iter()
            .filter(|t| IGNORED_TAGS.contains(&t.as_str()))
            .cloned()
            .collect();
        if !ignored.is_empty() {
            tags.retain(|t| !IGNORED_TAGS.contains(&t.as_str()));
            readme.warnings.push(ParserWarning::new(
                "ignored_tags",
                format!(
                    "One or more tags were ignored. Please remove the following tags: {}",
                    ignored.join(", ")
                ),
            ));
        }

        if tags.len() > MAX_TAGS {
            tags.truncate(MAX_TAGS);
            readme.warnings.push(ParserWarning::new(
                "too_many_tags",
                format!(
                    "One or more tags were ignored. Please limit your plugin to {} tags.",
                    MAX_TAGS
                ),
            ));
        }
        readme.tags = tags;
    }

    fn read_contributors(&self, readme: &mut Readme) {
        let Some(raw) = readme.headers.get("contributors") else {
            return;
        };
        let (valid, invalid): (Vec<String>, Vec<String>) = raw
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .partition(|c| self.username.is_match(c));

        if !invalid.is_empty() {
            readme.warnings.push(ParserWarning::new(
                "contributor_ignored",
                format!(
                    "One or more contributors listed were ignored. The \"Contributors\" field should only contain WordPress.org usernames: {}",
                    invalid.join(", ")
                ),
            ));
        }
        readme.contributors = valid;
        readme.invalid_contributors = invalid;
    }

    fn read_versions(&self, readme: &mut Readme, stable_version: &str, recommended_php: &str) {
        if let Some(tested) = readme.headers.get("tested up to") {
            if self.wp_version.is_match(tested) {
                readme.tested = Some(tested.clone());
            } else {
                readme.warnings.push(ParserWarning::new(
                    "tested_header_ignored",
                    format!(
                        "The \"Tested up to\" field was ignored. This field should only contain a valid WordPress version such as \"{}\".",
                        stable_version
                    ),
                ));
            }
        }

        if let Some(requires) = readme.headers.get("requires at least") {
            if self.wp_version.is_match(requires) {
                readme.requires = Some(requires.clone());
            } else {
                readme.warnings.push(ParserWarning::new(
                    "requires_header_ignored",
                    format!(
                        "The \"Requires at least\" field was ignored. This field should only contain a valid WordPress version such as \"{}\".",
                        stable_version
                    ),
                ));
            }
        }

        if let Some(php) = readme.headers.get("requires php") {
            if self.php_version.is_match(php) {
                readme.requires_php = Some(php.clone());
            } else {
                readme.warnings.push(ParserWarning::new(
                    "requires_php_header_ignored",
                    format!(
                        "The \"Requires PHP\" field was ignored. This field should only contain a PHP version such as \"{}\".",
                        recommended_php
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const README: &str = "=== Test Plugin ===
Contributors: wordpressdotorg, plugin-team
Tags: performance, testing
Requires at least: 6.0
Tested up to: 6.7
Requires PHP: 7.4
Stable tag: 1.0.0
License: GPLv2 or later
License URI: https://www.gnu.org/licenses/gpl-2.0.html

Checks plugins for common problems.

== Description ==

Longer text.
";

    fn keys(readme: &Readme) -> Vec<&str> {
        readme.warnings.iter().map(|w| w.key.as_str()).collect()
    }

    #[test]
    fn test_parse_valid_readme() {
        let parser = ReadmeParser::new().unwrap();
        let readme = parser.parse(README, "6.7", "7.4");

        assert_eq!(readme.name, "Test Plugin");
        assert_eq!(readme.stable_tag(), Some("1.0.0"));
        assert_eq!(readme.license(), Some("GPLv2 or later"));
        assert_eq!(readme.tested.as_deref(), Some("6.7"));
        assert_eq!(readme.requires_php.as_deref(), Some("7.4"));
        assert_eq!(readme.tags, vec!["performance", "testing"]);
        assert_eq!(readme.contributors.len(), 2);
        assert_eq!(readme.short_description, "Checks plugins for common problems.");
        assert!(readme.warnings.is_empty());
    }

    #[test]
    fn test_parse_markdown_readme() {
        let source = "# Markdown Plugin #
**Stable tag:** trunk
**License:** MIT

Short text.

## Description ##
";
        let readme = ReadmeParser::new().unwrap().parse(source, "6.7", "7.4");
        assert_eq!(readme.name, "Markdown Plugin");
        assert_eq!(readme.stable_tag(), Some("trunk"));
        assert_eq!(readme.license(), Some("MIT"));
        assert_eq!(readme.short_description, "Short text.");
    }

    #[test]
    fn test_missing_title_leaves_name_empty() {
        let readme = ReadmeParser::new()
            .unwrap()
            .parse("Stable tag: 1.0\n\nShort.\n", "6.7", "7.4");
        assert!(readme.name.is_empty());
        assert_eq!(readme.stable_tag(), Some("1.0"));
    }

    #[test]
    fn test_invalid_version_headers_are_ignored() {
        let source = "=== Plugin ===
Requires at least: latest
Tested up to: WordPress 6.1
Requires PHP: seven

Short.
";
        let readme = ReadmeParser::new().unwrap().parse(source, "5.0", "8.1");
        assert_eq!(
            keys(&readme),
            vec![
                "tested_header_ignored",
                "requires_header_ignored",
                "requires_php_header_ignored"
            ]
        );
        assert!(readme.tested.is_none());
        assert!(readme.warnings[0].message.contains("such as \"5.0\""));
        assert!(readme.warnings[2].message.contains("such as \"8.1\""));
    }

    #[test]
    fn test_tag_and_contributor_warnings() {
        let source = "=== Plugin ===
Contributors: good-user, Bad User!
Tags: plugin, one, two, three, four, five, six

Short.
";
        let readme = ReadmeParser::new().unwrap().parse(source, "6.7", "7.4");
        assert_eq!(
            keys(&readme),
            vec!["ignored_tags", "too_many_tags", "contributor_ignored"]
        );
        assert_eq!(readme.tags.len(), MAX_TAGS);
        assert_eq!(readme.contributors, vec!["good-user"]);
        assert_eq!(readme.invalid_contributors, vec!["Bad User!"]);
    }

    #[test]
    fn test_long_short_description_is_trimmed() {
        let source = format!("=== Plugin ===\nStable tag: 1.0\n\n{}\n", "a".repeat(200));
        let readme = ReadmeParser::new().unwrap().parse(&source, "6.7", "7.4");
        assert_eq!(readme.short_description.len(), SHORT_DESCRIPTION_MAX_CHARS);
        assert_eq!(keys(&readme), vec!["trimmed_short_description"]);
    }

    #[test]
    fn test_sections_are_recorded() {
        let readme = ReadmeParser::new().unwrap().parse(README, "6.7", "7.4");
        assert_eq!(readme.sections, vec!["description"]);

        let source = "## Plugin ##
**Stable tag:** 1.0

## Frequently Asked Questions ##
### Why? ###
Because.

## Change Log ##
";
        let readme = ReadmeParser::new().unwrap().parse(source, "6.7", "7.4");
        assert_eq!(readme.sections, vec!["faq", "changelog"]);
        assert!(readme.short_description.is_empty());
    }

    #[test]
    fn test_long_sections_are_trimmed() {
        let source = format!(
            "=== Plugin ===\nStable tag: 1.0\n\nShort.\n\n== Description ==\n{}\n\n== Changelog ==\n{}\n",
            "word ".repeat(SECTION_MAX_WORDS),
            "= 1.0 =\n* change\n".repeat(LONG_SECTION_MAX_WORDS / 2)
        );
        let readme = ReadmeParser::new().unwrap().parse(&source, "6.7", "7.4");
        assert_eq!(keys(&readme), vec!["trimmed_section_changelog"]);
        assert!(readme.warnings[0].message.contains("\"Changelog\" section"));
        assert!(readme.warnings[0].message.contains("5000 words"));
    }
}
