// WordPress version helpers

use serde::Deserialize;

/// PHP version suggested when no PHP check data is available
pub const RECOMMENDED_PHP_FALLBACK: &str = "7.4";

/// Latest-release information from the version-check API offer
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub current: Option<String>,
    /// From the PHP check API, never part of the offer
    #[serde(skip)]
    pub recommended_php: Option<String>,
}

#[derive(Deserialize)]
struct VersionCheckResponse {
    #[serde(default)]
    offers: Vec<VersionInfo>,
}

impl VersionInfo {
    pub fn with_current(current: impl Into<String>) -> Self {
        Self {
            current: Some(current.into()),
            ..Default::default()
        }
    }

    /// Parse a version-check response body; the first offer wins
    pub fn from_version_check(body: &str) -> Result<Self, serde_json::Error> {
        let response: VersionCheckResponse = serde_json::from_str(body)?;
        Ok(response.offers.into_iter().next().unwrap_or_default())
    }

    pub fn latest_version(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Latest version reduced to `major.minor`
    pub fn stable_version(&self) -> Option<String> {
        self.current.as_deref().map(stable_version)
    }

    pub fn with_recommended_php(mut self, version: Option<String>) -> Self {
        self.recommended_php = version.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn recommended_php_version(&self) -> &str {
        self.recommended_php
            .as_deref()
            .unwrap_or(RECOMMENDED_PHP_FALLBACK)
    }
}

/// Strip pre-release suffixes and patch level: `6.7.1-RC1` -> `6.7`
pub fn stable_version(version: &str) -> String {
    let base = version.split('-').next().unwrap_or(version);
    match major_minor(base) {
        Some((major, minor)) => format!("{}.{}", major, minor),
        None => base.to_string(),
    }
}

/// `major.minor` of a dotted version, missing minor counts as 0
pub fn major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(part) => {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()?
        }
        None => 0,
    };
    Some((major, minor))
}

/// Release following `major.minor` (`5.9` -> `6.0`, `6.7` -> `6.8`)
pub fn next_release((major, minor): (u32, u32)) -> (u32, u32) {
    if minor >= 9 {
        (major + 1, 0)
    } else {
        (major, minor + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_CHECK_BODY: &str = r#"{
        "offers": [{
            "response": "upgrade",
            "download": "https://downloads.wordpress.org/release/wordpress-6.7.1.zip",
            "locale": "en_US",
            "current": "6.7.1",
            "version": "6.7.1",
            "php_version": "7.2.24",
            "mysql_version": "5.5.5",
            "new_bundled": "6.7",
            "partial_version": false
        }]
    }"#;

    #[test]
    fn test_version_info_from_offer() {
        let info = VersionInfo::from_version_check(VERSION_CHECK_BODY).unwrap();
        assert_eq!(info.latest_version(), Some("6.7.1"));
        assert_eq!(info.stable_version().as_deref(), Some("6.7"));
        assert_eq!(info.recommended_php_version(), RECOMMENDED_PHP_FALLBACK);
    }

    #[test]
    fn test_missing_offer_falls_back() {
        let info = VersionInfo::from_version_check(r#"{"offers": []}"#).unwrap();
        assert_eq!(info.latest_version(), None);
    }

    #[test]
    fn test_recommended_php_overrides_fallback() {
        let info = VersionInfo::with_current("6.7").with_recommended_php(Some("8.1".to_string()));
        assert_eq!(info.recommended_php_version(), "8.1");

        let blank = VersionInfo::with_current("6.7").with_recommended_php(Some(" ".to_string()));
        assert_eq!(blank.recommended_php_version(), "7.4");
    }

    #[test]
    fn test_stable_version_strips_suffix_and_patch() {
        assert_eq!(stable_version("6.7.1-RC1"), "6.7");
        assert_eq!(stable_version("6.7"), "6.7");
        assert_eq!(stable_version("6.10.2"), "6.10");
        assert_eq!(stable_version("trunk"), "trunk");
    }

    #[test]
    fn test_next_release_rolls_major() {
        assert_eq!(next_release((5, 9)), (6, 0));
        assert_eq!(next_release((6, 0)), (6, 1));
    }
}
