// License helpers
// Normalization collapses the many spellings of a license into one comparable token

use regex::Regex;

/// Compiled license patterns
pub struct LicenseRules {
    gnu_gpl: Regex,
    or_later: Regex,
    only: Regex,
    version_word: Regex,
    separators: Regex,
    gplv: Regex,
    gpl_major: Regex,
    identifier: Regex,
    gpl_compatible: Regex,
}

impl LicenseRules {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            gnu_gpl: Regex::new(r"(?i)GNU General Public License(\s*\(GPL\))?")?,
            or_later: Regex::new(r"(?i)[\s-]*or[\s-]*later")?,
            only: Regex::new(r"(?i)-only")?,
            version_word: Regex::new(r"(?i)version")?,
            separators: Regex::new(r"[\s+.\-]")?,
            gplv: Regex::new(r"^GPLV")?,
            gpl_major: Regex::new(r"^GPL([23])0?$")?,
            identifier: Regex::new(r"(?i)^[a-z0-9\-+.]+(\sor\s[a-z0-9\-+.]+)*$")?,
            gpl_compatible: Regex::new(
                r"(?i)GPL|GNU|MIT|FreeBSD|New BSD|BSD-3-Clause|BSD 3 Clause|OpenLDAP|Expat|Apache|MPL20|Public Domain|Unlicense|ISC|CC0|Zlib|Artistic",
            )?,
        })
    }

    /// `GPL v2 or later`, `GPL-2.0+`, `GNU General Public License (GPL) 2.0` -> `GPL2`
    pub fn normalize_license(&self, license: &str) -> String {
        let license = self.gnu_gpl.replace_all(license.trim(), "GPL");
        let license = self.or_later.replace_all(&license, "");
        let license = self.only.replace_all(&license, "");
        let license = self.version_word.replace_all(&license, "");
        let license = self.separators.replace_all(&license, "").to_uppercase();
        let license = self.gplv.replace(&license, "GPL");
        self.gpl_major.replace(&license, "GPL$1").into_owned()
    }

    /// SPDX-like identifier, optionally combined with ` or `
    pub fn is_valid_license_identifier(&self, license: &str) -> bool {
        self.identifier.is_match(license.trim())
    }

    pub fn is_gpl_compatible(&self, license: &str) -> bool {
        self.gpl_compatible.is_match(license)
    }
}
