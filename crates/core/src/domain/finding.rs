// Finding Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Severity of a reported finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Severity::Error),
            "WARNING" => Ok(Severity::Warning),
            _ => Err(DomainError::InvalidSeverity(s.to_string())),
        }
    }
}

/// One reported issue.
///
/// `line` and `column` are 1-based; 0 means "not applicable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Finding {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            file: String::new(),
            line: 0,
            column: 0,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Set the plugin-relative file the finding belongs to
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!(" WARNING ".parse::<Severity>().unwrap(), Severity::Warning);
    }

    #[test]
    fn test_severity_parse_rejects_unknown() {
        let err = "fatal".parse::<Severity>().unwrap_err();
        assert_eq!(err, DomainError::InvalidSeverity("fatal".to_string()));
    }

    #[test]
    fn test_builder_defaults_to_no_location() {
        let finding = Finding::warning("code", "message").in_file("load.php");
        assert_eq!(finding.line, 0);
        assert_eq!(finding.column, 0);
        assert_eq!(finding.file, "load.php");
        assert!(!finding.is_error());
    }
}
