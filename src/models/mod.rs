//! Shared data models for configuration documents and verdict messages.

pub mod configuration;
pub mod protocol;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Severity attached to a protocol and to every message it produces.
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Severity::Error),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            other => Err(format!(
                "unknown severity [{other}], expected one of ERROR, WARNING, INFO"
            )),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
/// A single scan message tied to a repository path.
///
/// Ordering puts more severe messages first for the same path.
pub struct MessageDescriptor {
    pub path: String,
    pub severity: Severity,
    pub text: String,
}

impl MessageDescriptor {
    pub fn new(path: impl Into<String>, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            severity,
            text: text.into(),
        }
    }
}

impl fmt::Display for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} :: {}", self.severity, self.path, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
/// What a fix message reports.
pub enum FixKind {
    Error,
    Applied,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
/// A single fix message tied to a repository path.
pub struct FixMessage {
    pub path: String,
    pub kind: FixKind,
    pub text: String,
}

impl FixMessage {
    pub fn new(path: impl Into<String>, kind: FixKind, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for FixMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.path, self.text)
    }
}
