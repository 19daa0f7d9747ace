//! File protocol schema: a named rule set applied to one path or glob.

use super::Severity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::hash::{Hash, Hasher};

/// Opaque check definition as written in configuration, resolved to an
/// enforcer by the registry.
pub type RawCheck = Map<String, Json>;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
/// A protocol declaring how a repository file must look.
///
/// Identity is `name + repository_path + severity`; two protocols with the
/// same identity collapse into one when configurations are merged.
pub struct Protocol {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub repository_path: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub enforcers: Vec<RawCheck>,
}

fn default_required() -> bool {
    true
}

impl Protocol {
    pub fn new(name: impl Into<String>, repository_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            repository_path: repository_path.into(),
            required: true,
            tags: Vec::new(),
            severity: Severity::Error,
            enforcers: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_enforcer(mut self, check: RawCheck) -> Self {
        self.enforcers.push(check);
        self
    }

    /// Whether this protocol is selected by the requested tag filter.
    /// An empty filter selects everything.
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        filter.is_empty() || self.tags.iter().any(|t| filter.contains(t))
    }

    fn identity(&self) -> (&str, &str, Severity) {
        (&self.name, &self.repository_path, self.severity)
    }
}

impl PartialEq for Protocol {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Protocol {}

impl Hash for Protocol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
