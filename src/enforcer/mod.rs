//! Enforcer plugin contract.
//!
//! Every enforcer checks file content; some can also resolve violations by
//! producing new content. Concrete enforcers are collected in the
//! [`FileEnforcer`] tagged union and built from raw checks by the
//! [`registry`].

pub mod common;
pub mod json;
mod params;
pub mod properties;
pub mod registry;

use std::collections::BTreeSet;
use std::fmt;

pub use common::{
    Contains, ContainsLine, ContainsLineAt, ContentEquals, ContentNotEquals, NotContains,
};
pub use json::JsonValueEquals;
pub use properties::StringPropertyEquals;
pub use registry::{EnforcerRegistry, ENFORCER_KEY};

/// Line terminator of `content`: `\r\n` when the file uses it, else `\n`.
pub(crate) fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Re-join lines with the terminator of `original`, keeping a final
/// terminator when `original` had one.
pub(crate) fn rejoin<S: AsRef<str>>(lines: &[S], original: &str) -> String {
    let ending = line_ending(original);
    let mut out = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<&str>>()
        .join(ending);
    if original.ends_with('\n') {
        out.push_str(ending);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of checking one file.
pub struct CheckOutcome {
    pub passed: bool,
    pub messages: Vec<String>,
}

impl CheckOutcome {
    pub fn passed() -> Self {
        Self {
            passed: true,
            messages: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::failed_with(vec![message.into()])
    }

    pub fn failed_with(messages: Vec<String>) -> Self {
        Self {
            passed: false,
            messages,
        }
    }

    /// Passed exactly when no violation messages were collected.
    pub fn from_messages(messages: Vec<String>) -> Self {
        Self {
            passed: messages.is_empty(),
            messages,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Result of resolving one file.
///
/// Applied fixes and errors are kept apart so callers can tell them apart
/// after several resolutions were combined.
pub struct FixOutcome {
    fixes: BTreeSet<String>,
    errors: BTreeSet<String>,
    error: bool,
}

impl FixOutcome {
    /// Nothing to change.
    pub fn no_updates() -> Self {
        Self::default()
    }

    pub fn updated(message: impl Into<String>) -> Self {
        Self {
            fixes: BTreeSet::from([message.into()]),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            errors: BTreeSet::from([message.into()]),
            error: true,
            ..Self::default()
        }
    }

    /// Seed for folding several resolutions of one file: the combined
    /// outcome is an error only if every part was.
    pub fn fold_seed() -> Self {
        Self {
            error: true,
            ..Self::default()
        }
    }

    pub fn combine(mut self, other: Self) -> Self {
        self.fixes.extend(other.fixes);
        self.errors.extend(other.errors);
        self.error = self.error && other.error;
        self
    }

    pub fn changed(&self) -> bool {
        !self.fixes.is_empty()
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn fix_count(&self) -> usize {
        self.fixes.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn fixes(&self) -> &BTreeSet<String> {
        &self.fixes
    }

    pub fn errors(&self) -> &BTreeSet<String> {
        &self.errors
    }

    pub fn messages(&self) -> BTreeSet<&str> {
        self.fixes
            .iter()
            .chain(self.errors.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Checks file content.
pub trait Enforcer: fmt::Debug + Send + Sync {
    fn check(&self, content: &str) -> CheckOutcome;
}

/// Rewrites file content so it satisfies the enforcer.
///
/// Returns the new content only when something changed.
pub trait Fixable: Enforcer {
    fn fix(&self, content: &str) -> (Option<String>, FixOutcome);
}

#[derive(Debug, Clone, PartialEq)]
/// All enforcers known to the registry.
pub enum FileEnforcer {
    Contains(Contains),
    NotContains(NotContains),
    ContainsLine(ContainsLine),
    ContainsLineAt(ContainsLineAt),
    ContentEquals(ContentEquals),
    ContentNotEquals(ContentNotEquals),
    StringPropertyEquals(StringPropertyEquals),
    JsonValueEquals(JsonValueEquals),
}

impl FileEnforcer {
    /// Alias used as discriminator in configuration documents.
    pub fn alias(&self) -> &'static str {
        match self {
            FileEnforcer::Contains(_) => "contains",
            FileEnforcer::NotContains(_) => "not-contains",
            FileEnforcer::ContainsLine(_) => "contains-line",
            FileEnforcer::ContainsLineAt(_) => "contains-line-at",
            FileEnforcer::ContentEquals(_) => "content-equals",
            FileEnforcer::ContentNotEquals(_) => "content-not-equals",
            FileEnforcer::StringPropertyEquals(_) => "string-property-equals",
            FileEnforcer::JsonValueEquals(_) => "json-value-equals",
        }
    }

    pub fn as_enforcer(&self) -> &dyn Enforcer {
        match self {
            FileEnforcer::Contains(e) => e,
            FileEnforcer::NotContains(e) => e,
            FileEnforcer::ContainsLine(e) => e,
            FileEnforcer::ContainsLineAt(e) => e,
            FileEnforcer::ContentEquals(e) => e,
            FileEnforcer::ContentNotEquals(e) => e,
            FileEnforcer::StringPropertyEquals(e) => e,
            FileEnforcer::JsonValueEquals(e) => e,
        }
    }

    /// Capability query; never fails.
    pub fn as_fixable(&self) -> Option<&dyn Fixable> {
        match self {
            FileEnforcer::ContainsLineAt(e) => Some(e),
            FileEnforcer::ContentEquals(e) => Some(e),
            FileEnforcer::StringPropertyEquals(e) => Some(e),
            FileEnforcer::JsonValueEquals(e) => Some(e),
            _ => None,
        }
    }

    pub fn check(&self, content: &str) -> CheckOutcome {
        self.as_enforcer().check(content)
    }

    /// Parameter checks serde cannot express.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            FileEnforcer::Contains(e) => regex::Regex::new(&e.expected_substring)
                .map(|_| ())
                .map_err(|err| format!("expected-substring is not a valid pattern: {err}")),
            FileEnforcer::ContainsLineAt(e) if e.expected_line_number == 0 => {
                Err("expected-line-number must be at least 1".to_string())
            }
            FileEnforcer::JsonValueEquals(e) if e.expectations.is_empty() => {
                Err("expectations must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

macro_rules! impl_from_enforcer {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for FileEnforcer {
                fn from(value: $variant) -> Self {
                    FileEnforcer::$variant(value)
                }
            }
        )*
    };
}

impl_from_enforcer!(
    Contains,
    NotContains,
    ContainsLine,
    ContainsLineAt,
    ContentEquals,
    ContentNotEquals,
    StringPropertyEquals,
    JsonValueEquals,
);
