//! Verdict algebra shared by the scan and fix executors.
//!
//! Both verdicts have an identity (`empty`) and an associative, commutative
//! `combine`, so per-file outcomes can be folded in any order or in parallel.
//! Messages are sets keyed by path; counts are derived from the distinct
//! messages, which keeps a redundant outcome from being counted twice.

use crate::enforcer::{CheckOutcome, FixOutcome};
use crate::models::{FixKind, FixMessage, MessageDescriptor, Severity};
use std::collections::{BTreeMap, BTreeSet};

/// Path used for outcomes not tied to a repository file.
pub const GLOBAL_PATH: &str = "GLOBAL";

fn merge_sets<T: Ord>(
    mut into: BTreeMap<String, BTreeSet<T>>,
    from: BTreeMap<String, BTreeSet<T>>,
) -> BTreeMap<String, BTreeSet<T>> {
    for (path, set) in from {
        into.entry(path).or_default().extend(set);
    }
    into
}

/// Whether a failing outcome at `severity` fails the whole scan.
pub fn severity_fails(severity: Severity, fail_on_warnings: bool) -> bool {
    match severity {
        Severity::Error => true,
        Severity::Warning => fail_on_warnings,
        Severity::Info => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Aggregated scan result.
pub struct ScanVerdict {
    pub passed: bool,
    pub messages: BTreeMap<String, BTreeSet<MessageDescriptor>>,
    /// Set by an unexpected failure of the run itself, never by a protocol.
    pub global: bool,
}

impl Default for ScanVerdict {
    fn default() -> Self {
        Self::empty()
    }
}

impl ScanVerdict {
    /// Identity: passed with no messages.
    pub fn empty() -> Self {
        Self {
            passed: true,
            messages: BTreeMap::new(),
            global: false,
        }
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            passed: self.passed && other.passed,
            messages: merge_sets(self.messages, other.messages),
            global: self.global || other.global,
        }
    }

    fn single(passed: bool, message: MessageDescriptor) -> Self {
        let mut messages = BTreeMap::new();
        messages.insert(message.path.clone(), BTreeSet::from([message]));
        Self {
            passed,
            messages,
            global: false,
        }
    }

    /// An ERROR outcome for failures while evaluating a protocol.
    pub fn error(path: &str, text: impl Into<String>) -> Self {
        Self::single(false, MessageDescriptor::new(path, Severity::Error, text))
    }

    /// An ERROR outcome for an unexpected failure of the whole run.
    pub fn global_error(text: impl Into<String>) -> Self {
        Self {
            global: true,
            ..Self::error(GLOBAL_PATH, text)
        }
    }

    /// A missing file at the protocol's severity.
    pub fn file_not_found(path: &str, severity: Severity, fail_on_warnings: bool) -> Self {
        Self::single(
            !severity_fails(severity, fail_on_warnings),
            MessageDescriptor::new(path, severity, "File not found"),
        )
    }

    /// Translate an enforcer check into a verdict at the protocol's severity.
    pub fn from_check(
        path: &str,
        severity: Severity,
        outcome: CheckOutcome,
        fail_on_warnings: bool,
    ) -> Self {
        let passed = outcome.passed || !severity_fails(severity, fail_on_warnings);
        let mut texts = outcome.messages;
        // a failed check always leaves a trace
        if !outcome.passed && texts.is_empty() {
            texts.push("Enforcer check failed".to_string());
        }
        let set: BTreeSet<MessageDescriptor> = texts
            .into_iter()
            .map(|t| MessageDescriptor::new(path, severity, t))
            .collect();
        let mut messages = BTreeMap::new();
        if !set.is_empty() {
            messages.insert(path.to_string(), set);
        }
        Self {
            passed,
            messages,
            global: false,
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.iter_messages()
            .filter(|m| m.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    pub fn iter_messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Aggregated fix result.
pub struct FixVerdict {
    pub changed: bool,
    pub messages: BTreeMap<String, BTreeSet<FixMessage>>,
    /// Set by an unexpected failure of the run itself, never by a protocol.
    pub global: bool,
    outcomes: usize,
    erroneous: usize,
}

impl Default for FixVerdict {
    fn default() -> Self {
        Self::empty()
    }
}

impl FixVerdict {
    /// Identity: nothing changed, no outcomes, no messages.
    pub fn empty() -> Self {
        Self {
            changed: false,
            messages: BTreeMap::new(),
            global: false,
            outcomes: 0,
            erroneous: 0,
        }
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            changed: self.changed || other.changed,
            messages: merge_sets(self.messages, other.messages),
            global: self.global || other.global,
            outcomes: self.outcomes + other.outcomes,
            erroneous: self.erroneous + other.erroneous,
        }
    }

    fn single(kind: FixKind, path: &str, text: impl Into<String>) -> Self {
        let message = FixMessage::new(path, kind, text);
        let mut messages = BTreeMap::new();
        messages.insert(path.to_string(), BTreeSet::from([message]));
        Self {
            changed: false,
            messages,
            global: false,
            outcomes: 1,
            erroneous: usize::from(kind == FixKind::Error),
        }
    }

    pub fn error(path: &str, text: impl Into<String>) -> Self {
        Self::single(FixKind::Error, path, text)
    }

    pub fn global_error(text: impl Into<String>) -> Self {
        Self {
            global: true,
            ..Self::error(GLOBAL_PATH, text)
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::error(path, "File not found")
    }

    /// Informational outcome for an enforcer without a resolver.
    pub fn no_resolver(path: &str, alias: &str) -> Self {
        Self::single(
            FixKind::Info,
            path,
            format!("No fixes applied, file enforcer {alias} does not have any resolutions"),
        )
    }

    /// Translate a resolver outcome for one file.
    pub fn from_outcome(path: &str, outcome: &FixOutcome) -> Self {
        let set: BTreeSet<FixMessage> = outcome
            .fixes()
            .iter()
            .map(|t| FixMessage::new(path, FixKind::Applied, t.clone()))
            .chain(
                outcome
                    .errors()
                    .iter()
                    .map(|t| FixMessage::new(path, FixKind::Error, t.clone())),
            )
            .collect();
        let mut messages = BTreeMap::new();
        if !set.is_empty() {
            messages.insert(path.to_string(), set);
        }
        Self {
            changed: outcome.changed(),
            messages,
            global: false,
            outcomes: 1,
            erroneous: usize::from(outcome.error()),
        }
    }

    /// True only when at least one outcome contributed and all of them were
    /// errors.
    pub fn is_error(&self) -> bool {
        self.outcomes > 0 && self.erroneous == self.outcomes
    }

    fn count(&self, kind: FixKind) -> usize {
        self.iter_messages().filter(|m| m.kind == kind).count()
    }

    pub fn fix_count(&self) -> usize {
        self.count(FixKind::Applied)
    }

    pub fn error_count(&self) -> usize {
        self.count(FixKind::Error)
    }

    pub fn iter_messages(&self) -> impl Iterator<Item = &FixMessage> {
        self.messages.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(texts: &[&str]) -> CheckOutcome {
        CheckOutcome::failed_with(texts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn empty_is_identity_for_scan() {
        let v = ScanVerdict::error("a", "boom");
        assert_eq!(ScanVerdict::empty().combine(v.clone()), v);
        assert_eq!(v.clone().combine(ScanVerdict::empty()), v);
    }

    #[test]
    fn warning_gating_depends_on_fail_on_warnings() {
        let lenient = ScanVerdict::from_check("a", Severity::Warning, failed(&["x"]), false);
        let strict = ScanVerdict::from_check("a", Severity::Warning, failed(&["x"]), true);
        assert!(lenient.passed);
        assert!(!strict.passed);
        assert_eq!(lenient.warning_count(), 1);
        assert_eq!(lenient.error_count(), 0);
    }

    #[test]
    fn info_never_fails() {
        let v = ScanVerdict::from_check("a", Severity::Info, failed(&["note"]), true);
        assert!(v.passed);
        assert_eq!(v.info_count(), 1);
    }

    #[test]
    fn failed_check_without_messages_gets_default_text() {
        let v = ScanVerdict::from_check("a", Severity::Error, failed(&[]), false);
        assert!(!v.passed);
        assert_eq!(v.error_count(), 1);
    }

    #[test]
    fn duplicate_scan_messages_are_counted_once() {
        let a = ScanVerdict::file_not_found("README.md", Severity::Error, false);
        let both = a.clone().combine(a.clone());
        assert_eq!(both, a);
        assert_eq!(both.error_count(), 1);
    }

    #[test]
    fn fix_error_flag_requires_every_outcome_to_fail() {
        let err = FixVerdict::error("a", "boom");
        let ok = FixVerdict::from_outcome("b", &FixOutcome::updated("fixed"));
        assert!(err.is_error());
        assert!(!err.clone().combine(ok).is_error());
        assert!(err.clone().combine(FixVerdict::file_not_found("c")).is_error());
        assert!(!FixVerdict::empty().is_error());
    }

    #[test]
    fn fix_counts_derive_from_distinct_messages() {
        let fixed = FixVerdict::from_outcome("p", &FixOutcome::updated("set version"));
        let twice = fixed.clone().combine(fixed.clone());
        assert!(twice.changed);
        assert_eq!(twice.fix_count(), 1);
        assert_eq!(twice.error_count(), 0);
    }

    #[test]
    fn no_resolver_is_informational() {
        let v = FixVerdict::no_resolver("LICENSE", "contains");
        assert!(!v.is_error());
        assert_eq!(v.error_count(), 0);
        assert_eq!(
            v.iter_messages().next().unwrap().to_string(),
            "LICENSE :: No fixes applied, file enforcer contains does not have any resolutions"
        );
    }
}
