//! Scan runner: evaluate protocols against repository files.
//!
//! Protocols are processed in order; the files matched by one protocol are
//! checked in parallel and folded into a single `ScanVerdict`.

use crate::config::ExecOptions;
use crate::enforcer::{EnforcerRegistry, FileEnforcer};
use crate::error::{EngineError, ResolutionError};
use crate::models::configuration::Configuration;
use crate::models::protocol::Protocol;
use crate::repository::{is_glob_pattern, RepositoryAccess};
use crate::result::ScanVerdict;
use rayon::prelude::*;
use std::any::Any;
use tracing::{debug, warn};

pub(crate) const GLOB_WITHOUT_ENFORCERS: &str =
    "Error enforcing file protocol: glob patterns can only be used when there is at least one enforcer";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Knobs shared by scan and fix.
pub struct ScanSettings {
    pub fail_on_warnings: bool,
    /// Only protocols sharing at least one of these tags; empty selects all.
    pub tags: Vec<String>,
}

/// Required protocols selected by the tag filter, in declaration order.
pub(crate) fn selected<'a>(
    config: &'a Configuration,
    tags: &'a [String],
) -> impl Iterator<Item = &'a Protocol> + 'a {
    config
        .rules
        .iter()
        .filter(move |p| p.required && p.matches_tags(tags))
}

/// Concrete files named by a protocol path.
pub(crate) fn resolve_paths(
    access: &dyn RepositoryAccess,
    path: &str,
) -> Result<Vec<String>, ResolutionError> {
    if !is_glob_pattern(path) {
        return Ok(vec![path.to_string()]);
    }
    if !access.supports_glob_patterns() {
        return Err(ResolutionError::Unsupported {
            pattern: path.to_string(),
        });
    }
    access.glob(path)
}

/// Parse every raw check of a protocol; failures are reported separately.
pub(crate) fn compile_enforcers(
    protocol: &Protocol,
    registry: &EnforcerRegistry,
) -> (Vec<FileEnforcer>, Vec<String>) {
    let mut compiled = Vec::with_capacity(protocol.enforcers.len());
    let mut invalid = Vec::new();
    for raw in &protocol.enforcers {
        match registry.parse(raw) {
            Ok(enforcer) => compiled.push(enforcer),
            Err(err) => {
                warn!(protocol = %protocol.name, error = %err, "invalid file enforcer");
                invalid.push(format!("File enforcer invalid: {err}"));
            }
        }
    }
    (compiled, invalid)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected failure".to_string()
    }
}

/// Evaluate every selected protocol.
pub fn execute_scan(
    config: &Configuration,
    access: &dyn RepositoryAccess,
    registry: &EnforcerRegistry,
    settings: &ScanSettings,
) -> ScanVerdict {
    selected(config, &settings.tags)
        .map(|protocol| scan_protocol(protocol, access, registry, settings))
        .fold(ScanVerdict::empty(), ScanVerdict::combine)
}

fn scan_protocol(
    protocol: &Protocol,
    access: &dyn RepositoryAccess,
    registry: &EnforcerRegistry,
    settings: &ScanSettings,
) -> ScanVerdict {
    let path = protocol.repository_path.as_str();
    let severity = protocol.severity;
    debug!(protocol = %protocol.name, path, "scanning protocol");

    // Existence-only protocol
    if protocol.enforcers.is_empty() {
        if is_glob_pattern(path) {
            return ScanVerdict::error(path, GLOB_WITHOUT_ENFORCERS);
        }
        return match access.exists(path) {
            Ok(true) => ScanVerdict::empty(),
            Ok(false) => ScanVerdict::file_not_found(path, severity, settings.fail_on_warnings),
            Err(e) => ScanVerdict::error(path, format!("Error reading file: {e}")),
        };
    }

    let (enforcers, invalid) = compile_enforcers(protocol, registry);
    let verdict = invalid
        .into_iter()
        .map(|text| ScanVerdict::error(path, text))
        .fold(ScanVerdict::empty(), ScanVerdict::combine);
    // every check was invalid; nothing left to run
    if enforcers.is_empty() {
        return verdict;
    }

    let files = match resolve_paths(access, path) {
        Ok(files) => files,
        Err(e) => {
            warn!(protocol = %protocol.name, error = %e, "cannot resolve protocol path");
            return verdict.combine(ScanVerdict::error(
                path,
                format!("Error enforcing file protocol: {e}"),
            ));
        }
    };
    if files.is_empty() {
        return verdict.combine(ScanVerdict::file_not_found(
            path,
            severity,
            settings.fail_on_warnings,
        ));
    }

    // Files are independent; combine is order-insensitive
    let scanned = files
        .par_iter()
        .map(|file| scan_file(file, protocol, &enforcers, access, settings))
        .reduce(ScanVerdict::empty, ScanVerdict::combine);
    verdict.combine(scanned)
}

fn scan_file(
    file: &str,
    protocol: &Protocol,
    enforcers: &[FileEnforcer],
    access: &dyn RepositoryAccess,
    settings: &ScanSettings,
) -> ScanVerdict {
    let content = match access.read_text(file) {
        Ok(Some(text)) => text,
        Ok(None) => {
            return ScanVerdict::file_not_found(file, protocol.severity, settings.fail_on_warnings)
        }
        Err(e) => {
            warn!(file, error = %e, "cannot read file");
            return ScanVerdict::error(file, format!("Error reading file: {e}"));
        }
    };
    enforcers
        .iter()
        .map(|enforcer| {
            ScanVerdict::from_check(
                file,
                protocol.severity,
                enforcer.check(&content),
                settings.fail_on_warnings,
            )
        })
        .fold(ScanVerdict::empty(), ScanVerdict::combine)
}

/// Resolve configuration and repository from `options`, then scan.
///
/// Configuration problems abort with an error; a panic while scanning is
/// reported as a single global error outcome.
pub fn run_scan(options: &ExecOptions) -> Result<ScanVerdict, EngineError> {
    let session = options.open()?;
    let registry = EnforcerRegistry::builtin();
    let settings = options.settings();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        execute_scan(
            &session.configuration,
            session.access.as_ref(),
            &registry,
            &settings,
        )
    }));
    Ok(outcome.unwrap_or_else(|payload| ScanVerdict::global_error(panic_message(payload))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::models::Severity;
    use crate::repository::tests::FakeTransport;
    use crate::repository::{LocalRepository, Provider, RemoteRef, RemoteRepository};
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;

    /// Globs to two files; reading one of them fails.
    struct FlakyReader;

    impl RepositoryAccess for FlakyReader {
        fn supports_glob_patterns(&self) -> bool {
            true
        }

        fn exists(&self, _path: &str) -> Result<bool, AccessError> {
            Ok(true)
        }

        fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AccessError> {
            match path {
                "docs/broken.md" => Err(AccessError::Transient {
                    location: path.to_string(),
                    message: "timed out".into(),
                }),
                _ => Ok(Some(b"no license here\n".to_vec())),
            }
        }

        fn absolute_location(&self, path: &str) -> String {
            path.to_string()
        }

        fn glob(&self, _pattern: &str) -> Result<Vec<String>, ResolutionError> {
            Ok(vec!["docs/broken.md".into(), "docs/ok.md".into()])
        }
    }

    fn scan_with(access: &dyn RepositoryAccess, rule: Protocol) -> ScanVerdict {
        execute_scan(
            &Configuration::new(vec![rule]),
            access,
            &EnforcerRegistry::builtin(),
            &ScanSettings::default(),
        )
    }

    fn mit_rule(path: &str) -> Protocol {
        Protocol::new("license", path)
            .with_enforcer(check(json!({"enforcer": "contains", "expected-substring": "MIT"})))
    }

    fn check(value: serde_json::Value) -> crate::models::protocol::RawCheck {
        value.as_object().cloned().unwrap()
    }

    fn scan(dir: &std::path::Path, rules: Vec<Protocol>, fail_on_warnings: bool) -> ScanVerdict {
        execute_scan(
            &Configuration::new(rules),
            &LocalRepository::new(dir),
            &EnforcerRegistry::builtin(),
            &ScanSettings {
                fail_on_warnings,
                tags: Vec::new(),
            },
        )
    }

    #[test]
    fn existing_readme_passes_without_messages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        let v = scan(dir.path(), vec![Protocol::new("readme", "README.md")], false);
        assert!(v.passed);
        assert_eq!(v.iter_messages().count(), 0);
    }

    #[test]
    fn missing_readme_fails_with_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = scan(dir.path(), vec![Protocol::new("readme", "README.md")], false);
        assert!(!v.passed);
        assert_eq!(v.error_count(), 1);
        let rendered: Vec<String> = v.iter_messages().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["[ERROR] README.md :: File not found"]);
    }

    #[test]
    fn glob_without_enforcers_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = scan(dir.path(), vec![Protocol::new("docs", "docs/*.md")], false);
        assert!(!v.passed);
        assert_eq!(
            v.iter_messages().next().unwrap().text,
            GLOB_WITHOUT_ENFORCERS
        );
    }

    #[test]
    fn glob_is_expanded_and_each_file_checked() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.md"), "ok\nLicense: MIT\n").unwrap();
        fs::write(dir.path().join("docs/b.md"), "nothing here\n").unwrap();
        let rule = Protocol::new("docs", "docs/*.md")
            .with_enforcer(check(json!({"enforcer": "contains", "expected-substring": "MIT"})));
        let v = scan(dir.path(), vec![rule], false);
        assert!(!v.passed);
        assert_eq!(v.messages.keys().collect::<Vec<_>>(), vec!["docs/b.md"]);
    }

    #[test]
    fn empty_glob_expansion_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let rule = Protocol::new("docs", "docs/*.md")
            .with_enforcer(check(json!({"enforcer": "contains", "expected-substring": "x"})));
        let v = scan(dir.path(), vec![rule], false);
        assert_eq!(v.iter_messages().next().unwrap().text, "File not found");
    }

    #[test]
    fn warnings_fail_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let rule = Protocol::new("lic", "LICENSE").with_severity(Severity::Warning);
        let lenient = scan(dir.path(), vec![rule.clone()], false);
        let strict = scan(dir.path(), vec![rule], true);
        assert!(lenient.passed);
        assert_eq!(lenient.warning_count(), 1);
        assert!(!strict.passed);
    }

    #[test]
    fn invalid_enforcer_is_reported_and_others_still_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        let rule = Protocol::new("a", "a.txt")
            .with_enforcer(check(json!({"enforcer": "bogus"})))
            .with_enforcer(check(json!({"enforcer": "contains-line", "expected-line": "bye"})));
        let v = scan(dir.path(), vec![rule], false);
        let texts: Vec<&str> = v.iter_messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().any(|t| t.starts_with("File enforcer invalid:")));
        assert!(texts.contains(&"File does not contain the line [bye]"));
    }

    #[test]
    fn optional_and_untagged_protocols_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut optional = Protocol::new("opt", "MISSING");
        optional.required = false;
        let tagged = Protocol::new("tagged", "ALSO_MISSING").with_tags(["build"]);
        let v = execute_scan(
            &Configuration::new(vec![optional, tagged]),
            &LocalRepository::new(dir.path()),
            &EnforcerRegistry::builtin(),
            &ScanSettings {
                fail_on_warnings: false,
                tags: vec!["docs".into()],
            },
        );
        assert!(v.passed);
        assert_eq!(v.iter_messages().count(), 0);
    }

    #[test]
    fn glob_on_reader_without_glob_support_is_an_error() {
        let remote = RemoteRepository::new(
            &Provider::Github {
                enterprise_url: None,
            },
            &RemoteRef::parse("acme/widgets", "main").unwrap(),
            None,
            Arc::new(FakeTransport::default()),
        );
        let v = scan_with(&remote, mit_rule("docs/*.md"));
        assert!(!v.passed);
        let message = v.iter_messages().next().unwrap();
        assert_eq!(message.path, "docs/*.md");
        assert_eq!(
            message.text,
            "Error enforcing file protocol: glob pattern [docs/*.md] is not supported by this repository reader"
        );
    }

    #[test]
    fn read_failure_is_isolated_to_its_file() {
        let v = scan_with(&FlakyReader, mit_rule("docs/*.md"));
        assert!(!v.passed);
        let rendered: Vec<String> = v.iter_messages().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "[ERROR] docs/broken.md :: Error reading file: transient failure accessing docs/broken.md: timed out",
                "[ERROR] docs/ok.md :: File does not contain the sub string [MIT]",
            ]
        );
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LICENSE"), b"caf\xe9 MIT\n").unwrap();
        let v = scan(dir.path(), vec![mit_rule("LICENSE")], false);
        assert!(!v.passed);
        let message = v.iter_messages().next().unwrap();
        assert!(message.text.starts_with("Error reading file: content of LICENSE is not valid UTF-8 text"));
    }

    #[test]
    fn panic_payloads_become_text() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload), "boom");
    }
}
