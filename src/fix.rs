//! Fix runner: apply resolvers and write the results back.
//!
//! Unlike scanning, fixing is strictly sequential so two protocols touching
//! the same file never interleave their writes. In dry-run mode the verdict
//! reports what would change and nothing is written.

use crate::config::ExecOptions;
use crate::enforcer::{EnforcerRegistry, Fixable};
use crate::error::{AccessError, EngineError};
use crate::models::configuration::Configuration;
use crate::models::protocol::Protocol;
use crate::repository::{is_glob_pattern, RepositoryAccess};
use crate::result::FixVerdict;
use crate::scan::{
    compile_enforcers, panic_message, resolve_paths, selected, ScanSettings, GLOB_WITHOUT_ENFORCERS,
};
use tracing::{debug, info, warn};

/// Apply every resolver of the selected protocols.
pub fn execute_fix(
    config: &Configuration,
    access: &dyn RepositoryAccess,
    registry: &EnforcerRegistry,
    settings: &ScanSettings,
    dry_run: bool,
) -> FixVerdict {
    selected(config, &settings.tags)
        .map(|protocol| fix_protocol(protocol, access, registry, dry_run))
        .fold(FixVerdict::empty(), FixVerdict::combine)
}

fn fix_protocol(
    protocol: &Protocol,
    access: &dyn RepositoryAccess,
    registry: &EnforcerRegistry,
    dry_run: bool,
) -> FixVerdict {
    let path = protocol.repository_path.as_str();
    debug!(protocol = %protocol.name, path, dry_run, "fixing protocol");

    // Existence-only protocol: nothing to resolve, only report absence
    if protocol.enforcers.is_empty() {
        if is_glob_pattern(path) {
            return FixVerdict::error(path, GLOB_WITHOUT_ENFORCERS);
        }
        return match access.exists(path) {
            Ok(true) => FixVerdict::empty(),
            Ok(false) => FixVerdict::file_not_found(path),
            Err(e) => FixVerdict::error(path, format!("Error reading file: {e}")),
        };
    }

    let (enforcers, invalid) = compile_enforcers(protocol, registry);
    let mut verdict = invalid
        .into_iter()
        .map(|text| FixVerdict::error(path, text))
        .fold(FixVerdict::empty(), FixVerdict::combine);

    let mut resolvers: Vec<&dyn Fixable> = Vec::new();
    for enforcer in &enforcers {
        match registry.as_fixable(enforcer) {
            Some(resolver) => resolvers.push(resolver),
            None => verdict = verdict.combine(FixVerdict::no_resolver(path, enforcer.alias())),
        }
    }
    // Nothing fixable; skip reading the file at all
    if resolvers.is_empty() {
        return verdict;
    }

    let files = match resolve_paths(access, path) {
        Ok(files) => files,
        Err(e) => {
            warn!(protocol = %protocol.name, error = %e, "cannot resolve protocol path");
            return verdict.combine(FixVerdict::error(
                path,
                format!("Error enforcing file protocol: {e}"),
            ));
        }
    };
    if files.is_empty() {
        return verdict.combine(FixVerdict::file_not_found(path));
    }

    files
        .iter()
        .map(|file| fix_file(file, &resolvers, access, dry_run))
        .fold(verdict, FixVerdict::combine)
}

/// Run resolvers in order over one file; each sees the previous output.
fn fix_file(
    file: &str,
    resolvers: &[&dyn Fixable],
    access: &dyn RepositoryAccess,
    dry_run: bool,
) -> FixVerdict {
    let original = match access.read_text(file) {
        Ok(Some(text)) => text,
        Ok(None) => return FixVerdict::file_not_found(file),
        Err(e) => {
            warn!(file, error = %e, "cannot read file");
            return FixVerdict::error(file, format!("Error reading file: {e}"));
        }
    };

    let mut current = original;
    let mut modified = false;
    let mut verdict = FixVerdict::empty();
    for resolver in resolvers {
        let (updated, outcome) = resolver.fix(&current);
        verdict = verdict.combine(FixVerdict::from_outcome(file, &outcome));
        // later resolvers see the accumulated content
        if let Some(updated) = updated.filter(|_| outcome.changed()) {
            current = updated;
            modified = true;
        }
    }

    // Single write per file, after every resolver ran
    if !modified || dry_run {
        return verdict;
    }
    let written = match access.writer() {
        Some(writer) => writer.write(file, &current),
        None => Err(AccessError::ReadOnly {
            location: access.absolute_location(file),
        }),
    };
    match written {
        Ok(()) => {
            info!(file, "applied fixes");
            verdict
        }
        Err(e) => {
            warn!(file, error = %e, "cannot write file");
            verdict.combine(FixVerdict::error(file, format!("Error writing file: {e}")))
        }
    }
}

/// Resolve configuration and repository from `options`, then fix.
pub fn run_fix(options: &ExecOptions, dry_run: bool) -> Result<FixVerdict, EngineError> {
    let session = options.open()?;
    let registry = EnforcerRegistry::builtin();
    let settings = options.settings();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        execute_fix(
            &session.configuration,
            session.access.as_ref(),
            &registry,
            &settings,
            dry_run,
        )
    }));
    // A panic inside an enforcer becomes a run-level error
    Ok(outcome.unwrap_or_else(|payload| FixVerdict::global_error(panic_message(payload))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::protocol::RawCheck;
    use crate::repository::tests::FakeTransport;
    use crate::repository::{LocalRepository, Provider, RemoteRef, RemoteRepository};
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;

    fn check(value: serde_json::Value) -> RawCheck {
        value.as_object().cloned().unwrap()
    }

    fn version_rule() -> Protocol {
        Protocol::new("props", "gradle.properties").with_enforcer(check(json!({
            "enforcer": "string-property-equals",
            "property-name": "version",
            "expected-property-value": "2.0"
        })))
    }

    fn fix(dir: &std::path::Path, rules: Vec<Protocol>, dry_run: bool) -> FixVerdict {
        execute_fix(
            &Configuration::new(rules),
            &LocalRepository::new(dir),
            &EnforcerRegistry::builtin(),
            &ScanSettings::default(),
            dry_run,
        )
    }

    #[test]
    fn property_is_rewritten_and_second_run_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gradle.properties");
        fs::write(&file, "version=1.0\n").unwrap();

        let first = fix(dir.path(), vec![version_rule()], false);
        assert!(first.changed);
        assert_eq!(first.fix_count(), 1);
        assert!(!first.is_error());
        assert_eq!(fs::read_to_string(&file).unwrap(), "version=2.0\n");

        let second = fix(dir.path(), vec![version_rule()], false);
        assert!(!second.changed);
        assert_eq!(second.fix_count(), 0);
    }

    #[test]
    fn dry_run_reports_but_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gradle.properties");
        fs::write(&file, "version=1.0\n").unwrap();
        let v = fix(dir.path(), vec![version_rule()], true);
        assert!(v.changed);
        assert_eq!(fs::read_to_string(&file).unwrap(), "version=1.0\n");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let v = fix(dir.path(), vec![version_rule()], false);
        assert!(v.is_error());
        assert_eq!(v.error_count(), 1);
    }

    #[test]
    fn enforcer_without_resolver_is_informational() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LICENSE"), "MIT\n").unwrap();
        let rule = Protocol::new("lic", "LICENSE")
            .with_enforcer(check(json!({"enforcer": "contains", "expected-substring": "MIT"})));
        let v = fix(dir.path(), vec![rule], false);
        assert!(!v.changed);
        assert!(!v.is_error());
        assert_eq!(
            v.iter_messages().next().unwrap().to_string(),
            "LICENSE :: No fixes applied, file enforcer contains does not have any resolutions"
        );
    }

    #[test]
    fn undecodable_file_is_never_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gradle.properties");
        let latin1: &[u8] = b"name=caf\xe9\nversion=1.0\n";
        fs::write(&file, latin1).unwrap();

        let v = fix(dir.path(), vec![version_rule()], false);
        assert!(!v.changed);
        assert!(v.is_error());
        assert!(v
            .iter_messages()
            .next()
            .unwrap()
            .text
            .starts_with("Error reading file: content of gradle.properties is not valid UTF-8 text"));
        assert_eq!(fs::read(&file).unwrap(), latin1);
    }

    #[test]
    fn read_only_repository_reports_write_error() {
        let transport = FakeTransport::default().with_file(
            "https://raw.githubusercontent.com/acme/widgets/main/gradle.properties",
            "version=1.0\n",
        );
        let remote = RemoteRepository::new(
            &Provider::Github {
                enterprise_url: None,
            },
            &RemoteRef::parse("acme/widgets", "main").unwrap(),
            None,
            Arc::new(transport),
        );
        let v = execute_fix(
            &Configuration::new(vec![version_rule()]),
            &remote,
            &EnforcerRegistry::builtin(),
            &ScanSettings::default(),
            false,
        );
        assert_eq!(v.fix_count(), 1);
        assert_eq!(v.error_count(), 1);
        let errors: Vec<&str> = v
            .iter_messages()
            .filter(|m| m.kind == crate::models::FixKind::Error)
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            errors,
            vec!["Error writing file: repository at https://raw.githubusercontent.com/acme/widgets/main/gradle.properties does not support writing"]
        );
    }

    #[test]
    fn resolvers_on_one_file_compose() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, "{\"name\": \"x\"}\n").unwrap();
        let rule = Protocol::new("pkg", "package.json")
            .with_enforcer(check(json!({
                "enforcer": "json-value-equals",
                "expectations": {"/name": "demo"}
            })))
            .with_enforcer(check(json!({
                "enforcer": "json-value-equals",
                "expectations": {"/license": "MIT"}
            })));
        let v = fix(dir.path(), vec![rule], false);
        assert_eq!(v.fix_count(), 2);
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(written, json!({"name": "demo", "license": "MIT"}));
    }
}
