use sourcehawk::config::{ExecOptions, RepositorySource};
use sourcehawk::error::{ConfigError, EngineError};
use sourcehawk::fix::run_fix;
use sourcehawk::models::Severity;
use sourcehawk::scan::run_scan;
use sourcehawk::status::ExitStatus;
use std::fs;
use std::path::Path;

fn options(root: &Path) -> ExecOptions {
    ExecOptions {
        repo_root: root.to_path_buf(),
        config_location: "sourcehawk.yml".into(),
        config_explicit: true,
        source: RepositorySource::Local,
        ..ExecOptions::default()
    }
}

fn write(root: &Path, name: &str, body: &str) {
    fs::write(root.join(name), body).unwrap();
}

const README_ONLY: &str = r#"
file-protocols:
  - name: readme
    repository-path: README.md
"#;

#[test]
fn readme_present_passes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sourcehawk.yml", README_ONLY);
    write(dir.path(), "README.md", "# demo\n");

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(verdict.passed);
    assert_eq!(verdict.error_count(), 0);
    assert_eq!(ExitStatus::for_scan(&verdict), ExitStatus::Success);
}

#[test]
fn readme_missing_fails_with_one_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sourcehawk.yml", README_ONLY);

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.error_count(), 1);
    let message = verdict.iter_messages().next().unwrap();
    assert_eq!(message.path, "README.md");
    assert_eq!(message.severity, Severity::Error);
    assert_eq!(message.text, "File not found");
    assert_eq!(ExitStatus::for_scan(&verdict).code(), 1);
}

#[test]
fn warnings_only_fail_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: changelog
    repository-path: CHANGELOG.md
    severity: WARNING
"#,
    );

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(verdict.passed);
    assert_eq!(verdict.warning_count(), 1);

    let strict = ExecOptions {
        fail_on_warnings: true,
        ..options(dir.path())
    };
    assert!(!run_scan(&strict).unwrap().passed);
}

#[test]
fn property_fix_then_scan_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: version
    repository-path: gradle.properties
    enforcers:
      - enforcer: string-property-equals
        property-name: version
        expected-property-value: "2.0"
"#,
    );
    write(dir.path(), "gradle.properties", "name=demo\nversion=1.0\n");
    let opts = options(dir.path());

    assert!(!run_scan(&opts).unwrap().passed);

    let fixed = run_fix(&opts, false).unwrap();
    assert!(fixed.changed);
    assert_eq!(fixed.fix_count(), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("gradle.properties")).unwrap(),
        "name=demo\nversion=2.0\n"
    );

    assert!(run_scan(&opts).unwrap().passed);
    let again = run_fix(&opts, false).unwrap();
    assert!(!again.changed);
    assert_eq!(again.fix_count(), 0);
}

#[test]
fn unquoted_yaml_values_are_read_as_text() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: version
    repository-path: gradle.properties
    enforcers:
      - enforcer: string-property-equals
        property-name: version
        expected-property-value: 2.0
      - enforcer: contains-line-at
        expected-line: name=demo
        expected-line-number: "1"
"#,
    );
    write(dir.path(), "gradle.properties", "name=demo\nversion=1.0\n");
    let opts = options(dir.path());

    let scanned = run_scan(&opts).unwrap();
    let texts: Vec<&str> = scanned.iter_messages().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Property [version] with value [1.0] does not equal [2.0]"]
    );

    let fixed = run_fix(&opts, false).unwrap();
    assert!(fixed.changed);
    assert_eq!(fixed.error_count(), 0);
    assert_eq!(
        fs::read_to_string(dir.path().join("gradle.properties")).unwrap(),
        "name=demo\nversion=2.0\n"
    );
}

#[test]
fn dry_run_leaves_files_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: package
    repository-path: package.json
    enforcers:
      - enforcer: json-value-equals
        expectations:
          /version: "2.0.0"
"#,
    );
    write(dir.path(), "package.json", "{\"version\": \"1.0.0\"}\n");

    let verdict = run_fix(&options(dir.path()), true).unwrap();
    assert!(verdict.changed);
    assert_eq!(
        fs::read_to_string(dir.path().join("package.json")).unwrap(),
        "{\"version\": \"1.0.0\"}\n"
    );
}

#[test]
fn glob_without_enforcers_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: docs
    repository-path: "docs/*.md"
"#,
    );

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(!verdict.passed);
    let message = verdict.iter_messages().next().unwrap();
    assert_eq!(message.path, "docs/*.md");
    assert!(message.text.contains("at least one enforcer"));
}

#[test]
fn glob_checks_every_match() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
file-protocols:
  - name: docs
    repository-path: "docs/*.md"
    enforcers:
      - enforcer: contains
        expected-substring: "Copyright"
"#,
    );
    write(&dir.path().join("docs"), "a.md", "Copyright 2024\n");
    write(&dir.path().join("docs"), "b.md", "nothing here\n");

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(!verdict.passed);
    let paths: Vec<_> = verdict.messages.keys().cloned().collect();
    assert_eq!(paths, vec!["docs/b.md".to_string()]);
}

#[test]
fn include_cycles_resolve_once() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sourcehawk.yml",
        r#"
config-locations:
  - base.yml
file-protocols:
  - name: readme
    repository-path: README.md
"#,
    );
    write(
        dir.path(),
        "base.yml",
        r#"
config-locations:
  - sourcehawk.yml
file-protocols:
  - name: license
    repository-path: LICENSE
"#,
    );
    write(dir.path(), "README.md", "# demo\n");

    let verdict = run_scan(&options(dir.path())).unwrap();
    assert!(!verdict.passed);
    let paths: Vec<_> = verdict.messages.keys().cloned().collect();
    assert_eq!(paths, vec!["LICENSE".to_string()]);
}

#[test]
fn missing_configuration_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = run_scan(&options(dir.path())).unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::NotFound { .. })));
    assert_eq!(ExitStatus::for_error(&err).code(), 2);
}
