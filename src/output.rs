//! Output rendering for scan, fix, and validate-config.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-path messages and a top-level summary.

use crate::config::OutputMode;
use crate::models::{FixKind, Severity};
use crate::result::{FixVerdict, ScanVerdict};
use crate::validate::ValidationReport;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: OutputMode) -> bool {
    output == OutputMode::Human && crate::utils::colors_enabled()
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = format!("[{severity}]");
    if !color {
        return label;
    }
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().bold().to_string(),
        Severity::Info => label.blue().bold().to_string(),
    }
}

/// Print a scan verdict in the requested format.
pub fn print_scan(verdict: &ScanVerdict, output: OutputMode) {
    if output == OutputMode::Json {
        println!("{:#}", compose_scan_json(verdict));
        return;
    }
    let color = use_colors(output);
    for m in verdict.iter_messages() {
        let path = if color {
            m.path.bold().to_string()
        } else {
            m.path.clone()
        };
        println!("{} {} :: {}", severity_label(m.severity, color), path, m.text);
    }
    // Summary line
    let status = if verdict.passed { "Scan passed" } else { "Scan failed" };
    let summary = format!(
        "{status}: errors={} warnings={} infos={}",
        verdict.error_count(),
        verdict.warning_count(),
        verdict.info_count()
    );
    match (color, verdict.passed) {
        (true, true) => println!("{}", summary.green().bold()),
        (true, false) => println!("{}", summary.red().bold()),
        _ => println!("{summary}"),
    }
}

/// Print a fix verdict. In dry-run mode applied fixes are reported as
/// pending.
pub fn print_fix(verdict: &FixVerdict, output: OutputMode, dry_run: bool) {
    if output == OutputMode::Json {
        println!("{:#}", compose_fix_json(verdict, dry_run));
        return;
    }
    let color = use_colors(output);
    for m in verdict.iter_messages() {
        let label = match (m.kind, dry_run) {
            (FixKind::Applied, true) => "[WOULD FIX]",
            (FixKind::Applied, false) => "[FIXED]",
            (FixKind::Error, _) => "[ERROR]",
            (FixKind::Info, _) => "[INFO]",
        };
        let label = match (color, m.kind) {
            (false, _) => label.to_string(),
            (true, FixKind::Applied) => label.green().bold().to_string(),
            (true, FixKind::Error) => label.red().bold().to_string(),
            (true, FixKind::Info) => label.bright_black().to_string(),
        };
        println!("{label} {m}");
    }
    let summary = format!(
        "Fix {}: fixes={} errors={}",
        if dry_run { "dry run" } else { "complete" },
        verdict.fix_count(),
        verdict.error_count()
    );
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{summary}");
    }
}

/// Print the outcome of validating one configuration document.
pub fn print_validation(report: &ValidationReport, output: OutputMode) {
    if output == OutputMode::Json {
        println!("{:#}", compose_validation_json(report));
        return;
    }
    // errors go to stderr, notes to stdout
    for error in &report.errors {
        eprintln!("{} {error}", crate::utils::error_prefix());
    }
    for note in &report.notes {
        println!("{} {note}", crate::utils::note_prefix());
    }
    if report.is_valid() {
        println!(
            "{} Congratulations, you have created a valid configuration file",
            crate::utils::success_prefix()
        );
    }
}

/// Compose scan JSON object (pure) for testing/snapshot purposes.
pub fn compose_scan_json(verdict: &ScanVerdict) -> JsonVal {
    let messages: serde_json::Map<String, JsonVal> = verdict
        .messages
        .iter()
        .map(|(path, set)| {
            let items: Vec<_> = set
                .iter()
                .map(|m| json!({"severity": m.severity, "message": m.text}))
                .collect();
            (path.clone(), JsonVal::Array(items))
        })
        .collect();
    json!({
        "passed": verdict.passed,
        "messages": messages,
        "summary": {
            "errors": verdict.error_count(),
            "warnings": verdict.warning_count(),
            "infos": verdict.info_count(),
        }
    })
}

/// Compose fix JSON object (pure) for testing/snapshot purposes.
pub fn compose_fix_json(verdict: &FixVerdict, dry_run: bool) -> JsonVal {
    let messages: serde_json::Map<String, JsonVal> = verdict
        .messages
        .iter()
        .map(|(path, set)| {
            let items: Vec<_> = set
                .iter()
                .map(|m| json!({"kind": m.kind, "message": m.text}))
                .collect();
            (path.clone(), JsonVal::Array(items))
        })
        .collect();
    json!({
        "changed": verdict.changed,
        "error": verdict.is_error(),
        "dryRun": dry_run,
        "messages": messages,
        "summary": {
            "fixes": verdict.fix_count(),
            "errors": verdict.error_count(),
        }
    })
}

pub fn compose_validation_json(report: &ValidationReport) -> JsonVal {
    json!({
        "location": report.location,
        "valid": report.is_valid(),
        "errors": report.errors,
        "notes": report.notes,
    })
}
