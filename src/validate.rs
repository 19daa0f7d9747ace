//! Static validation of a single configuration document.
//!
//! Includes are not followed; every protocol of the document is checked on
//! its own and every enforcer is compiled through the registry.

use crate::config::ExecOptions;
use crate::configuration::{parse_document, DocumentFormat};
use crate::enforcer::EnforcerRegistry;
use crate::error::EngineError;
use crate::models::protocol::Protocol;
use crate::repository::is_glob_pattern;
use rayon::prelude::*;
use serde::Serialize;

pub const EMPTY_DOCUMENT_NOTE: &str =
    "There are no remote configurations or file protocols in your config file, scans may produce no results";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub location: String,
    pub errors: Vec<String>,
    pub notes: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn protocol_errors(protocol: &Protocol, registry: &EnforcerRegistry) -> Vec<String> {
    let prefix = format!("in file protocol '{}'", protocol.name);
    let mut errors = Vec::new();
    if protocol.enforcers.is_empty() && is_glob_pattern(&protocol.repository_path) {
        errors.push(format!(
            "{prefix}: glob patterns can only be used when there is at least one enforcer"
        ));
    }
    errors.extend(
        protocol
            .enforcers
            .iter()
            .filter_map(|raw| registry.parse(raw).err())
            .map(|err| format!("{prefix}: {err}")),
    );
    errors
}

/// Validate raw document bytes.
pub fn validate_document(
    location: &str,
    bytes: &[u8],
    format: DocumentFormat,
    registry: &EnforcerRegistry,
) -> ValidationReport {
    let mut report = ValidationReport {
        location: location.to_string(),
        ..ValidationReport::default()
    };
    let document = match parse_document(location, bytes, format) {
        Ok(doc) => doc,
        Err(err) => {
            report.errors.push(err.to_string());
            return report;
        }
    };
    if document.is_empty() {
        report.notes.push(EMPTY_DOCUMENT_NOTE.to_string());
    }
    report.errors = document
        .rules
        .par_iter()
        .map(|protocol| protocol_errors(protocol, registry))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();
    report
}

/// Validate the configuration document named by `options`.
///
/// A missing or unreadable document is an error rather than a report.
pub fn validate_config(options: &ExecOptions) -> Result<ValidationReport, EngineError> {
    let transport = options.transport()?;
    let access = options.open_repository(transport.clone())?;
    let location = options.effective_config_location(access.as_ref());
    let bytes = options
        .resolver(transport)
        .read_bytes(&location)
        .map_err(EngineError::Config)?;
    Ok(validate_document(
        &location,
        &bytes,
        DocumentFormat::from_location(&location),
        &EnforcerRegistry::builtin(),
    ))
}
