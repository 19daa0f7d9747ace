//! Error types, one enum per subsystem.
//!
//! Configuration errors abort a run. Access, resolution and rule parse errors
//! are isolated by the executors and folded into the verdict as ERROR outcomes.

use std::path::PathBuf;

/// Errors raised while reading and merging configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {location}")]
    NotFound { location: String },

    #[error("Error parsing configuration file {location}{}: {message}", position(.line, .column))]
    ParseFailure {
        location: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error("Could not locate or deserialize file {location}: {source}")]
    Include {
        location: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Error reading configuration file {location}: {source}")]
    Access {
        location: String,
        #[source]
        source: AccessError,
    },
}

impl ConfigError {
    /// The location the error refers to.
    pub fn location(&self) -> &str {
        match self {
            Self::NotFound { location }
            | Self::ParseFailure { location, .. }
            | Self::Include { location, .. }
            | Self::Access { location, .. } => location,
        }
    }
}

fn position(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(l), Some(c)) => format!(" at line {l}, column {c}"),
        (Some(l), None) => format!(" at line {l}"),
        _ => String::new(),
    }
}

/// Errors raised when a raw check cannot be turned into an enforcer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("unknown enforcer type [{alias}]")]
    UnknownType { alias: String },

    #[error("invalid parameters for enforcer [{alias}]: {message}")]
    InvalidParameters { alias: String, message: String },
}

/// Errors raised by repository readers and writers.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("transient failure accessing {location}: {message}")]
    Transient { location: String, message: String },

    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote request to {url} failed with status {status}")]
    Remote { url: String, status: u16 },

    #[error("repository at {location} does not support writing")]
    ReadOnly { location: String },

    #[error("content of {path} is not valid UTF-8 text: {source}")]
    NotText {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Errors raised while turning a protocol path into concrete files.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("glob pattern [{pattern}] is not supported by this repository reader")]
    Unsupported { pattern: String },

    #[error("invalid glob pattern [{pattern}]: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Errors raised when parsing remote repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteRefError {
    #[error("Invalid remote reference, must contain '/' separator between repository coordinates")]
    MissingSeparator,

    #[error("Invalid remote reference, ref must be provided after '@'")]
    EmptyRef,

    #[error("Invalid remote reference, repository must not be empty")]
    EmptyRepository,
}

/// Top-level errors returned by the scan and fix entry points.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    RemoteRef(#[from] RemoteRefError),

    #[error("unable to initialize repository access: {0}")]
    Repository(String),

    #[error("{0}")]
    Usage(String),
}

impl EngineError {
    /// Whether the error stems from invalid configuration or usage rather
    /// than an unexpected failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Config(_) | Self::RemoteRef(_) | Self::Usage(_))
    }
}
