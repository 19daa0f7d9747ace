//! Configuration resolution: read a document, follow `config-locations`
//! recursively, and merge everything into one effective configuration.
//!
//! Relative locations are resolved against the repository root fixed at
//! construction; URLs are fetched through the HTTP transport. Each location
//! is read at most once per resolution, so include cycles terminate.

use crate::error::{AccessError, ConfigError};
use crate::models::configuration::Configuration;
use crate::models::protocol::Protocol;
use crate::repository::HttpTransport;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Serialization of a configuration document.
pub enum DocumentFormat {
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// TOML when the location ends with `.toml`, YAML otherwise.
    pub fn from_location(location: &str) -> Self {
        // ignore query and fragment of URLs
        let path = location.split(['?', '#']).next().unwrap_or(location);
        if path.to_ascii_lowercase().ends_with(".toml") {
            DocumentFormat::Toml
        } else {
            DocumentFormat::Yaml
        }
    }
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |i| before.len() - i - 1) + 1;
    (line, column)
}

/// Deserialize a single document without following its includes.
pub fn parse_document(
    location: &str,
    bytes: &[u8],
    format: DocumentFormat,
) -> Result<Configuration, ConfigError> {
    let text = String::from_utf8_lossy(bytes);
    // An empty document is a valid, empty configuration
    if text.trim().is_empty() {
        return Ok(Configuration::default());
    }
    match format {
        DocumentFormat::Toml => toml::from_str(&text).map_err(|e| {
            let (line, column) = match e.span() {
                Some(span) => {
                    let (l, c) = line_column(&text, span.start);
                    (Some(l), Some(c))
                }
                None => (None, None),
            };
            ConfigError::ParseFailure {
                location: location.to_string(),
                line,
                column,
                message: e.message().to_string(),
            }
        }),
        DocumentFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| {
            let position = e.location();
            ConfigError::ParseFailure {
                location: location.to_string(),
                line: position.as_ref().map(|p| p.line()),
                column: position.as_ref().map(|p| p.column()),
                message: e.to_string(),
            }
        }),
    }
}

/// Union of all rules in resolution order; the first protocol with a given
/// identity wins. Include locations are dropped.
pub fn merge(documents: Vec<Configuration>) -> Configuration {
    let mut seen: HashSet<Protocol> = HashSet::new();
    let mut rules = Vec::new();
    for rule in documents.into_iter().flat_map(|d| d.rules) {
        if seen.insert(rule.clone()) {
            rules.push(rule);
        } else {
            debug!(name = %rule.name, path = %rule.repository_path, "dropping duplicate protocol");
        }
    }
    Configuration::new(rules)
}

/// Lexical normal form: `.` segments dropped, `..` folded into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the start or after root stays as written
            Component::ParentDir
                if matches!(out.components().next_back(), Some(Component::Normal(_))) =>
            {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Reads configuration documents relative to one repository root.
pub struct ConfigurationResolver {
    root: PathBuf,
    transport: Arc<dyn HttpTransport>,
}

impl ConfigurationResolver {
    pub fn new(root: impl Into<PathBuf>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            root: root.into(),
            transport,
        }
    }

    /// Resolve `location` and everything it includes.
    ///
    /// A document without resolvable includes is returned as read; otherwise
    /// all documents are merged.
    pub fn resolve(&self, location: &str) -> Result<Configuration, ConfigError> {
        let visited = BTreeSet::from([self.key(location)]);
        let (mut documents, visited) = self.resolve_tree(location, visited)?;
        debug!(location, documents = documents.len(), visited = visited.len(), "resolved configuration");
        // No includes followed: keep the document as read, includes and all
        match documents.len() {
            1 => Ok(documents.remove(0)),
            _ => Ok(merge(documents)),
        }
    }

    /// Depth-first resolution. The visited set is consumed and handed back
    /// so siblings see every location reached before them.
    fn resolve_tree(
        &self,
        location: &str,
        mut visited: BTreeSet<String>,
    ) -> Result<(Vec<Configuration>, BTreeSet<String>), ConfigError> {
        let document = self.load(location)?;
        let includes = document.include_locations.clone();
        let mut documents = vec![document];

        for include in includes {
            if !visited.insert(self.key(&include)) {
                debug!(from = location, include = %include, "skipping visited location");
                continue;
            }
            debug!(from = location, include = %include, "following include");
            let (nested, next) =
                self.resolve_tree(&include, visited)
                    .map_err(|source| ConfigError::Include {
                        location: include.clone(),
                        source: Box::new(source),
                    })?;
            visited = next;
            documents.extend(nested);
        }
        Ok((documents, visited))
    }

    /// Identity of a location within one resolution.
    fn key(&self, location: &str) -> String {
        if is_url(location) {
            location.to_string()
        } else {
            normalize(&self.local_path(location)).display().to_string()
        }
    }

    fn local_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn load(&self, location: &str) -> Result<Configuration, ConfigError> {
        let bytes = self.read_bytes(location)?;
        parse_document(location, &bytes, DocumentFormat::from_location(location))
    }

    /// Raw bytes of one document, without parsing it.
    pub fn read_bytes(&self, location: &str) -> Result<Vec<u8>, ConfigError> {
        if is_url(location) {
            return self.fetch(location);
        }
        let path = self.local_path(location);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConfigError::NotFound {
                location: location.to_string(),
            }),
            Err(source) => Err(ConfigError::Access {
                location: location.to_string(),
                source: AccessError::Io { path, source },
            }),
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, ConfigError> {
        let headers = [("Accept".to_string(), "text/plain".to_string())];
        let resp = self
            .transport
            .get(url, &headers)
            .map_err(|source| ConfigError::Access {
                location: url.to_string(),
                source,
            })?;
        match resp.status {
            200 => Ok(resp.body),
            404 => Err(ConfigError::NotFound {
                location: url.to_string(),
            }),
            status => Err(ConfigError::Access {
                location: url.to_string(),
                source: AccessError::Remote {
                    url: url.to_string(),
                    status,
                },
            }),
        }
    }
}

/// Resolve and merge, then render the effective configuration as YAML.
pub fn flatten(resolver: &ConfigurationResolver, location: &str) -> Result<String, ConfigError> {
    // merge again so a single document also loses its include list
    let merged = merge(vec![resolver.resolve(location)?]);
    serde_yaml::to_string(&merged).map_err(|e| ConfigError::ParseFailure {
        location: location.to_string(),
        line: None,
        column: None,
        message: e.to_string(),
    })
}
