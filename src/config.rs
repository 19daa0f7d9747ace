//! Execution options and repository discovery.
//!
//! Sourcehawk looks for `sourcehawk.yml|yaml|toml` in the repository root
//! (or closest ancestor) and combines it with CLI flags into `ExecOptions`.
//! Defaults:
//! - config file: the discovered file, else `sourcehawk.yml`
//! - output: `human`
//! - `fail_on_warnings`: false
//! - repository: the local working tree
//!
//! Overrides precedence: CLI > discovered file > defaults. Tokens for remote
//! repositories fall back to `GITHUB_TOKEN` / `BITBUCKET_TOKEN`.

use crate::configuration::ConfigurationResolver;
use crate::error::EngineError;
use crate::models::configuration::Configuration;
use crate::repository::{
    HttpTransport, LocalRepository, Provider, RemoteRef, RemoteRepository, RepositoryAccess,
    ReqwestTransport,
};
use crate::scan::ScanSettings;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "sourcehawk.yml";
const CONFIG_FILE_NAMES: [&str; 3] = ["sourcehawk.yml", "sourcehawk.yaml", "sourcehawk.toml"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Human,
    Json,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(OutputMode::Human),
            "json" => Ok(OutputMode::Json),
            other => Err(format!("unknown output mode [{other}], expected human|json")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Where repository files are read from.
pub enum RepositorySource {
    #[default]
    Local,
    Remote {
        provider: Provider,
        coordinates: String,
        token: Option<String>,
    },
}

#[derive(Debug, Clone)]
/// Fully-resolved options used by commands after applying precedence.
pub struct ExecOptions {
    pub repo_root: PathBuf,
    pub config_location: String,
    /// Whether the config location was given or discovered rather than defaulted.
    pub config_explicit: bool,
    pub output: OutputMode,
    pub fail_on_warnings: bool,
    pub tags: Vec<String>,
    pub source: RepositorySource,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            config_location: DEFAULT_CONFIG_FILE.to_string(),
            config_explicit: false,
            output: OutputMode::Human,
            fail_on_warnings: false,
            tags: Vec::new(),
            source: RepositorySource::Local,
        }
    }
}

/// Repository access plus the effective configuration for one run.
pub struct Session {
    pub access: Box<dyn RepositoryAccess>,
    pub configuration: Configuration,
}

impl ExecOptions {
    pub fn settings(&self) -> ScanSettings {
        ScanSettings {
            fail_on_warnings: self.fail_on_warnings,
            tags: self.tags.clone(),
        }
    }

    pub fn transport(&self) -> Result<Arc<dyn HttpTransport>, EngineError> {
        let transport = ReqwestTransport::new().map_err(|e| EngineError::Repository(e.to_string()))?;
        Ok(Arc::new(transport))
    }

    pub fn open_repository(
        &self,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Box<dyn RepositoryAccess>, EngineError> {
        match &self.source {
            RepositorySource::Local => Ok(Box::new(LocalRepository::new(&self.repo_root))),
            RepositorySource::Remote {
                provider,
                coordinates,
                token,
            } => {
                let remote_ref = RemoteRef::parse(coordinates, provider.default_ref())?;
                debug!(?provider, ?remote_ref, "opening remote repository");
                Ok(Box::new(RemoteRepository::new(
                    provider,
                    &remote_ref,
                    token.as_deref(),
                    transport,
                )))
            }
        }
    }

    /// Configuration location for this run. A remote scan with the default
    /// file name reads the configuration from the remote repository.
    pub fn effective_config_location(&self, access: &dyn RepositoryAccess) -> String {
        match self.source {
            RepositorySource::Remote { .. } if !self.config_explicit => {
                access.absolute_location(&self.config_location)
            }
            _ => self.config_location.clone(),
        }
    }

    pub fn resolver(&self, transport: Arc<dyn HttpTransport>) -> ConfigurationResolver {
        ConfigurationResolver::new(&self.repo_root, transport)
    }

    /// Open the repository and resolve the configuration.
    pub fn open(&self) -> Result<Session, EngineError> {
        let transport = self.transport()?;
        let access = self.open_repository(transport.clone())?;
        let location = self.effective_config_location(access.as_ref());
        let configuration = self.resolver(transport).resolve(&location)?;
        debug!(location = %location, protocols = configuration.rules.len(), "configuration ready");
        Ok(Session {
            access,
            configuration,
        })
    }
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `sourcehawk.yml|yaml|toml` or a `.git` entry is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if discover_config_file(cur).is_some() || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// First known configuration file present in `root`.
pub fn discover_config_file(root: &Path) -> Option<&'static str> {
    CONFIG_FILE_NAMES
        .into_iter()
        .find(|name| root.join(name).is_file())
}

#[derive(Debug, Clone, Default)]
/// Raw CLI values before precedence is applied.
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub config_file: Option<String>,
    pub output: Option<String>,
    pub fail_on_warnings: bool,
    pub tags: Vec<String>,
    pub github: Option<String>,
    pub github_enterprise_url: Option<String>,
    pub bitbucket: Option<String>,
    pub bitbucket_url: Option<String>,
    pub url_template: Option<String>,
    pub coordinates: Option<String>,
    pub token: Option<String>,
}

fn env_token(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|t| !t.trim().is_empty())
}

fn repository_source(cli: &CliOverrides) -> Result<RepositorySource, EngineError> {
    let chosen = [
        cli.github.is_some(),
        cli.bitbucket.is_some(),
        cli.url_template.is_some(),
    ]
    .iter()
    .filter(|c| **c)
    .count();
    // Remote providers are mutually exclusive
    if chosen > 1 {
        return Err(EngineError::Usage(
            "choose at most one of --github, --bitbucket, --url-template".into(),
        ));
    }

    if let Some(coordinates) = &cli.github {
        return Ok(RepositorySource::Remote {
            provider: Provider::Github {
                enterprise_url: cli.github_enterprise_url.clone(),
            },
            coordinates: coordinates.clone(),
            token: cli.token.clone().or_else(|| env_token("GITHUB_TOKEN")),
        });
    }
    if let Some(coordinates) = &cli.bitbucket {
        return Ok(RepositorySource::Remote {
            provider: Provider::Bitbucket {
                server_url: cli.bitbucket_url.clone(),
            },
            coordinates: coordinates.clone(),
            token: cli.token.clone().or_else(|| env_token("BITBUCKET_TOKEN")),
        });
    }
    if let Some(template) = &cli.url_template {
        let coordinates = cli.coordinates.clone().ok_or_else(|| {
            EngineError::Usage("--url-template requires --coordinates".into())
        })?;
        return Ok(RepositorySource::Remote {
            provider: Provider::UrlTemplate(template.clone()),
            coordinates,
            // no conventional env var for custom hosts
            token: cli.token.clone(),
        });
    }
    Ok(RepositorySource::Local)
}

/// Resolve `ExecOptions` by merging CLI flags, discovery, and defaults.
pub fn resolve(cli: &CliOverrides) -> Result<ExecOptions, EngineError> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    // Fall back to the path as given when it cannot be canonicalized
    let start = start.canonicalize().unwrap_or(start);
    let repo_root = detect_repo_root(&start);

    let (config_location, config_explicit) = match (&cli.config_file, discover_config_file(&repo_root)) {
        (Some(given), _) => (given.clone(), true),
        // a discovered file counts as explicit for remote runs too
        (None, Some(found)) => (found.to_string(), true),
        (None, None) => (DEFAULT_CONFIG_FILE.to_string(), false),
    };

    let output = match cli.output.as_deref() {
        Some(s) => s.parse().map_err(EngineError::Usage)?,
        None => OutputMode::default(),
    };

    Ok(ExecOptions {
        repo_root,
        config_location,
        config_explicit,
        output,
        fail_on_warnings: cli.fail_on_warnings,
        tags: cli.tags.clone(),
        source: repository_source(cli)?,
    })
}
