//! CLI argument parsing via `clap`.

use crate::config::CliOverrides;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sourcehawk",
    version,
    about = "Sourcehawk: repository compliance as code",
    long_about = "Sourcehawk: scan a repository against declarative file protocols and fix what can be fixed.\n\nConfiguration precedence: CLI > discovered sourcehawk.yml|yaml|toml > defaults.",
    after_help = "Examples:\n  sourcehawk scan\n  sourcehawk scan --config-file base.yml --fail-on-warnings --output json\n  sourcehawk scan --github acme/widgets@main\n  sourcehawk fix --dry-run\n  sourcehawk validate-config\n  sourcehawk flatten-config",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Clone, Default)]
/// Options shared by every command that reads configuration.
pub struct CommonArgs {
    #[arg(long, help = "Repository root (default: detected from current dir)")]
    pub repo_root: Option<String>,
    #[arg(short = 'c', long, help = "Configuration file path or URL (default: sourcehawk.yml)")]
    pub config_file: Option<String>,
    #[arg(long, help = "Output mode: human|json (default: human)")]
    pub output: Option<String>,
    #[arg(long, help = "Read files from GitHub: namespace/repository[@ref]")]
    pub github: Option<String>,
    #[arg(long, requires = "github", help = "GitHub Enterprise base URL")]
    pub github_enterprise_url: Option<String>,
    #[arg(long, help = "Read files from Bitbucket: namespace/repository[@ref]")]
    pub bitbucket: Option<String>,
    #[arg(long, requires = "bitbucket", help = "Bitbucket server base URL")]
    pub bitbucket_url: Option<String>,
    #[arg(long, help = "Raw file URL with {namespace}, {repository}, {ref} and {path}")]
    pub url_template: Option<String>,
    #[arg(long, requires = "url_template", help = "Coordinates for --url-template")]
    pub coordinates: Option<String>,
    #[arg(long, help = "Access token (default: GITHUB_TOKEN / BITBUCKET_TOKEN)")]
    pub token: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
/// Protocol selection options for scan and fix.
pub struct SelectionArgs {
    #[arg(long, action = clap::ArgAction::SetTrue, help = "Fail the scan on WARNING outcomes")]
    pub fail_on_warnings: bool,
    #[arg(long = "tag", help = "Only protocols carrying this tag (repeatable)")]
    pub tags: Vec<String>,
}

impl CommonArgs {
    pub fn overrides(&self, selection: Option<&SelectionArgs>) -> CliOverrides {
        CliOverrides {
            repo_root: self.repo_root.clone(),
            config_file: self.config_file.clone(),
            output: self.output.clone(),
            fail_on_warnings: selection.is_some_and(|s| s.fail_on_warnings),
            tags: selection.map(|s| s.tags.clone()).unwrap_or_default(),
            github: self.github.clone(),
            github_enterprise_url: self.github_enterprise_url.clone(),
            bitbucket: self.bitbucket.clone(),
            bitbucket_url: self.bitbucket_url.clone(),
            url_template: self.url_template.clone(),
            coordinates: self.coordinates.clone(),
            token: self.token.clone(),
        }
    }
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current sourcehawk version.")]
    Version,
    /// Scan the repository
    #[command(
        about = "Scan the repository",
        long_about = "Evaluate every required file protocol against the repository. ERROR outcomes fail the scan; WARNING outcomes fail it only with --fail-on-warnings.",
        after_help = "Examples:\n  sourcehawk scan\n  sourcehawk scan --tag docs --output json"
    )]
    Scan {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Fix the repository
    #[command(
        about = "Fix the repository",
        long_about = "Apply the resolutions of fixable enforcers and write the results. Only local repositories can be written.",
        after_help = "Examples:\n  sourcehawk fix\n  sourcehawk fix --dry-run"
    )]
    Fix {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Report fixes without writing files")]
        dry_run: bool,
    },
    /// Validate a configuration document
    #[command(
        about = "Validate configuration",
        long_about = "Parse the configuration document and compile every enforcer without following includes."
    )]
    ValidateConfig {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the effective configuration
    #[command(
        about = "Flatten configuration",
        long_about = "Resolve all config-locations and print the merged configuration as YAML."
    )]
    FlattenConfig {
        #[command(flatten)]
        common: CommonArgs,
    },
}
