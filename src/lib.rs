//! Sourcehawk core library.
//!
//! This crate exposes programmatic APIs for scanning and fixing repositories
//! against declarative file protocols loaded from YAML or TOML documents.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and execution option resolution.
//! - `configuration`: Loading, include resolution and merging of documents.
//! - `enforcer`: Built-in enforcers and the alias registry.
//! - `repository`: Local and remote repository file access.
//! - `scan` / `fix`: The two engine entry points.
//! - `result`: Scan and fix verdicts with their combine algebra.
//! - `validate`: Static validation of one configuration document.
//! - `output`: Human/JSON printers.
//! - `models`, `error`, `status`, `logging`, `utils`: Supporting pieces.
pub mod cli;
pub mod config;
pub mod configuration;
pub mod enforcer;
pub mod error;
pub mod fix;
pub mod logging;
pub mod models;
pub mod output;
pub mod repository;
pub mod result;
pub mod scan;
pub mod status;
pub mod utils;
pub mod validate;
