//! CLI - Command Line Interface for StreamDebrid
//!
//! Every provider operation is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Which hashes are instantly available?
//! streamdebrid check 0123456789abcdef0123456789abcdef01234567 --json
//!
//! # List files, then resolve one to a direct URL
//! streamdebrid files "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567"
//! streamdebrid resolve 1234:5
//!
//! # Or resolve the largest file of a torrent in one step
//! streamdebrid resolve 0123456789abcdef0123456789abcdef01234567
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::debrid::{DebridError, ProviderKind};
use crate::logging::LogLevel;
use crate::models::{canonical_hash, hash_from_magnet, is_valid_hash, magnet_from_hash};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments or configuration
    InvalidArgs = 2,
    /// Network or provider error
    NetworkError = 3,
    /// Content still processing on the provider
    NotReady = 4,
    /// API key rejected
    ExpiredCredential = 5,
    /// Torrent files could not be listed in time
    FilesUnavailable = 6,
    /// Provider does not support the operation
    Unsupported = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&DebridError> for ExitCode {
    fn from(err: &DebridError) -> Self {
        match err {
            DebridError::NotReady => ExitCode::NotReady,
            DebridError::ExpiredCredential => ExitCode::ExpiredCredential,
            DebridError::FilesUnavailable { .. } => ExitCode::FilesUnavailable,
            DebridError::UnsupportedOperation { .. } => ExitCode::Unsupported,
            DebridError::Provider { .. } | DebridError::Http(_) => ExitCode::NetworkError,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// StreamDebrid - debrid cache checks and direct links
#[derive(Parser, Debug)]
#[command(
    name = "streamdebrid",
    version,
    author = "Gorka & Hermes",
    about = "Check debrid caches and resolve direct download links",
    long_about = "Queries Real-Debrid, Torbox, or both (hybrid) for cached torrents \
                  and turns files inside them into direct HTTP links.",
    after_help = "EXAMPLES:\n\
                  streamdebrid check <hash> <hash>        Check which hashes are cached\n\
                  streamdebrid files <hash|magnet>        List files in a torrent\n\
                  streamdebrid resolve 1234:5             Get a direct link for a file\n\
                  streamdebrid resolve <hash|magnet>      Direct link to the largest file\n\
                  streamdebrid providers --json           Describe supported providers"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Provider override (realdebrid, torbox, hybrid)
    #[arg(long, short = 'p', global = true, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check which torrents are cached
    #[command(visible_alias = "c")]
    Check(CheckCmd),

    /// List files inside a torrent
    #[command(visible_alias = "f")]
    Files(FilesCmd),

    /// Resolve a file id or torrent to a direct download URL
    #[command(visible_alias = "r")]
    Resolve(ResolveCmd),

    /// Show download progress of torrents in the account
    Progress(ProgressCmd),

    /// Print the per-account cache partition key
    UserHash(UserHashCmd),

    /// Describe the supported providers
    Providers(ProvidersCmd),
}

/// Check which info hashes are cached on the provider
#[derive(Args, Debug)]
pub struct CheckCmd {
    /// Info hashes (40 hex characters)
    #[arg(required = true, num_args = 1..)]
    pub hashes: Vec<String>,
}

/// List files of a torrent by info hash or magnet link
#[derive(Args, Debug)]
pub struct FilesCmd {
    /// Info hash or magnet link
    #[arg(required = true)]
    pub source: String,

    /// Upload this .torrent file instead of a magnet
    #[arg(long)]
    pub torrent_file: Option<PathBuf>,
}

impl FilesCmd {
    /// Parse the source into an info hash and optional magnet
    pub fn target(&self) -> Result<FilesTarget, &'static str> {
        parse_files_target(&self.source)
    }
}

/// What `files` should list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesTarget {
    Hash(String),
    Magnet { magnet: String, hash: String },
}

impl FilesTarget {
    pub fn hash(&self) -> &str {
        match self {
            FilesTarget::Hash(hash) => hash,
            FilesTarget::Magnet { hash, .. } => hash,
        }
    }

    /// Magnet as given, or a bare one built from the hash
    pub fn magnet(&self) -> String {
        match self {
            FilesTarget::Hash(hash) => magnet_from_hash(hash),
            FilesTarget::Magnet { magnet, .. } => magnet.clone(),
        }
    }
}

/// Resolve a provider file id (`torrentId:fileId`), info hash or magnet to a URL
#[derive(Args, Debug)]
pub struct ResolveCmd {
    /// File id from `files` output, or an info hash / magnet to resolve its largest file
    #[arg(required = true)]
    pub target: String,
}

impl ResolveCmd {
    pub fn target(&self) -> Result<ResolveTarget, &'static str> {
        parse_resolve_target(&self.target)
    }
}

/// What `resolve` should turn into a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveTarget {
    /// A file id issued by the configured provider
    File(String),
    /// A whole torrent; its largest file is resolved
    Torrent(FilesTarget),
}

/// Show download progress for info hashes
#[derive(Args, Debug)]
pub struct ProgressCmd {
    #[arg(required = true, num_args = 1..)]
    pub hashes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UserHashCmd {}

#[derive(Args, Debug)]
pub struct ProvidersCmd {}

// =============================================================================
// Input Validation
// =============================================================================

/// Validate and canonicalize an info hash
pub fn validate_hash(hash: &str) -> Result<String, &'static str> {
    let hash = canonical_hash(hash);
    if is_valid_hash(&hash) {
        Ok(hash)
    } else {
        Err("Invalid info hash (expected 40 hex characters)")
    }
}

/// Accept a bare info hash or a magnet link carrying one
pub fn parse_files_target(source: &str) -> Result<FilesTarget, &'static str> {
    let source = source.trim();
    if source.starts_with("magnet:") {
        let hash = hash_from_magnet(source).ok_or("Magnet link has no xt=urn:btih: hash")?;
        return Ok(FilesTarget::Magnet {
            magnet: source.to_string(),
            hash,
        });
    }
    validate_hash(source).map(FilesTarget::Hash)
}

/// Magnets and info hashes resolve a torrent, anything else must be a file id
pub fn parse_resolve_target(source: &str) -> Result<ResolveTarget, &'static str> {
    let source = source.trim();
    if source.starts_with("magnet:") || is_valid_hash(&canonical_hash(source)) {
        return parse_files_target(source).map(ResolveTarget::Torrent);
    }
    validate_file_id(source)
        .map(|id| ResolveTarget::File(id.to_string()))
        .map_err(|_| "Invalid resolve target (expected torrentId:fileId, info hash or magnet)")
}

/// Validate a `torrentId:fileId` pair
pub fn validate_file_id(id: &str) -> Result<&str, &'static str> {
    match id.split_once(':') {
        Some((t, f)) if !t.is_empty() && !f.is_empty() => Ok(id),
        _ => Err("Invalid file id (expected torrentId:fileId)"),
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Resolved download link
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// File id, info hash or magnet as requested
    pub target: String,
    pub url: String,
}

/// User hash response
#[derive(Debug, Serialize, Deserialize)]
pub struct UserHashResponse {
    pub provider: String,
    pub user_hash: String,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print a list: JSON envelope, or one `Display` line per item on a terminal
    pub fn list<T: Serialize + std::fmt::Display>(&self, items: &[T]) -> anyhow::Result<()> {
        if self.json {
            return self.print(items);
        }
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print a provider error with its mapped exit code
    pub fn debrid_error(&self, context: &str, err: &DebridError) -> ExitCode {
        self.error(format!("{}: {}", context, err), ExitCode::from(err))
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}
