//! StreamDebrid - debrid provider adapters for torrent streaming
//!
//! Checks whether torrents are cached on a debrid service and turns files
//! inside them into direct, authenticated HTTP links.
//!
//! # Modules
//!
//! - `models` - Torrent and file descriptors, provider descriptors
//! - `debrid` - Provider trait, Real-Debrid and Torbox clients, Hybrid composer
//! - `config` - Config file and credential loading
//! - `logging` - Tracing subscriber setup
//! - `cli` / `commands` - Scriptable command line surface

pub mod models;
pub mod debrid;
pub mod config;
pub mod logging;
pub mod cli;
pub mod commands;

// Re-export commonly used types
pub use models::{CachedSet, ConfigField, DebridFile, FieldType, HelpLink, ProviderDescriptor, Torrent};

pub use debrid::{
    Credentials, DebridError, DebridProvider, Hybrid, PollPolicy, ProviderKind, RealDebrid, Torbox,
};
pub use config::Config;
