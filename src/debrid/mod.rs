//! Debrid provider adapters
//!
//! - RealDebrid: `api.real-debrid.com` REST API
//! - Torbox: `api.torbox.app` REST API
//! - Hybrid: two providers composed with priority fallback

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::models::{magnet_from_hash, CachedSet, DebridFile, ProviderDescriptor, Torrent};

pub mod error;
pub mod hybrid;
pub mod poll;
pub mod realdebrid;
pub mod torbox;

pub use error::{DebridError, Result};
pub use hybrid::Hybrid;
pub use poll::PollPolicy;
pub use realdebrid::RealDebrid;
pub use torbox::Torbox;

/// Maximum hashes per cache-check request
pub const CACHE_CHECK_BATCH: usize = 50;

/// Capability surface shared by every debrid provider
#[async_trait]
pub trait DebridProvider: Send + Sync + fmt::Debug {
    /// Static metadata for credential-entry UIs
    fn descriptor(&self) -> &'static ProviderDescriptor;

    /// Hashes among `torrents` that are cached on the provider.
    ///
    /// Never fails: a failed batch contributes no hits.
    async fn check_cached(&self, torrents: &[Torrent]) -> CachedSet;

    /// Add a magnet and list the files once the provider exposes them.
    ///
    /// # Errors
    /// - `DebridError::FilesUnavailable` - polling budget exhausted
    /// - `DebridError::ExpiredCredential` - credential rejected
    /// - `DebridError::Provider` - any other provider failure
    async fn files_from_magnet(&self, magnet: &str, hash: &str) -> Result<Vec<DebridFile>>;

    /// Same as [`files_from_magnet`](Self::files_from_magnet) with a bare magnet built from `hash`
    async fn files_from_hash(&self, hash: &str) -> Result<Vec<DebridFile>> {
        self.files_from_magnet(&magnet_from_hash(hash), hash).await
    }

    /// Upload a raw `.torrent` file and list its files
    async fn files_from_buffer(&self, torrent_file: &[u8], hash: &str) -> Result<Vec<DebridFile>>;

    /// Download progress (0-100) of torrents already in the account library.
    ///
    /// Hashes the account does not hold are absent from the map. Unlike
    /// [`check_cached`](Self::check_cached), request failures are returned.
    async fn torrent_progress(&self, _torrents: &[Torrent]) -> Result<HashMap<String, f32>> {
        Ok(HashMap::new())
    }

    /// Request a direct download URL for a file listed by this provider.
    ///
    /// # Errors
    /// - `DebridError::NotReady` - content still processing, retry later
    /// - `DebridError::ExpiredCredential` - HTTP 401/403
    /// - `DebridError::Provider` - any other failure
    async fn resolve_download_url(&self, file: &DebridFile) -> Result<String>;

    /// Add a magnet and resolve its largest file, usually the main video.
    ///
    /// # Errors
    /// - `DebridError::FilesUnavailable` - the torrent lists no files
    /// - anything [`files_from_magnet`](Self::files_from_magnet) or
    ///   [`resolve_download_url`](Self::resolve_download_url) returns
    async fn resolve_magnet(&self, magnet: &str, hash: &str) -> Result<String> {
        let files = self.files_from_magnet(magnet, hash).await?;
        let largest = files
            .iter()
            .max_by_key(|f| f.size)
            .ok_or_else(|| DebridError::FilesUnavailable {
                hash: hash.to_string(),
            })?;

        tracing::debug!(file = %largest, hash, "resolving largest file");
        self.resolve_download_url(largest).await
    }

    /// Opaque per-account cache partition key
    fn user_hash(&self) -> String;
}

/// Account credential and account-scoped parameters, fixed at construction
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    ip: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ip: None,
        }
    }

    /// Client IP forwarded to providers that scope links by address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        let ip = ip.into();
        self.ip = (!ip.is_empty()).then_some(ip);
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Hex MD5 of the API key
    pub fn key_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.api_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("ip", &self.ip)
            .finish()
    }
}

/// Provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "realdebrid", alias = "rd")]
    RealDebrid,
    #[value(alias = "tb")]
    Torbox,
    #[default]
    #[value(alias = "hy")]
    Hybrid,
}

impl ProviderKind {
    pub fn descriptor(self) -> &'static ProviderDescriptor {
        match self {
            ProviderKind::RealDebrid => &realdebrid::DESCRIPTOR,
            ProviderKind::Torbox => &torbox::DESCRIPTOR,
            ProviderKind::Hybrid => &hybrid::DESCRIPTOR,
        }
    }

    pub fn all() -> [ProviderKind; 3] {
        [ProviderKind::RealDebrid, ProviderKind::Torbox, ProviderKind::Hybrid]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor().id)
    }
}

/// Split requested hashes into canonical, deduplicated batches
pub(crate) fn hash_batches(torrents: &[Torrent]) -> Vec<Vec<String>> {
    let mut seen = CachedSet::new();
    let hashes: Vec<String> = torrents
        .iter()
        .map(|t| crate::models::canonical_hash(&t.hash))
        .filter(|h| !h.is_empty() && seen.insert(h.clone()))
        .collect();

    hashes
        .chunks(CACHE_CHECK_BATCH)
        .map(|chunk| chunk.to_vec())
        .collect()
}
