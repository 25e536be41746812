//! Data structures shared by the debrid adapters
//!
//! Organized by domain:
//! - **Torrents**: info-hash descriptors and magnet helpers
//! - **Files**: provider-issued file descriptors
//! - **Descriptors**: static provider metadata for credential-entry UIs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Torrent Models
// =============================================================================

/// Deduplicated set of info hashes confirmed cached on a provider
pub type CachedSet = BTreeSet<String>;

/// Prefix of a bare BitTorrent v1 magnet URI
pub const MAGNET_PREFIX: &str = "magnet:?xt=urn:btih:";

/// A torrent identified by its info hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Torrent {
    /// Lowercase hex info hash
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Torrent {
    /// Create a torrent descriptor, canonicalizing the hash to lowercase
    pub fn new(hash: impl AsRef<str>) -> Self {
        Self {
            hash: canonical_hash(hash.as_ref()),
            name: None,
            size: None,
        }
    }

    /// Bare magnet URI for this torrent
    pub fn magnet(&self) -> String {
        magnet_from_hash(&self.hash)
    }
}

/// Lowercase and trim an info hash
pub fn canonical_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

/// Check for a 40-character hex info hash
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Build a bare magnet URI (`magnet:?xt=urn:btih:<hash>`)
pub fn magnet_from_hash(hash: &str) -> String {
    format!("{}{}", MAGNET_PREFIX, hash)
}

/// Extract the info hash from a magnet URI's `xt=urn:btih:` parameter
pub fn hash_from_magnet(magnet: &str) -> Option<String> {
    let query = magnet.strip_prefix("magnet:?")?;
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("xt="))
        .find_map(|xt| {
            let decoded = urlencoding::decode(xt).ok()?;
            let lower = decoded.to_ascii_lowercase();
            lower
                .strip_prefix("urn:btih:")
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        })
}

// =============================================================================
// File Models
// =============================================================================

/// A file inside a torrent, as listed by one provider
///
/// `id` is a provider-specific `"<torrentId>:<fileId>"` pair and is only
/// meaningful to the provider that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebridFile {
    pub name: String,
    pub size: u64,
    pub id: String,
    /// Empty until resolved
    #[serde(default)]
    pub url: String,
    pub ready: bool,
}

impl DebridFile {
    /// Create a listed file with an optimistic ready flag
    pub fn listed(name: impl Into<String>, size: u64, torrent_id: impl fmt::Display, file_id: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            size,
            id: format!("{}:{}", torrent_id, file_id),
            url: String::new(),
            ready: true,
        }
    }

    /// Split the composite id into `(torrent_id, file_id)`
    pub fn id_parts(&self) -> Option<(&str, &str)> {
        let (torrent_id, file_id) = self.id.split_once(':')?;
        if torrent_id.is_empty() || file_id.is_empty() {
            return None;
        }
        Some((torrent_id, file_id))
    }

    /// Format size for display
    pub fn format_size(&self) -> String {
        let bytes = self.size;
        if bytes >= 1024 * 1024 * 1024 {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        } else if bytes >= 1024 * 1024 {
            format!("{:.0} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{} KB", bytes / 1024)
        }
    }
}

impl fmt::Display for DebridFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.name, self.format_size(), self.id)
    }
}

// =============================================================================
// Provider Descriptors
// =============================================================================

/// Input type of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
}

/// Link shown next to a configuration field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpLink {
    pub value: &'static str,
    pub label: &'static str,
}

/// A credential field the host application must collect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<HelpLink>,
}

/// Static description of a provider for credential-entry UIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub config_fields: &'static [ConfigField],
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.name, self.short_name, self.id)
    }
}
