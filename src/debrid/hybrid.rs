//! Hybrid provider
//!
//! Composes a primary and a secondary provider. Cache checks run against
//! both concurrently and merge; everything else tries the primary first and
//! falls back to the secondary only when the primary fails.

use async_trait::async_trait;
use std::collections::HashMap;

use super::error::Result;
use super::{Credentials, DebridProvider, PollPolicy, RealDebrid, Torbox};
use crate::models::{CachedSet, ConfigField, DebridFile, FieldType, HelpLink, ProviderDescriptor, Torrent};

/// Appended to the primary's user hash to keep hybrid cache entries apart
pub const USER_HASH_SUFFIX: &str = "_hybrid";

pub static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    id: "hybrid",
    name: "Hybrid (RD + Torbox)",
    short_name: "HY",
    config_fields: &[
        ConfigField {
            field_type: FieldType::Text,
            name: "rdApiKey",
            label: "Real-Debrid API Key",
            required: true,
            href: Some(HelpLink {
                value: "https://real-debrid.com/apitoken",
                label: "Get RD Key",
            }),
        },
        ConfigField {
            field_type: FieldType::Text,
            name: "tbApiKey",
            label: "Torbox API Key",
            required: true,
            href: Some(HelpLink {
                value: "https://torbox.app/settings",
                label: "Get Torbox Key",
            }),
        },
    ],
};

/// Primary/secondary provider composition
#[derive(Debug)]
pub struct Hybrid {
    primary: Box<dyn DebridProvider>,
    secondary: Box<dyn DebridProvider>,
}

impl Hybrid {
    /// Compose any two providers
    pub fn new(primary: Box<dyn DebridProvider>, secondary: Box<dyn DebridProvider>) -> Self {
        Self { primary, secondary }
    }

    /// Real-Debrid as primary, Torbox as secondary
    pub fn realdebrid_torbox(rd: Credentials, tb: Credentials, poll: PollPolicy) -> Self {
        Self::new(
            Box::new(RealDebrid::new(rd).with_poll_policy(poll)),
            Box::new(Torbox::new(tb).with_poll_policy(poll)),
        )
    }

    pub fn primary(&self) -> &dyn DebridProvider {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> &dyn DebridProvider {
        self.secondary.as_ref()
    }
}

#[async_trait]
impl DebridProvider for Hybrid {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn check_cached(&self, torrents: &[Torrent]) -> CachedSet {
        let (primary, secondary) = tokio::join!(
            self.primary.check_cached(torrents),
            self.secondary.check_cached(torrents)
        );

        tracing::debug!(
            primary = primary.len(),
            secondary = secondary.len(),
            "hybrid cache check"
        );

        let mut cached = primary;
        cached.extend(secondary);
        cached
    }

    async fn files_from_magnet(&self, magnet: &str, hash: &str) -> Result<Vec<DebridFile>> {
        match self.primary.files_from_magnet(magnet, hash).await {
            Ok(files) => Ok(files),
            Err(e) => {
                log_fallback(self.primary.as_ref(), self.secondary.as_ref(), "files_from_magnet", &e);
                self.secondary.files_from_magnet(magnet, hash).await
            }
        }
    }

    async fn files_from_hash(&self, hash: &str) -> Result<Vec<DebridFile>> {
        match self.primary.files_from_hash(hash).await {
            Ok(files) => Ok(files),
            Err(e) => {
                log_fallback(self.primary.as_ref(), self.secondary.as_ref(), "files_from_hash", &e);
                self.secondary.files_from_hash(hash).await
            }
        }
    }

    async fn files_from_buffer(&self, torrent_file: &[u8], hash: &str) -> Result<Vec<DebridFile>> {
        match self.primary.files_from_buffer(torrent_file, hash).await {
            Ok(files) => Ok(files),
            Err(e) => {
                log_fallback(self.primary.as_ref(), self.secondary.as_ref(), "files_from_buffer", &e);
                self.secondary.files_from_buffer(torrent_file, hash).await
            }
        }
    }

    async fn torrent_progress(&self, torrents: &[Torrent]) -> Result<HashMap<String, f32>> {
        let (primary, secondary) = tokio::join!(
            self.primary.torrent_progress(torrents),
            self.secondary.torrent_progress(torrents)
        );

        // Primary wins on conflicts
        let mut progress = secondary.unwrap_or_default();
        progress.extend(primary.unwrap_or_default());
        Ok(progress)
    }

    async fn resolve_download_url(&self, file: &DebridFile) -> Result<String> {
        match self.primary.resolve_download_url(file).await {
            Ok(url) => Ok(url),
            Err(e) => {
                log_fallback(self.primary.as_ref(), self.secondary.as_ref(), "resolve_download_url", &e);
                self.secondary.resolve_download_url(file).await
            }
        }
    }

    /// Each provider lists and resolves the magnet with its own file ids
    async fn resolve_magnet(&self, magnet: &str, hash: &str) -> Result<String> {
        match self.primary.resolve_magnet(magnet, hash).await {
            Ok(url) => Ok(url),
            Err(e) => {
                log_fallback(self.primary.as_ref(), self.secondary.as_ref(), "resolve_magnet", &e);
                self.secondary.resolve_magnet(magnet, hash).await
            }
        }
    }

    /// Derived from the primary credential only.
    ///
    /// Treat it as an opaque cache partition key; it says nothing about the
    /// secondary account.
    fn user_hash(&self) -> String {
        format!("{}{}", self.primary.user_hash(), USER_HASH_SUFFIX)
    }
}

fn log_fallback(
    primary: &dyn DebridProvider,
    secondary: &dyn DebridProvider,
    operation: &str,
    error: &super::DebridError,
) {
    tracing::info!(
        operation,
        primary = primary.descriptor().short_name,
        secondary = secondary.descriptor().short_name,
        error = %error,
        "primary provider failed, falling back"
    );
}
