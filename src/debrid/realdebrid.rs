//! Real-Debrid API client
//!
//! API docs: https://api.real-debrid.com

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::error::{DebridError, Result};
use super::poll::PollPolicy;
use super::{hash_batches, Credentials, DebridProvider};
use crate::models::{CachedSet, ConfigField, DebridFile, FieldType, HelpLink, ProviderDescriptor, Torrent};

const PROVIDER: &str = "Real-Debrid";

pub const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Entries per `/torrents` page
const PROGRESS_PAGE_SIZE: u32 = 100;

/// Library pages scanned before giving up on missing hashes
const MAX_PROGRESS_PAGES: u32 = 10;

pub static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    id: "realdebrid",
    name: "Real-Debrid",
    short_name: "RD",
    config_fields: &[ConfigField {
        field_type: FieldType::Text,
        name: "debridApiKey",
        label: "Real-Debrid API Key",
        required: true,
        href: Some(HelpLink {
            value: "https://real-debrid.com/apitoken",
            label: "Get API Key Here",
        }),
    }],
};

#[derive(Debug, Deserialize)]
struct AddResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    #[serde(default)]
    status: String,
    #[serde(default)]
    files: Vec<FileRaw>,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileRaw {
    id: u64,
    path: String,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    selected: u8,
}

#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    download: String,
}

#[derive(Debug, Deserialize)]
struct TorrentSummary {
    hash: String,
    #[serde(default)]
    progress: f32,
}

/// Torrent status as reported by `/torrents/info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorrentStatus {
    WaitingFilesSelection,
    Downloaded,
    InProgress,
    Failed,
}

impl TorrentStatus {
    fn parse(status: &str) -> Self {
        match status {
            "waiting_files_selection" => TorrentStatus::WaitingFilesSelection,
            "downloaded" => TorrentStatus::Downloaded,
            "magnet_error" | "error" | "virus" | "dead" => TorrentStatus::Failed,
            _ => TorrentStatus::InProgress,
        }
    }
}

/// Real-Debrid debrid client
pub struct RealDebrid {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
    poll: PollPolicy,
}

impl RealDebrid {
    /// Create a client against the public Real-Debrid API
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            poll: PollPolicy::default(),
        }
    }

    /// Replace the file-listing poll policy
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.credentials.api_key()))
            .header("Accept", "application/json")
    }

    /// Form body with the account IP appended when configured
    fn form<'a>(&'a self, fields: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut form = fields.to_vec();
        if let Some(ip) = self.credentials.ip() {
            form.push(("ip", ip));
        }
        form
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(%status, "Real-Debrid rejected the API key");
            return Err(DebridError::ExpiredCredential);
        }

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Real-Debrid API error: {}", status.as_u16()));
            tracing::warn!(%status, %message, "Real-Debrid request failed");
            return Err(DebridError::provider(PROVIDER, message));
        }

        serde_json::from_value(body)
            .map_err(|e| DebridError::provider(PROVIDER, format!("Invalid response: {}", e)))
    }

    async fn check_batch(&self, batch: &[String]) -> Result<Vec<String>> {
        let path = format!("/torrents/instantAvailability/{}", batch.join("/"));
        let body: Value = self.send(self.request(Method::GET, &path)).await?;
        Ok(available_hashes(&body, batch))
    }

    async fn torrent_info(&self, torrent_id: &str) -> Result<TorrentInfo> {
        let path = format!("/torrents/info/{}", torrent_id);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn torrent_files(&self, torrent_id: &str) -> Result<Option<Vec<FileRaw>>> {
        let info = self.torrent_info(torrent_id).await?;
        Ok(Some(info.files).filter(|files| !files.is_empty()))
    }

    async fn list_files(&self, torrent_id: &str, hash: &str) -> Result<Vec<DebridFile>> {
        let files = self
            .poll
            .run(|_| self.torrent_files(torrent_id))
            .await?
            .ok_or_else(|| DebridError::FilesUnavailable {
                hash: hash.to_string(),
            })?;

        Ok(files
            .into_iter()
            .map(|f| DebridFile::listed(f.path.trim_start_matches('/'), f.bytes, torrent_id, f.id))
            .collect())
    }
}

impl std::fmt::Debug for RealDebrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealDebrid")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("poll", &self.poll)
            .finish()
    }
}

#[async_trait]
impl DebridProvider for RealDebrid {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn check_cached(&self, torrents: &[Torrent]) -> CachedSet {
        let mut cached = CachedSet::new();

        for batch in hash_batches(torrents) {
            match self.check_batch(&batch).await {
                Ok(hits) => cached.extend(hits),
                Err(e) => {
                    tracing::warn!(error = %e, batch = batch.len(), "Real-Debrid cache check failed, skipping batch");
                }
            }
        }

        cached
    }

    async fn files_from_magnet(&self, magnet: &str, hash: &str) -> Result<Vec<DebridFile>> {
        let request = self
            .request(Method::POST, "/torrents/addMagnet")
            .form(&self.form(&[("magnet", magnet)]));
        let added: AddResponse = self.send(request).await?;
        tracing::debug!(torrent_id = %added.id, hash, "added magnet to Real-Debrid");

        self.list_files(&added.id, hash).await
    }

    async fn files_from_buffer(&self, torrent_file: &[u8], hash: &str) -> Result<Vec<DebridFile>> {
        let request = self
            .request(Method::PUT, "/torrents/addTorrent")
            .header("Content-Type", "application/x-bittorrent")
            .body(torrent_file.to_vec());
        let added: AddResponse = self.send(request).await?;
        tracing::debug!(torrent_id = %added.id, hash, "uploaded torrent file to Real-Debrid");

        self.list_files(&added.id, hash).await
    }

    async fn torrent_progress(&self, torrents: &[Torrent]) -> Result<HashMap<String, f32>> {
        let wanted: HashSet<String> = hash_batches(torrents).into_iter().flatten().collect();
        let mut progress = HashMap::new();
        if wanted.is_empty() {
            return Ok(progress);
        }

        for page in 1..=MAX_PROGRESS_PAGES {
            let request = self
                .request(Method::GET, "/torrents")
                .query(&[("page", page), ("limit", PROGRESS_PAGE_SIZE)]);
            // An exhausted library answers 204 with no body
            let list: Vec<TorrentSummary> = self.send::<Option<_>>(request).await?.unwrap_or_default();
            let full_page = list.len() >= PROGRESS_PAGE_SIZE as usize;

            progress.extend(
                list.into_iter()
                    .map(|t| (t.hash.to_ascii_lowercase(), t.progress))
                    .filter(|(hash, _)| wanted.contains(hash)),
            );

            if !full_page || progress.len() == wanted.len() {
                return Ok(progress);
            }
        }

        tracing::warn!(
            pages = MAX_PROGRESS_PAGES,
            found = progress.len(),
            wanted = wanted.len(),
            "Real-Debrid library larger than scanned pages, progress incomplete"
        );
        Ok(progress)
    }

    async fn resolve_download_url(&self, file: &DebridFile) -> Result<String> {
        let (torrent_id, file_id) = file
            .id_parts()
            .ok_or_else(|| DebridError::provider(PROVIDER, format!("Invalid file id '{}'", file.id)))?;

        let mut info = self.torrent_info(torrent_id).await?;

        if TorrentStatus::parse(&info.status) == TorrentStatus::WaitingFilesSelection {
            let path = format!("/torrents/selectFiles/{}", torrent_id);
            let request = self.request(Method::POST, &path).form(&[("files", file_id)]);
            let _: IgnoredAny = self.send(request).await?;
            info = self.torrent_info(torrent_id).await?;
        }

        match TorrentStatus::parse(&info.status) {
            TorrentStatus::Downloaded => {}
            TorrentStatus::Failed => {
                return Err(DebridError::provider(PROVIDER, format!("Torrent status: {}", info.status)));
            }
            _ => return Err(DebridError::NotReady),
        }

        let link = selected_link(&info, file_id)
            .ok_or_else(|| DebridError::provider(PROVIDER, format!("No link for file {}", file.id)))?;

        let request = self
            .request(Method::POST, "/unrestrict/link")
            .form(&self.form(&[("link", link)]));
        let unrestricted: UnrestrictResponse = self.send(request).await?;
        Ok(unrestricted.download)
    }

    fn user_hash(&self) -> String {
        self.credentials.key_hash()
    }
}

/// Hashes whose `rd` variant list is non-empty, limited to `requested`
fn available_hashes(body: &Value, requested: &[String]) -> Vec<String> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter(|(_, v)| {
            v.get("rd")
                .and_then(Value::as_array)
                .is_some_and(|variants| !variants.is_empty())
        })
        .map(|(k, _)| k.to_ascii_lowercase())
        .filter(|h| requested.contains(h))
        .collect()
}

/// Links are ordered like the selected files
fn selected_link<'a>(info: &'a TorrentInfo, file_id: &str) -> Option<&'a str> {
    let index = info
        .files
        .iter()
        .filter(|f| f.selected == 1)
        .position(|f| f.id.to_string() == file_id)?;
    info.links.get(index).map(String::as_str)
}
