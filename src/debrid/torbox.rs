//! Torbox API client
//!
//! Cache checks, magnet submission, file listing and download links.
//! API docs: https://api-docs.torbox.app

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use super::error::{DebridError, Result};
use super::poll::PollPolicy;
use super::{hash_batches, Credentials, DebridProvider};
use crate::models::{CachedSet, ConfigField, DebridFile, FieldType, HelpLink, ProviderDescriptor, Torrent};

const PROVIDER: &str = "Torbox";

pub const DEFAULT_BASE_URL: &str = "https://api.torbox.app/v1/api";

pub static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    id: "torbox",
    name: "Torbox",
    short_name: "TB",
    config_fields: &[ConfigField {
        field_type: FieldType::Text,
        name: "debridApiKey",
        label: "Torbox API Key",
        required: true,
        href: Some(HelpLink {
            value: "https://torbox.app/settings",
            label: "Get API Key Here",
        }),
    }],
};

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    data: Option<CreateData>,
}

#[derive(Debug, Deserialize)]
struct CreateData {
    torrent_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MyListResponse {
    data: Option<Vec<TorrentRaw>>,
}

#[derive(Debug, Deserialize)]
struct TorrentRaw {
    id: u64,
    files: Option<Vec<FileRaw>>,
}

#[derive(Debug, Deserialize)]
struct FileRaw {
    id: u64,
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct RequestDlResponse {
    #[serde(default)]
    success: bool,
    data: Option<String>,
    detail: Option<String>,
}

/// Torbox debrid client
pub struct Torbox {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
    poll: PollPolicy,
}

impl Torbox {
    /// Create a client against the public Torbox API
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

    /// Send a request and map HTTP failures onto the error taxonomy
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Non-JSON bodies are treated as an empty object
        let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default()));

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(%status, "Torbox rejected the API key");
            return Err(DebridError::ExpiredCredential);
        }

        if !status.is_success() {
            let detail = body.get("detail").and_then(Value::as_str);
            tracing::warn!(%status, detail, "Torbox request failed");
            return Err(detail_error(detail, || format!("Torbox API error: {}", status.as_u16())));
        }

        serde_json::from_value(body)
            .map_err(|e| DebridError::provider(PROVIDER, format!("Invalid response: {}", e)))
    }

    async fn check_batch(&self, batch: &[String]) -> Result<Vec<String>> {
        let request = self
            .request(Method::GET, "/torrents/checkcached")
            .query(&[("hash", batch.join(",").as_str()), ("format", "list")]);

        let body: Value = self.send(request).await?;
        Ok(cached_hashes(body.get("data").unwrap_or(&Value::Null), batch))
    }

    async fn create_torrent(&self, magnet: &str) -> Result<u64> {
        let form = reqwest::multipart::Form::new().text("magnet", magnet.to_string());
        let request = self.request(Method::POST, "/torrents/create").multipart(form);

        let response: CreateResponse = self.send(request).await?;
        match response.data.and_then(|d| d.torrent_id) {
            Some(id) if response.success => Ok(id),
            _ => Err(DebridError::provider(PROVIDER, "Failed to add torrent")),
        }
    }

    async fn torrent_files(&self, torrent_id: u64) -> Result<Option<Vec<FileRaw>>> {
        let response: MyListResponse = self.send(self.request(Method::GET, "/torrents/mylist")).await?;

        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .find(|t| t.id == torrent_id)
            .and_then(|t| t.files)
            .filter(|files| !files.is_empty()))
    }
}

impl std::fmt::Debug for Torbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Torbox")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("poll", &self.poll)
            .finish()
    }
}

#[async_trait]
impl DebridProvider for Torbox {
    fn descriptor(&self) -> &'static ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn check_cached(&self, torrents: &[Torrent]) -> CachedSet {
        let mut cached = CachedSet::new();

        for batch in hash_batches(torrents) {
            match self.check_batch(&batch).await {
                Ok(hits) => cached.extend(hits),
                Err(e) => {
                    tracing::warn!(error = %e, batch = batch.len(), "Torbox cache check failed, skipping batch");
                }
            }
        }

        cached
    }

    async fn files_from_magnet(&self, magnet: &str, hash: &str) -> Result<Vec<DebridFile>> {
        let torrent_id = self.create_torrent(magnet).await?;
        tracing::debug!(torrent_id, hash, "added magnet to Torbox");

        let files = self
            .poll
            .run(|_| self.torrent_files(torrent_id))
            .await?
            .ok_or_else(|| DebridError::FilesUnavailable {
                hash: hash.to_string(),
            })?;

        Ok(files
            .into_iter()
            .map(|f| DebridFile::listed(f.name, f.size, torrent_id, f.id))
            .collect())
    }

    async fn files_from_buffer(&self, _torrent_file: &[u8], _hash: &str) -> Result<Vec<DebridFile>> {
        Err(DebridError::UnsupportedOperation {
            provider: PROVIDER,
            operation: "torrent file upload",
        })
    }

    async fn resolve_download_url(&self, file: &DebridFile) -> Result<String> {
        let (torrent_id, file_id) = file
            .id_parts()
            .ok_or_else(|| DebridError::provider(PROVIDER, format!("Invalid file id '{}'", file.id)))?;

        let request = self.request(Method::GET, "/torrents/requestdl").query(&[
            ("token", self.credentials.api_key()),
            ("torrent_id", torrent_id),
            ("file_id", file_id),
            ("zip", "false"),
        ]);

        let response: RequestDlResponse = self.send(request).await?;
        match response.data {
            Some(url) if response.success && !url.is_empty() => Ok(url),
            _ => Err(detail_error(response.detail.as_deref(), || {
                "Failed to get Torbox download link".to_string()
            })),
        }
    }

    fn user_hash(&self) -> String {
        self.credentials.key_hash()
    }
}

/// A `detail` mentioning processing means the content is not ready yet
fn detail_error(detail: Option<&str>, fallback: impl FnOnce() -> String) -> DebridError {
    match detail {
        Some(d) if d.to_lowercase().contains("processing") => DebridError::NotReady,
        Some(d) if !d.is_empty() => DebridError::provider(PROVIDER, d),
        _ => DebridError::provider(PROVIDER, fallback()),
    }
}

/// Extract cached hashes from a `checkcached` payload, limited to `requested`.
///
/// Accepts `{hash: bool | object}` maps as well as lists of hashes or `{hash}` objects.
fn cached_hashes(data: &Value, requested: &[String]) -> Vec<String> {
    let requested: HashSet<&str> = requested.iter().map(String::as_str).collect();

    let candidates: Vec<String> = match data {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| is_truthy(v))
            .map(|(k, _)| k.to_ascii_lowercase())
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(h) => Some(h.to_ascii_lowercase()),
                Value::Object(obj) => obj
                    .get("hash")
                    .and_then(Value::as_str)
                    .map(str::to_ascii_lowercase),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|h| requested.contains(h.as_str()))
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
