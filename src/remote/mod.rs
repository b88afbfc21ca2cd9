//! HTTP client for a Bot-API-style sticker service
//!
//! [`BotApiClient`] implements both [`PayloadSource`] and [`CollectionLookup`]:
//! - `GET {api_base}/bot{token}/getFile?file_id=..` resolves a payload to a file path
//! - `GET {api_base}/file/bot{token}/{file_path}` downloads the payload
//! - `GET {api_base}/bot{token}/getStickerSet?name=..` lists the stickers of a set
//!
//! Every failure is reported as [`Error::Network`] or [`Error::Remote`], both of which the
//! retry executor treats as transient. Request URLs carry the bot token, so they are
//! stripped from every error before it leaves this module.

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::pipeline::{CollectionLookup, PayloadSource};
use crate::types::{CollectionRef, ItemRef, StickerItem};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Envelope of every API answer
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StickerSetInfo {
    stickers: Vec<StickerInfo>,
}

#[derive(Debug, Deserialize)]
struct StickerInfo {
    file_id: String,
    #[serde(default)]
    is_animated: bool,
}

/// Client for the remote sticker service
#[derive(Clone)]
pub struct BotApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for BotApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApiClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Wrap a transport error without the request URL, which embeds the token
fn network_error(e: reqwest::Error) -> Error {
    Error::Network(e.without_url())
}

impl BotApiClient {
    /// Build a client from the remote configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the token is missing or the base URL is not a valid
    /// http(s) URL.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config {
                message: "a bot token is required to reach the sticker service".to_string(),
                key: Some("remote.token".to_string()),
            })?;

        let parsed = url::Url::parse(&config.api_base).map_err(|e| Error::Config {
            message: format!("invalid api base '{}': {}", config.api_base, e),
            key: Some("remote.api_base".to_string()),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported scheme '{}'", parsed.scheme()),
                key: Some("remote.api_base".to_string()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("sticker-dl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Resolve a payload reference to its path on the file endpoint
    pub async fn file_path(&self, item_ref: &ItemRef) -> Result<String> {
        let info: FileInfo = self.call("getFile", &[("file_id", item_ref.as_str())]).await?;
        info.file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Remote(format!("no file path for '{}'", item_ref)))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(network_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(network_error)?;

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            if status.is_success() {
                Error::Remote(format!("{} returned malformed data: {}", method, e))
            } else {
                Error::Remote(format!("{} failed with HTTP {}", method, status))
            }
        })?;

        if !envelope.ok {
            return Err(Error::Remote(format!(
                "{} refused: {}",
                method,
                envelope.description.as_deref().unwrap_or("no description")
            )));
        }
        envelope
            .result
            .ok_or_else(|| Error::Remote(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl PayloadSource for BotApiClient {
    async fn fetch_payload(&self, item_ref: &ItemRef, dest: &Path) -> Result<PathBuf> {
        let file_path = self.file_path(item_ref).await?;
        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);

        let mut response = self.http.get(&url).send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "download of '{}' failed with HTTP {}",
                item_ref,
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(network_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(item = %item_ref, ?dest, bytes = written, "payload downloaded");
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl CollectionLookup for BotApiClient {
    async fn resolve_collection(&self, collection_ref: &CollectionRef) -> Result<Vec<StickerItem>> {
        let set: StickerSetInfo = self
            .call("getStickerSet", &[("name", collection_ref.as_str())])
            .await?;
        Ok(set
            .stickers
            .into_iter()
            .map(|s| StickerItem {
                item_ref: ItemRef(s.file_id),
                is_animated: s.is_animated,
            })
            .collect())
    }
}
