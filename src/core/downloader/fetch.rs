use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{FetchError, LauncherError, LauncherResult};
use crate::core::http::build_http_client;

/// Transport boundary: plain GETs with standard HTTP failure semantics.
///
/// Network failures surface as [`LauncherError::Fetch`]; local write failures
/// as [`LauncherError::Io`]. Implementations never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    /// `dest`'s parent directory must already exist.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> LauncherResult<u64> {
        let bytes = self.fetch(url).await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        Ok(bytes.len() as u64)
    }
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> LauncherResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url, status.as_u16()).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> LauncherResult<u64> {
        let response = self.get(url).await?;
        let mut written = 0u64;

        // Keep the handle scoped so it is closed before the caller renames the file.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| FetchError::transport(url, e.to_string()))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(dest, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        debug!("Fetched {} ({} bytes) -> {:?}", url, written, dest);
        Ok(written)
    }
}
