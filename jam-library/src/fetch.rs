//! Fetching raw track bytes from URLs

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Largest response body accepted for a single track (256 MiB)
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Errors that can occur while fetching track bytes
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {code} fetching {url}")]
    Status { code: u16, url: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Empty response body from {url}")]
    Empty { url: String },
}

/// Source of encoded audio bytes
pub trait ByteFetcher: Send + Sync {
    /// Fetch the full body behind a URL
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for `http(s)://` URLs, `file://` URLs and plain paths
pub struct SourceFetcher {
    agent: ureq::Agent,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // Signed URLs can be reissued, never serve a stale copy
        let response = self
            .agent
            .get(url)
            .set("Cache-Control", "no-cache")
            .set("Pragma", "no-cache")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => FetchError::Status {
                    code,
                    url: url.to_string(),
                },
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn local_path(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

impl ByteFetcher for SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url)?
        } else {
            std::fs::read(Self::local_path(url))?
        };

        if bytes.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        Ok(bytes)
    }
}

/// In-memory fetcher serving a fixed set of URLs
#[derive(Default)]
pub struct StaticFetcher {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.entries.write().insert(url.into(), bytes);
    }

    pub fn remove(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }
}

impl ByteFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let entries = self.entries.read();
        match entries.get(url) {
            Some(bytes) if bytes.is_empty() => Err(FetchError::Empty {
                url: url.to_string(),
            }),
            Some(bytes) => Ok(bytes.clone()),
            None => Err(FetchError::Status {
                code: 404,
                url: url.to_string(),
            }),
        }
    }
}
