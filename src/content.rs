use crate::error::UploadError;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

/// Supplies raw content bytes for an upload attempt. May fail transiently;
/// the pipeline's retry loop handles that.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, UploadError>;
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Public endpoints returning small binary payloads; one is picked at
    /// random per fetch.
    pub sources: Vec<String>,
    /// Uniform outbound proxy for content and indexer traffic (never RPC).
    pub proxy: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                "https://picsum.photos/800/600".to_string(),
                "https://loremflickr.com/800/600".to_string(),
            ],
            proxy: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct HttpContentSource {
    client: reqwest::Client,
    sources: Vec<String>,
}

impl HttpContentSource {
    pub fn new(config: ContentConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy).map_err(|e| UploadError::Network(e.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Network(e.to_string()))?;
        Ok(Self {
            client,
            sources: config.sources,
        })
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self) -> Result<Vec<u8>, UploadError> {
        let url = self
            .sources
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| UploadError::ContentSource("no content sources configured".into()))?;
        debug!("Fetching content from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UploadError::ContentSource(e.to_string()))?
            .error_for_status()
            .map_err(|e| UploadError::ContentSource(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UploadError::ContentSource(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// In-memory content source for tests: serves fixed bytes, optionally
/// failing the first `fail_first` fetches.
pub struct MockContentSource {
    content: Vec<u8>,
    fail_first: AtomicU32,
    fetch_count: AtomicU32,
}

impl MockContentSource {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            fail_first: AtomicU32::new(0),
            fetch_count: AtomicU32::new(0),
        }
    }

    pub fn failing_first(content: Vec<u8>, failures: u32) -> Self {
        let source = Self::new(content);
        source.fail_first.store(failures, Ordering::SeqCst);
        source
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn fetch(&self) -> Result<Vec<u8>, UploadError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(UploadError::ContentSource("injected fetch failure".into()));
        }
        Ok(self.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_content_after_injected_failures() {
        let source = MockContentSource::failing_first(vec![1, 2, 3], 2);
        assert!(source.fetch().await.is_err());
        assert!(source.fetch().await.is_err());
        assert_eq!(source.fetch().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(source.fetch_count(), 3);
    }

    #[test]
    fn default_config_has_two_public_sources() {
        let config = ContentConfig::default();
        assert_eq!(config.sources.len(), 2);
        assert!(config.proxy.is_none());
    }
}
