use crate::error::UploadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Content prepared for transport: salted root hash plus base64-encoded
/// bytes. Fresh per attempt, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPayload {
    pub root: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentProof {
    siblings: Vec<String>,
    path: Vec<u64>,
}

/// Wire body for `POST /file/segment`. Content always fits a single
/// segment in this design, so `index` is 0 and the proof is trivial.
#[derive(Debug, Serialize, Deserialize)]
struct SegmentRequest {
    root: String,
    index: u32,
    data: String,
    proof: SegmentProof,
}

impl SegmentRequest {
    fn single(payload: &ContentPayload) -> Self {
        Self {
            root: payload.root.clone(),
            index: 0,
            data: payload.data.clone(),
            proof: SegmentProof {
                siblings: vec![payload.root.clone()],
                path: vec![],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    #[serde(default)]
    exists: bool,
}

/// Storage indexer operations used by the pipeline.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Best-effort existence check. Transport errors map to `false` with a
    /// warning by stated policy (liveness over strict dedup), never to an
    /// error.
    async fn exists(&self, root: &str) -> bool;

    /// Upload the payload as the single segment. Errors propagate to the
    /// retry loop; no internal retries.
    async fn upload_segment(&self, payload: &ContentPayload) -> Result<(), UploadError>;
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Uniform outbound proxy shared with the content source.
    pub proxy: Option<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("INDEXER_URL")
                .unwrap_or_else(|_| "https://indexer-storage-testnet-turbo.0g.ai".to_string()),
            request_timeout: Duration::from_secs(60),
            proxy: None,
        }
    }
}

pub struct HttpIndexerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIndexerClient {
    pub fn new(config: IndexerConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
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
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn query_exists(&self, root: &str) -> Result<bool, UploadError> {
        let url = format!("{}/file/info/{}", self.base_url, root);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let info: FileInfoResponse = response.json().await?;
        Ok(info.exists)
    }
}

#[async_trait]
impl Indexer for HttpIndexerClient {
    async fn exists(&self, root: &str) -> bool {
        match self.query_exists(root).await {
            Ok(exists) => {
                debug!("Indexer existence check for {}: {}", root, exists);
                exists
            }
            Err(e) => {
                warn!("Existence check failed, assuming non-existent: {}", e);
                false
            }
        }
    }

    async fn upload_segment(&self, payload: &ContentPayload) -> Result<(), UploadError> {
        let url = format!("{}/file/segment", self.base_url);
        let body = SegmentRequest::single(payload);
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        debug!("Segment uploaded for root {}", payload.root);
        Ok(())
    }
}

/// Scripted indexer for tests. `exists` answers are consumed from a queue
/// (empty queue answers `false`); uploads can be made to fail a set number
/// of times and are recorded.
pub struct MockIndexer {
    exists_script: Mutex<VecDeque<bool>>,
    exists_calls: AtomicU32,
    upload_failures: AtomicU32,
    uploads: Mutex<Vec<ContentPayload>>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self {
            exists_script: Mutex::new(VecDeque::new()),
            exists_calls: AtomicU32::new(0),
            upload_failures: AtomicU32::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_exists_script(answers: impl IntoIterator<Item = bool>) -> Self {
        let mock = Self::new();
        *mock.exists_script.lock().unwrap() = answers.into_iter().collect();
        mock
    }

    pub fn fail_uploads(&self, count: u32) {
        self.upload_failures.store(count, Ordering::SeqCst);
    }

    pub fn exists_calls(&self) -> u32 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn uploaded_roots(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.root.clone())
            .collect()
    }
}

impl Default for MockIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn exists(&self, _root: &str) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.exists_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(false)
    }

    async fn upload_segment(&self, payload: &ContentPayload) -> Result<(), UploadError> {
        if self
            .upload_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(UploadError::Network("injected segment upload failure".into()));
        }
        self.uploads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_request_shape() {
        let payload = ContentPayload {
            root: "0xabc".to_string(),
            data: "AQID".to_string(),
        };
        let body = serde_json::to_value(SegmentRequest::single(&payload)).unwrap();
        assert_eq!(body["root"], "0xabc");
        assert_eq!(body["index"], 0);
        assert_eq!(body["data"], "AQID");
        assert_eq!(body["proof"]["siblings"], serde_json::json!(["0xabc"]));
        assert_eq!(body["proof"]["path"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn mock_consumes_exists_script_then_defaults_false() {
        let mock = MockIndexer::with_exists_script([true, false]);
        assert!(mock.exists("a").await);
        assert!(!mock.exists("b").await);
        assert!(!mock.exists("c").await);
        assert_eq!(mock.exists_calls(), 3);
    }

    #[tokio::test]
    async fn mock_records_uploads_after_injected_failures() {
        let mock = MockIndexer::new();
        mock.fail_uploads(1);
        let payload = ContentPayload {
            root: "0x1".to_string(),
            data: "x".to_string(),
        };
        assert!(mock.upload_segment(&payload).await.is_err());
        mock.upload_segment(&payload).await.unwrap();
        assert_eq!(mock.uploaded_roots(), vec!["0x1".to_string()]);
    }
}
