use crate::chain::{ChainRpc, ChainSubmitter, Confirmation, ConfirmationTracker};
use crate::config::{settings::jittered, ChainConfig, RetryConfig};
use crate::content::ContentSource;
use crate::dedup::HashDeduper;
use crate::error::UploadError;
use crate::events::{EventSender, Stage};
use crate::indexer::Indexer;
use ethers::types::H256;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Outcome of a fully confirmed upload.
#[derive(Debug, Clone)]
pub struct ConfirmedUpload {
    pub root: String,
    pub tx_hash: H256,
    pub confirmation: Confirmation,
}

/// One upload: content fetch → collision-checked root derivation → segment
/// upload → attestation submission → confirmation, wrapped in a bounded
/// randomized-backoff retry of the whole sequence.
///
/// A failed attempt re-runs every stage; a segment already uploaded under a
/// discarded root is accepted as benign duplication rather than rolled
/// back.
pub struct UploadPipeline {
    content: Arc<dyn ContentSource>,
    indexer: Arc<dyn Indexer>,
    deduper: HashDeduper,
    submitter: ChainSubmitter,
    tracker: ConfirmationTracker,
    retry: RetryConfig,
    events: EventSender,
}

impl UploadPipeline {
    pub fn new(
        content: Arc<dyn ContentSource>,
        indexer: Arc<dyn Indexer>,
        rpc: Arc<dyn ChainRpc>,
        chain: ChainConfig,
        retry: RetryConfig,
        events: EventSender,
    ) -> Self {
        let deduper = HashDeduper::new(indexer.clone(), events.clone());
        let tracker = ConfirmationTracker::new(
            rpc.clone(),
            chain.confirmation_timeout,
            chain.explorer_tx_url.clone(),
            events.clone(),
        );
        let submitter = ChainSubmitter::new(rpc, chain, events.clone());
        Self {
            content,
            indexer,
            deduper,
            submitter,
            tracker,
            retry,
            events,
        }
    }

    async fn run_attempt(&self) -> Result<ConfirmedUpload, UploadError> {
        self.events
            .stage_start(Stage::FetchContent, "fetching content bytes");
        let content = self.content.fetch().await?;
        self.events.stage_success(
            Stage::FetchContent,
            format!("fetched {} bytes", content.len()),
        );

        self.events
            .stage_start(Stage::Dedup, "deriving collision-checked root");
        let payload = self.deduper.prepare(&content).await?;
        self.events
            .stage_success(Stage::Dedup, format!("root {}", payload.root));

        self.events
            .stage_start(Stage::SegmentUpload, "uploading segment to indexer");
        self.indexer.upload_segment(&payload).await?;
        self.events
            .stage_success(Stage::SegmentUpload, "segment uploaded");

        self.events
            .stage_start(Stage::Submit, "submitting attestation transaction");
        let tx_hash = self.submitter.submit().await?;
        self.events
            .stage_success(Stage::Submit, format!("submitted {:?}", tx_hash));

        self.events
            .stage_start(Stage::Confirm, "awaiting confirmation");
        let confirmation = self.tracker.track(tx_hash).await?;
        self.events.stage_success(
            Stage::Confirm,
            format!("confirmed in block {}", confirmation.block()),
        );

        Ok(ConfirmedUpload {
            root: payload.root,
            tx_hash,
            confirmation,
        })
    }

    /// Run the upload with up to `max_attempts` whole-pipeline tries. The
    /// last error propagates after exhaustion.
    pub async fn run(&self) -> Result<ConfirmedUpload, UploadError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.run_attempt().await {
                Ok(upload) => {
                    info!(
                        "Upload confirmed: root {} tx {:?} block {}",
                        upload.root,
                        upload.tx_hash,
                        upload.confirmation.block()
                    );
                    return Ok(upload);
                }
                Err(e) if attempt < max_attempts => {
                    warn!("Upload attempt {}/{} failed: {}", attempt, max_attempts, e);
                    self.events.stage_error(
                        Stage::Schedule,
                        format!("attempt {}/{} failed: {}", attempt, max_attempts, e),
                    );
                    let backoff =
                        jittered((self.retry.backoff_min, self.retry.backoff_max));
                    warn!("Retrying in {:.1}s", backoff.as_secs_f64());
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        "Upload failed permanently after {} attempt(s): {}",
                        attempt, e
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockRpc;
    use crate::content::MockContentSource;
    use crate::indexer::MockIndexer;
    use std::sync::atomic::Ordering;

    fn pipeline(
        content: Arc<MockContentSource>,
        indexer: Arc<MockIndexer>,
        rpc: Arc<MockRpc>,
    ) -> UploadPipeline {
        UploadPipeline::new(
            content,
            indexer,
            rpc,
            ChainConfig::galileo_testnet(),
            RetryConfig::immediate(3),
            EventSender::disabled(),
        )
    }

    #[tokio::test]
    async fn clean_pass_runs_every_stage_once() {
        let content = Arc::new(MockContentSource::new(vec![9u8; 64]));
        let indexer = Arc::new(MockIndexer::new());
        let rpc = Arc::new(MockRpc::funded());
        let upload = pipeline(content.clone(), indexer.clone(), rpc.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(content.fetch_count(), 1);
        assert_eq!(indexer.exists_calls(), 1);
        assert_eq!(indexer.uploaded_roots(), vec![upload.root.clone()]);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(upload.confirmation, Confirmation::Confirmed { .. }));
    }

    #[tokio::test]
    async fn submission_failures_on_first_two_attempts_still_succeed() {
        let content = Arc::new(MockContentSource::new(vec![9u8; 64]));
        let indexer = Arc::new(MockIndexer::new());
        let rpc = Arc::new(MockRpc::funded());
        rpc.fail_sends(2);

        pipeline(content.clone(), indexer.clone(), rpc.clone())
            .run()
            .await
            .unwrap();

        // Three whole-pipeline executions, not just retried submissions.
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 3);
        assert_eq!(content.fetch_count(), 3);
        assert_eq!(indexer.uploaded_roots().len(), 3);
    }

    #[tokio::test]
    async fn exhaustion_propagates_the_last_error() {
        let content = Arc::new(MockContentSource::new(vec![9u8; 64]));
        let indexer = Arc::new(MockIndexer::new());
        let rpc = Arc::new(MockRpc::funded());
        rpc.fail_sends(5);

        let err = pipeline(content.clone(), indexer, rpc.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Submission(_)));
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 3);
        assert_eq!(content.fetch_count(), 3);
    }

    #[tokio::test]
    async fn content_failure_is_retried_like_any_other_stage() {
        let content = Arc::new(MockContentSource::failing_first(vec![1u8; 8], 1));
        let indexer = Arc::new(MockIndexer::new());
        let rpc = Arc::new(MockRpc::funded());

        pipeline(content.clone(), indexer, rpc.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(content.fetch_count(), 2);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 1);
    }
}
