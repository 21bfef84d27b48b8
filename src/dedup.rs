use crate::error::UploadError;
use crate::events::{EventSender, Stage};
use crate::indexer::{ContentPayload, Indexer};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

const MAX_HASH_ATTEMPTS: u32 = 5;

/// Derives a collision-checked content identifier.
///
/// The root is SHA-256 over the content plus fresh entropy (16-byte salt as
/// hex, millisecond timestamp as decimal string), so repeated uploads of
/// identical bytes never collide. Each candidate is checked against the
/// remote index before use; an index hit discards the candidate and retries
/// with fresh entropy, up to 5 attempts.
pub struct HashDeduper {
    indexer: Arc<dyn Indexer>,
    events: EventSender,
}

impl HashDeduper {
    pub fn new(indexer: Arc<dyn Indexer>, events: EventSender) -> Self {
        Self { indexer, events }
    }

    pub async fn prepare(&self, content: &[u8]) -> Result<ContentPayload, UploadError> {
        for attempt in 1..=MAX_HASH_ATTEMPTS {
            let root = derive_root(content);

            if self.indexer.exists(&root).await {
                self.events.stage_warning(
                    Stage::Dedup,
                    format!(
                        "root {} already indexed, regenerating ({}/{})",
                        root, attempt, MAX_HASH_ATTEMPTS
                    ),
                );
                continue;
            }

            debug!("Derived unique root {} on attempt {}", root, attempt);
            return Ok(ContentPayload {
                root,
                data: base64::engine::general_purpose::STANDARD.encode(content),
            });
        }

        Err(UploadError::HashExhaustion {
            attempts: MAX_HASH_ATTEMPTS,
        })
    }
}

fn derive_root(content: &[u8]) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();

    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.update(hex::encode(salt).as_bytes());
    hasher.update(timestamp.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::MockIndexer;

    fn deduper(indexer: Arc<MockIndexer>) -> HashDeduper {
        HashDeduper::new(indexer, EventSender::disabled())
    }

    #[test]
    fn roots_are_salted_and_prefixed() {
        let a = derive_root(b"same bytes");
        let b = derive_root(b"same bytes");
        assert_ne!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
    }

    #[tokio::test]
    async fn returns_first_unindexed_root() {
        let indexer = Arc::new(MockIndexer::new());
        let payload = deduper(indexer.clone()).prepare(b"content").await.unwrap();
        assert_eq!(indexer.exists_calls(), 1);
        assert_eq!(
            payload.data,
            base64::engine::general_purpose::STANDARD.encode(b"content")
        );
    }

    #[tokio::test]
    async fn retries_until_fifth_candidate_is_free() {
        let indexer = Arc::new(MockIndexer::with_exists_script([true, true, true, true, false]));
        let payload = deduper(indexer.clone()).prepare(b"content").await.unwrap();
        assert_eq!(indexer.exists_calls(), 5);
        assert!(payload.root.starts_with("0x"));
    }

    #[tokio::test]
    async fn exhausts_after_five_indexed_candidates() {
        let indexer = Arc::new(MockIndexer::with_exists_script([true; 5]));
        let err = deduper(indexer.clone()).prepare(b"content").await.unwrap_err();
        assert!(matches!(err, UploadError::HashExhaustion { attempts: 5 }));
        assert_eq!(indexer.exists_calls(), 5);
    }
}
