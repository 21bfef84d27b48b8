use crate::chain::rpc::ChainRpc;
use crate::error::UploadError;
use crate::events::{EventSender, Stage};
use ethers::types::{TransactionReceipt, H256, U64};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal-success confirmation outcomes. Failing or unconfirmed outcomes
/// surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed { block: u64 },
    /// The chain finalized after the wait's timeout elapsed; discovered via
    /// the explicit fallback lookup. Accepted as success by stated policy.
    LateConfirmed { block: u64 },
}

impl Confirmation {
    pub fn block(&self) -> u64 {
        match self {
            Confirmation::Confirmed { block } | Confirmation::LateConfirmed { block } => *block,
        }
    }
}

/// Awaits on-chain finality for a submitted transaction.
///
/// The open-ended receipt wait is raced against a hard timeout; on timeout
/// one explicit receipt lookup decides between late confirmation and
/// unconfirmed failure.
pub struct ConfirmationTracker {
    rpc: Arc<dyn ChainRpc>,
    timeout: Duration,
    explorer_tx_url: String,
    events: EventSender,
}

impl ConfirmationTracker {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        timeout: Duration,
        explorer_tx_url: String,
        events: EventSender,
    ) -> Self {
        Self {
            rpc,
            timeout,
            explorer_tx_url,
            events,
        }
    }

    fn explorer_link(&self, tx_hash: H256) -> String {
        format!("{}{:?}", self.explorer_tx_url, tx_hash)
    }

    pub async fn track(&self, tx_hash: H256) -> Result<Confirmation, UploadError> {
        let explorer_link = self.explorer_link(tx_hash);

        match tokio::time::timeout(self.timeout, self.rpc.wait_for_receipt(tx_hash)).await {
            Ok(Ok(Some(receipt))) if receipt_succeeded(&receipt) => {
                let block = receipt_block(&receipt);
                debug!("Transaction {:?} confirmed in block {}", tx_hash, block);
                Ok(Confirmation::Confirmed { block })
            }
            Ok(Ok(Some(_))) => Err(UploadError::TransactionFailed { explorer_link }),
            // A wait that resolves without a receipt is treated like a
            // timeout: fall through to the explicit lookup.
            Ok(Ok(None)) => self.fallback_lookup(tx_hash, explorer_link).await,
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                warn!(
                    "Confirmation wait for {:?} timed out after {}s, checking for late confirmation",
                    tx_hash,
                    self.timeout.as_secs()
                );
                self.events.stage_warning(
                    Stage::Confirm,
                    "wait timed out, performing fallback receipt lookup",
                );
                self.fallback_lookup(tx_hash, explorer_link).await
            }
        }
    }

    async fn fallback_lookup(
        &self,
        tx_hash: H256,
        explorer_link: String,
    ) -> Result<Confirmation, UploadError> {
        match self.rpc.receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt_succeeded(&receipt) => {
                let block = receipt_block(&receipt);
                debug!("Transaction {:?} confirmed late in block {}", tx_hash, block);
                Ok(Confirmation::LateConfirmed { block })
            }
            _ => Err(UploadError::ConfirmationTimeout {
                timeout_secs: self.timeout.as_secs(),
                explorer_link,
            }),
        }
    }
}

fn receipt_succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status == Some(U64::one())
}

fn receipt_block(receipt: &TransactionReceipt) -> u64 {
    receipt.block_number.unwrap_or_default().as_u64()
}
