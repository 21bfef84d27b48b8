use crate::chain::rpc::ChainRpc;
use crate::config::ChainConfig;
use crate::error::UploadError;
use crate::events::{EventSender, Stage};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, TransactionRequest, H256, U256};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds and submits the attestation transaction for one prepared upload.
///
/// The call encoding is a fixed-shape static tuple; its only
/// attempt-specific field is a fresh random 32-byte value. The on-chain
/// record deliberately references that attempt nonce, not the stored
/// content hash — explorer links and compatibility checks depend on this
/// exact shape.
pub struct ChainSubmitter {
    rpc: Arc<dyn ChainRpc>,
    config: ChainConfig,
    events: EventSender,
}

impl ChainSubmitter {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: ChainConfig, events: EventSender) -> Self {
        Self {
            rpc,
            config,
            events,
        }
    }

    /// Submit an attestation transaction, returning its hash. The content
    /// payload itself was already pushed to the indexer; this only records
    /// the attestation on-chain.
    pub async fn submit(&self) -> Result<H256, UploadError> {
        // Pre-flight reserve gate, before any gas RPC round trip.
        let balance = self.rpc.balance().await?;
        if balance < self.config.min_balance {
            return Err(UploadError::InsufficientBalance {
                balance,
                required: self.config.min_balance,
            });
        }
        debug!("Sender balance: {} wei", balance);

        let calldata = encode_attestation_call(&self.config.method_selector);
        let value = self.config.tx_value;
        let gas_price = self.config.gas_price;

        let estimate_tx: TypedTransaction = TransactionRequest::new()
            .from(self.rpc.sender_address())
            .to(self.config.contract_address)
            .data(calldata.clone())
            .value(value)
            .into();

        let gas_limit = match self.rpc.estimate_gas(&estimate_tx).await {
            Ok(estimate) => {
                // 50% buffer, integer floor.
                let buffered = estimate * U256::from(15u64) / U256::from(10u64);
                debug!("Gas limit estimated: {}", buffered);
                buffered
            }
            Err(e) => {
                // Estimation failure is non-fatal; fall back to the fixed
                // default and let the submission decide.
                let fallback = self.config.fallback_gas_limit;
                warn!("Gas estimation failed ({}), using default limit {}", e, fallback);
                self.events.stage_warning(
                    Stage::Submit,
                    format!("gas estimation failed, using default limit {}", fallback),
                );
                fallback
            }
        };

        // Re-check affordability now that price and limit are known.
        let required = gas_price * gas_limit + value;
        if balance < required {
            return Err(UploadError::InsufficientBalanceForTx { balance, required });
        }

        let nonce = self.rpc.next_nonce().await?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.config.contract_address)
            .data(calldata)
            .value(value)
            .nonce(nonce)
            .chain_id(self.config.chain_id)
            .gas_price(gas_price)
            .gas(gas_limit)
            .into();

        let tx_hash = self.rpc.send_transaction(tx).await?;
        let explorer_link = self.config.explorer_link(tx_hash);
        self.events
            .transaction_submitted(tx_hash, explorer_link.clone());
        debug!("Transaction sent: {:?} ({})", tx_hash, explorer_link);

        Ok(tx_hash)
    }
}

fn abi_word(value: u8) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = value;
    word
}

/// Selector plus the static word sequence the attestation contract expects:
/// {0x20, 0x14, 0x60, 0x80, 0x00, 0x01, nonce32, 0x00}, where nonce32 is
/// 32 fresh random bytes per attempt.
fn encode_attestation_call(selector: &[u8; 4]) -> Bytes {
    let mut nonce32 = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce32);

    let mut data = Vec::with_capacity(4 + 8 * 32);
    data.extend_from_slice(selector);
    data.extend_from_slice(&abi_word(0x20));
    data.extend_from_slice(&abi_word(0x14));
    data.extend_from_slice(&abi_word(0x60));
    data.extend_from_slice(&abi_word(0x80));
    data.extend_from_slice(&abi_word(0x00));
    data.extend_from_slice(&abi_word(0x01));
    data.extend_from_slice(&nonce32);
    data.extend_from_slice(&abi_word(0x00));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::rpc::MockRpc;
    use std::sync::atomic::Ordering;

    fn submitter(rpc: Arc<MockRpc>) -> ChainSubmitter {
        ChainSubmitter::new(rpc, ChainConfig::galileo_testnet(), EventSender::disabled())
    }

    #[test]
    fn calldata_has_fixed_shape_and_fresh_nonce() {
        let selector = [0xef, 0x3e, 0x12, 0xdc];
        let a = encode_attestation_call(&selector);
        let b = encode_attestation_call(&selector);

        assert_eq!(a.len(), 4 + 8 * 32);
        assert_eq!(&a[0..4], &selector);
        // Fixed words before and after the nonce.
        assert_eq!(a[4..36], abi_word(0x20));
        assert_eq!(a[36..68], abi_word(0x14));
        assert_eq!(a[68..100], abi_word(0x60));
        assert_eq!(a[100..132], abi_word(0x80));
        assert_eq!(a[132..164], abi_word(0x00));
        assert_eq!(a[164..196], abi_word(0x01));
        assert_eq!(a[228..260], abi_word(0x00));
        // Only the 32-byte nonce differs between encodings.
        assert_eq!(a[0..196], b[0..196]);
        assert_ne!(a[196..228], b[196..228]);
    }

    #[tokio::test]
    async fn balance_gate_rejects_before_any_estimation() {
        let rpc = Arc::new(MockRpc::new(U256::from(1u64)));
        let err = submitter(rpc.clone()).submit().await.unwrap_err();
        assert!(matches!(err, UploadError::InsufficientBalance { .. }));
        assert_eq!(rpc.estimate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn estimation_failure_falls_back_to_default_limit() {
        let rpc = Arc::new(MockRpc::funded());
        rpc.fail_gas_estimation();
        submitter(rpc.clone()).submit().await.unwrap();

        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].gas(), Some(&U256::from(300_000u64)));
    }

    #[tokio::test]
    async fn estimated_limit_carries_fifty_percent_buffer() {
        let rpc = Arc::new(MockRpc::funded());
        rpc.set_gas_estimate(U256::from(100_001u64));
        submitter(rpc.clone()).submit().await.unwrap();

        let sent = rpc.sent_transactions();
        // 100_001 * 15 / 10, floored.
        assert_eq!(sent[0].gas(), Some(&U256::from(150_001u64)));
    }

    #[tokio::test]
    async fn affordability_recheck_rejects_known_costs() {
        let config = ChainConfig::galileo_testnet();
        // Past the reserve gate, but short of gas price * limit + value.
        let rpc = Arc::new(MockRpc::new(config.min_balance));
        rpc.set_gas_estimate(U256::from(10_000_000_000u64));
        let err = submitter(rpc.clone()).submit().await.unwrap_err();
        assert!(matches!(err, UploadError::InsufficientBalanceForTx { .. }));
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submitted_request_is_fully_populated() {
        let rpc = Arc::new(MockRpc::funded());
        let config = ChainConfig::galileo_testnet();
        let submitter = ChainSubmitter::new(rpc.clone(), config.clone(), EventSender::disabled());
        submitter.submit().await.unwrap();

        let sent = rpc.sent_transactions();
        let tx = &sent[0];
        assert_eq!(tx.value(), Some(&config.tx_value));
        assert_eq!(tx.gas_price(), Some(config.gas_price));
        assert_eq!(tx.nonce(), Some(&U256::zero()));
        assert_eq!(tx.chain_id(), Some(config.chain_id.into()));
        assert_eq!(
            tx.to(),
            Some(&ethers::types::NameOrAddress::Address(config.contract_address))
        );
    }

    #[tokio::test]
    async fn submitted_event_carries_explorer_link() {
        let rpc = Arc::new(MockRpc::funded());
        let (events, mut rx) = EventSender::new();
        let submitter =
            ChainSubmitter::new(rpc, ChainConfig::galileo_testnet(), events);
        let tx_hash = submitter.submit().await.unwrap();

        match rx.recv().await.unwrap() {
            crate::events::UploadEvent::TransactionSubmitted {
                tx_hash: emitted,
                explorer_link,
            } => {
                assert_eq!(emitted, tx_hash);
                assert!(explorer_link.starts_with("https://chainscan-galileo.0g.ai/tx/"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
