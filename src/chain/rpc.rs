use crate::accounts::Account;
use crate::config::ChainConfig;
use crate::error::UploadError;
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::providers::{Http, PendingTransaction, Provider};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

// Type aliases for clarity
pub type ChainProvider = Arc<Provider<Http>>;
type ChainSigner = Arc<SignerMiddleware<Arc<Provider<Http>>, LocalWallet>>;

/// Chain RPC operations the submitter and confirmation tracker depend on.
/// One instance is bound to one sending account.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    fn sender_address(&self) -> Address;

    async fn balance(&self) -> Result<U256, UploadError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, UploadError>;

    /// Account nonce at the latest block.
    async fn next_nonce(&self) -> Result<U256, UploadError>;

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, UploadError>;

    /// Resolves once the transaction is mined. The caller bounds this with
    /// its own timeout; the wait itself is open-ended.
    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, UploadError>;

    /// One-shot receipt lookup, used as the post-timeout fallback.
    async fn receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, UploadError>;
}

pub fn new_provider(config: &ChainConfig) -> Result<ChainProvider, UploadError> {
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .map_err(|e| UploadError::Network(format!("failed to create provider: {}", e)))?;
    Ok(Arc::new(provider))
}

/// Log a block-number round trip against the RPC before a run starts.
pub async fn check_network_sync(provider: &Provider<Http>) -> Result<u64, UploadError> {
    let block_number = provider.get_block_number().await?;
    info!("Network synced at block {}", block_number);
    Ok(block_number.as_u64())
}

/// `ChainRpc` over an ethers HTTP provider with a per-account signer.
pub struct EthersRpc {
    provider: ChainProvider,
    signer: ChainSigner,
    address: Address,
}

impl EthersRpc {
    pub fn for_account(
        provider: ChainProvider,
        account: &Account,
        chain_id: u64,
    ) -> Self {
        let wallet = account.wallet().clone().with_chain_id(chain_id);
        let address = wallet.address();
        let signer = Arc::new(SignerMiddleware::new(provider.clone(), wallet));
        Self {
            provider,
            signer,
            address,
        }
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    fn sender_address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> Result<U256, UploadError> {
        Ok(self.provider.get_balance(self.address, None).await?)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, UploadError> {
        Ok(self.provider.estimate_gas(tx, None).await?)
    }

    async fn next_nonce(&self) -> Result<U256, UploadError> {
        Ok(self
            .provider
            .get_transaction_count(self.address, Some(BlockNumber::Latest.into()))
            .await?)
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, UploadError> {
        let pending = self
            .signer
            .send_transaction(tx, None)
            .await
            .map_err(|e| UploadError::Submission(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, UploadError> {
        Ok(PendingTransaction::new(tx_hash, self.provider.as_ref()).await?)
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, UploadError> {
        Ok(self.provider.get_transaction_receipt(tx_hash).await?)
    }
}

/// Scripted receipt-wait behavior for `MockRpc`.
#[derive(Debug, Clone)]
pub enum WaitBehavior {
    /// Wait resolves with a mined receipt carrying this status.
    Mined { success: bool, block: u64 },
    /// Wait never resolves, forcing the caller's timeout.
    Never,
    /// Wait fails with a transport error.
    Error(String),
}

/// In-memory `ChainRpc` for tests, with call counters for every operation
/// and scripted send/wait/lookup outcomes.
pub struct MockRpc {
    address: Address,
    balance: Mutex<U256>,
    /// `None` makes gas estimation fail.
    gas_estimate: Mutex<Option<U256>>,
    nonce: AtomicU64,
    send_fail_first: AtomicU32,
    wait_behavior: Mutex<WaitBehavior>,
    /// Outcome of the fallback `receipt` lookup: `Some((success, block))`
    /// or `None` for no receipt anywhere.
    fallback_receipt: Mutex<Option<(bool, u64)>>,
    sent: Mutex<Vec<TypedTransaction>>,
    pub balance_calls: AtomicU32,
    pub estimate_calls: AtomicU32,
    pub send_calls: AtomicU32,
    pub wait_calls: AtomicU32,
    pub receipt_calls: AtomicU32,
}

impl MockRpc {
    pub fn new(balance: U256) -> Self {
        Self {
            address: Address::repeat_byte(0x11),
            balance: Mutex::new(balance),
            gas_estimate: Mutex::new(Some(U256::from(100_000u64))),
            nonce: AtomicU64::new(0),
            send_fail_first: AtomicU32::new(0),
            wait_behavior: Mutex::new(WaitBehavior::Mined {
                success: true,
                block: 42,
            }),
            fallback_receipt: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            balance_calls: AtomicU32::new(0),
            estimate_calls: AtomicU32::new(0),
            send_calls: AtomicU32::new(0),
            wait_calls: AtomicU32::new(0),
            receipt_calls: AtomicU32::new(0),
        }
    }

    /// A mock with ample balance that confirms immediately.
    pub fn funded() -> Self {
        Self::new(ethers::utils::parse_ether("1").expect("static amount"))
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn fail_gas_estimation(&self) {
        *self.gas_estimate.lock().unwrap() = None;
    }

    pub fn set_gas_estimate(&self, estimate: U256) {
        *self.gas_estimate.lock().unwrap() = Some(estimate);
    }

    pub fn fail_sends(&self, count: u32) {
        self.send_fail_first.store(count, Ordering::SeqCst);
    }

    pub fn set_wait_behavior(&self, behavior: WaitBehavior) {
        *self.wait_behavior.lock().unwrap() = behavior;
    }

    pub fn set_fallback_receipt(&self, receipt: Option<(bool, u64)>) {
        *self.fallback_receipt.lock().unwrap() = receipt;
    }

    pub fn sent_transactions(&self) -> Vec<TypedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    fn make_receipt(tx_hash: H256, success: bool, block: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: tx_hash,
            status: Some(U64::from(if success { 1 } else { 0 })),
            block_number: Some(U64::from(block)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    fn sender_address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> Result<U256, UploadError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock().unwrap())
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, UploadError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        (*self.gas_estimate.lock().unwrap())
            .ok_or_else(|| UploadError::Network("injected estimation failure".into()))
    }

    async fn next_nonce(&self) -> Result<U256, UploadError> {
        Ok(U256::from(self.nonce.load(Ordering::SeqCst)))
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, UploadError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .send_fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(UploadError::Submission("injected send failure".into()));
        }
        self.sent.lock().unwrap().push(tx);
        self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(H256::random())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, UploadError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.wait_behavior.lock().unwrap().clone();
        match behavior {
            WaitBehavior::Mined { success, block } => {
                Ok(Some(Self::make_receipt(tx_hash, success, block)))
            }
            WaitBehavior::Never => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            WaitBehavior::Error(message) => Err(UploadError::Network(message)),
        }
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, UploadError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let fallback = *self.fallback_receipt.lock().unwrap();
        Ok(fallback.map(|(success, block)| Self::make_receipt(tx_hash, success, block)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_counts_calls_and_advances_nonce() {
        let rpc = MockRpc::funded();
        assert_eq!(rpc.next_nonce().await.unwrap(), U256::zero());
        rpc.send_transaction(TypedTransaction::default()).await.unwrap();
        assert_eq!(rpc.next_nonce().await.unwrap(), U256::one());
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rpc.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn mock_injected_send_failures_are_bounded() {
        let rpc = MockRpc::funded();
        rpc.fail_sends(2);
        assert!(rpc.send_transaction(TypedTransaction::default()).await.is_err());
        assert!(rpc.send_transaction(TypedTransaction::default()).await.is_err());
        assert!(rpc.send_transaction(TypedTransaction::default()).await.is_ok());
    }
}
