use ethers::types::U256;
use thiserror::Error;

/// Failure taxonomy for a single upload attempt.
///
/// Gas estimation failure is deliberately not represented here: the
/// submitter falls back to a fixed gas limit and continues. Only the
/// pipeline retry loop decides whether any of these are retried; stages
/// propagate upward.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("content source error: {0}")]
    ContentSource(String),

    #[error("failed to derive a unique root hash after {attempts} attempts")]
    HashExhaustion { attempts: u32 },

    #[error("insufficient balance: have {balance} wei, minimum reserve {required} wei")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error("insufficient balance for transaction: need {required} wei, have {balance} wei")]
    InsufficientBalanceForTx { balance: U256, required: U256 },

    #[error("transaction submission rejected: {0}")]
    Submission(String),

    #[error("transaction failed on-chain: {explorer_link}")]
    TransactionFailed { explorer_link: String },

    #[error("transaction unconfirmed after {timeout_secs}s timeout: {explorer_link}")]
    ConfirmationTimeout {
        timeout_secs: u64,
        explorer_link: String,
    },

    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Network(err.to_string())
    }
}

impl From<ethers::providers::ProviderError> for UploadError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        UploadError::Network(err.to_string())
    }
}
