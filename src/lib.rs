pub mod accounts;
pub mod chain;
pub mod config;
pub mod content;
pub mod dedup;
pub mod error;
pub mod events;
pub mod indexer;
pub mod pipeline;
pub mod scheduler;

// Re-export the main pipeline types
pub use accounts::{load_accounts_from_env, Account};
pub use chain::{
    check_network_sync, new_provider, ChainRpc, ChainSubmitter, Confirmation,
    ConfirmationTracker, EthersRpc, MockRpc, WaitBehavior,
};
pub use config::{ChainConfig, PacingConfig, RetryConfig, UploadSettings};
pub use content::{ContentConfig, ContentSource, HttpContentSource, MockContentSource};
pub use dedup::HashDeduper;
pub use error::UploadError;
pub use events::{EventSender, Stage, UploadEvent};
pub use indexer::{ContentPayload, HttpIndexerClient, Indexer, IndexerConfig, MockIndexer};
pub use pipeline::{ConfirmedUpload, UploadPipeline};
pub use scheduler::{AccountScheduler, AttemptOutcome, RunSummary, UploadAttempt};
