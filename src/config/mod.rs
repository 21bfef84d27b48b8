pub mod chain;
pub mod settings;

pub use chain::ChainConfig;
pub use settings::{PacingConfig, RetryConfig, UploadSettings};
