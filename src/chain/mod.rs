pub mod confirm;
pub mod rpc;
pub mod submitter;

pub use confirm::{Confirmation, ConfirmationTracker};
pub use rpc::{check_network_sync, new_provider, ChainProvider, ChainRpc, EthersRpc, MockRpc,
    WaitBehavior};
pub use submitter::ChainSubmitter;
