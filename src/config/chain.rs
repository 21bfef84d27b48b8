use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Chain-side parameters for the attestation transaction.
///
/// Gas price and transaction value are fixed configured amounts, not live
/// fee queries; explorer links and the call encoding shape depend on these
/// staying exactly as the deployed contract expects them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub contract_address: Address,
    /// 4-byte selector of the attestation method.
    pub method_selector: [u8; 4],
    pub explorer_tx_url: String,
    /// Fixed gas price in wei (not a live fee query).
    pub gas_price: U256,
    /// Fixed native value sent with every attestation transaction, in wei.
    pub tx_value: U256,
    /// Minimum reserve required before any gas RPC is attempted, in wei.
    pub min_balance: U256,
    /// Gas limit used when estimation fails.
    pub fallback_gas_limit: U256,
    /// Hard deadline for the confirmation wait.
    pub confirmation_timeout: Duration,
}

impl ChainConfig {
    /// 0G Galileo testnet, the network this uploader targets.
    pub fn galileo_testnet() -> Self {
        ChainConfig {
            chain_id: 16601,
            name: "0G Galileo Testnet".to_string(),
            rpc_url: std::env::var("RPC_URL")
                .unwrap_or_else(|_| "https://evmrpc-testnet.0g.ai".to_string()),
            contract_address: Address::from_str("0x5f1d96895e442fc0168fa2f9fb1ebef93cb5035e")
                .expect("Invalid attestation contract address"),
            method_selector: [0xef, 0x3e, 0x12, 0xdc],
            explorer_tx_url: std::env::var("EXPLORER_TX_URL")
                .unwrap_or_else(|_| "https://chainscan-galileo.0g.ai/tx/".to_string()),
            // 1.029599997 gwei
            gas_price: U256::from(1_029_599_997u64),
            // 0.000839233398436224 OG
            tx_value: U256::from(839_233_398_436_224u64),
            // 0.0015 OG
            min_balance: U256::from(1_500_000_000_000_000u64),
            fallback_gas_limit: U256::from(300_000u64),
            confirmation_timeout: Duration::from_secs(300),
        }
    }

    pub fn explorer_link(&self, tx_hash: ethers::types::H256) -> String {
        format!("{}{:?}", self.explorer_tx_url, tx_hash)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::galileo_testnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    #[test]
    fn galileo_defaults() {
        let config = ChainConfig::galileo_testnet();
        assert_eq!(config.chain_id, 16601);
        assert_eq!(config.method_selector, [0xef, 0x3e, 0x12, 0xdc]);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(300));
        assert!(config.min_balance > config.tx_value);
    }

    #[test]
    fn fixed_amounts_match_protocol_units() {
        let config = ChainConfig::galileo_testnet();
        assert_eq!(
            config.tx_value,
            ethers::utils::parse_ether("0.000839233398436224").unwrap()
        );
        assert_eq!(
            config.min_balance,
            ethers::utils::parse_ether("0.0015").unwrap()
        );
    }

    #[test]
    fn explorer_link_embeds_full_hash() {
        let config = ChainConfig::galileo_testnet();
        let link = config.explorer_link(H256::zero());
        assert!(link.starts_with("https://chainscan-galileo.0g.ai/tx/0x"));
        assert!(link.ends_with(&"0".repeat(64)));
    }
}
