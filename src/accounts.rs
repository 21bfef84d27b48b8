use crate::error::UploadError;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::{error, info};

/// A signing account. Immutable after load; the scheduler owns the
/// iteration order over these.
#[derive(Clone, Debug)]
pub struct Account {
    wallet: LocalWallet,
}

impl Account {
    pub fn from_private_key(key: &str) -> Result<Self, UploadError> {
        let normalized = normalize_key(key)?;
        let wallet = normalized
            .parse::<LocalWallet>()
            .map_err(|e| UploadError::InvalidKey(e.to_string()))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

/// Trim, 0x-prefix and length-check a private key without logging its value.
fn normalize_key(key: &str) -> Result<String, UploadError> {
    let trimmed = key.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(stripped)
        .map_err(|_| UploadError::InvalidKey("not valid hex".to_string()))?;
    if bytes.len() != 32 {
        return Err(UploadError::InvalidKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", stripped))
}

/// Load accounts from `PRIVATE_KEY_1..n` env vars, falling back to a bare
/// `PRIVATE_KEY` for the first slot. Invalid entries are logged and
/// skipped; loading fails only when no valid key remains.
pub fn load_accounts_from_env() -> Result<Vec<Account>, UploadError> {
    let mut accounts = Vec::new();
    let mut index = 1u32;

    loop {
        let key = match std::env::var(format!("PRIVATE_KEY_{}", index)) {
            Ok(key) => Some(key),
            Err(_) if index == 1 => std::env::var("PRIVATE_KEY").ok(),
            Err(_) => None,
        };

        let Some(key) = key else { break };

        match Account::from_private_key(&key) {
            Ok(account) => accounts.push(account),
            Err(e) => error!("Invalid private key at slot {}: {}", index, e),
        }
        index += 1;
    }

    if accounts.is_empty() {
        return Err(UploadError::InvalidKey(
            "no valid private keys found in environment".to_string(),
        ));
    }

    info!("Loaded {} account(s)", accounts.len());
    Ok(accounts)
}
