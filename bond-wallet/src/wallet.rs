//! A wallet is a keypair plus the Base58Check address derived from it,
//! persisted as a small JSON file (one record per address) — the closest
//! idiomatic Rust analogue to the original tutorial's gob-encoded
//! `wallets.dat`, without pulling in a binary encoding crate for a file
//! nothing but this process ever reads.

use crate::address;
use crate::error::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use shared::crypto::{KeyPair, PrivateKey, PublicKey};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// A single address's keypair, with the address cached alongside it.
pub struct Wallet {
    pub keypair: KeyPair,
    pub address: String,
}

impl Wallet {
    /// Generates a fresh P-256 keypair and derives its address.
    pub fn generate() -> WalletResult<Self> {
        let keypair = KeyPair::generate()?;
        let address = address::encode(&keypair.public_key.hash160());
        Ok(Self { keypair, address })
    }

    #[must_use]
    pub fn pub_key_hash(&self) -> [u8; 20] {
        self.keypair.public_key.hash160()
    }
}

#[derive(Serialize, Deserialize)]
struct WalletRecord {
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

/// The full set of wallets known to this node, keyed by address and
/// persisted to a single JSON file.
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
}

impl Wallets {
    #[must_use]
    pub fn new() -> Self {
        Self { wallets: BTreeMap::new() }
    }

    /// Loads wallets from `path`, or returns an empty collection if the file
    /// does not exist yet.
    pub fn load(path: &Path) -> WalletResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path)?;
        let records: BTreeMap<String, WalletRecord> = serde_json::from_slice(&bytes)?;
        let mut wallets = BTreeMap::new();
        for (addr, record) in records {
            let public_key = PublicKey::from_bytes(record.public_key)?;
            let private_key = PrivateKey::from_bytes(record.private_key)?;
            wallets.insert(addr.clone(), Wallet { keypair: KeyPair { public_key, private_key }, address: addr });
        }
        Ok(Self { wallets })
    }

    /// Writes every wallet to `path` as a single JSON object.
    pub fn save(&self, path: &Path) -> WalletResult<()> {
        let records: BTreeMap<String, WalletRecord> = self
            .wallets
            .iter()
            .map(|(addr, wallet)| {
                (
                    addr.clone(),
                    WalletRecord {
                        public_key: wallet.keypair.public_key.as_bytes().to_vec(),
                        private_key: wallet.keypair.private_key.as_bytes().to_vec(),
                    },
                )
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Generates a new wallet, inserts it, and returns its address.
    pub fn create_wallet(&mut self) -> WalletResult<String> {
        let wallet = Wallet::generate()?;
        let addr = wallet.address.clone();
        info!(address = %addr, "created wallet");
        self.wallets.insert(addr.clone(), wallet);
        Ok(addr)
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get(&self, address: &str) -> WalletResult<&Wallet> {
        self.wallets
            .get(address)
            .ok_or_else(|| WalletError::NotFound(address.to_string()))
    }
}

impl Default for Wallets {
    fn default() -> Self {
        Self::new()
    }
}
