//! The single `Node` value holding every piece of shared state the source
//! kept as process-wide globals (`knownNodes`, `blocksInTransit`, `mempool`,
//! the node/mining address), threaded through handlers instead.

use bond_core::{Block, BondResult, ChainStore, Transaction, UtxoSet};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// Hard-coded seed set the source calls `fullNodes`; `fullNodes[0]` is the
/// one node that routes and verifies but never mines.
pub const SEED_FULL_NODES: &[&str] = &["localhost:3000"];

pub const PROTOCOL_VERSION: u32 = 1;

/// The chain store and UTXO index, absent until a node without a local
/// database receives and accepts a genesis block over the network.
pub struct Chain {
    pub store: ChainStore,
    pub utxo: UtxoSet,
}

pub struct Node {
    pub address: String,
    pub data_dir: String,
    pub mining_pub_key_hash: Option<[u8; 20]>,

    /// Peer addresses learned via `addr`/`version`. Never includes `address`
    /// itself.
    pub known_nodes: Mutex<HashSet<String>>,
    /// Block hashes announced but not yet downloaded.
    pub blocks_in_transit: Mutex<HashSet<[u8; 32]>>,
    /// Pending, validator-accepted, non-coinbase transactions.
    pub mempool: Mutex<HashMap<[u8; 32], Transaction>>,

    /// `None` until genesis materializes the chain, either locally
    /// (`createblockchain`) or from the first accepted network `block`.
    /// A single writer per namespace; async so proof-of-work (run on
    /// `spawn_blocking`) never holds this lock while searching.
    pub chain: AsyncMutex<Option<Chain>>,
}

impl Node {
    #[must_use]
    pub fn new(address: String, data_dir: String, chain: Option<Chain>, mining_pub_key_hash: Option<[u8; 20]>) -> Self {
        Self {
            address,
            data_dir,
            mining_pub_key_hash,
            known_nodes: Mutex::new(HashSet::new()),
            blocks_in_transit: Mutex::new(HashSet::new()),
            mempool: Mutex::new(HashMap::new()),
            chain: AsyncMutex::new(chain),
        }
    }

    #[must_use]
    pub fn is_full_node(&self) -> bool {
        SEED_FULL_NODES.contains(&self.address.as_str())
    }

    #[must_use]
    pub fn is_miner(&self) -> bool {
        self.mining_pub_key_hash.is_some()
    }

    pub fn add_known_node(&self, addr: &str) {
        if addr != self.address {
            self.known_nodes.lock().unwrap().insert(addr.to_string());
        }
    }

    pub fn merge_known_nodes(&self, addrs: &[String]) {
        let mut known = self.known_nodes.lock().unwrap();
        for addr in addrs {
            if addr != &self.address {
                known.insert(addr.clone());
            }
        }
    }

    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.known_nodes.lock().unwrap().iter().cloned().collect()
    }

    pub fn forget_peer(&self, addr: &str) {
        self.known_nodes.lock().unwrap().remove(addr);
    }

    pub fn mark_in_transit(&self, hashes: impl IntoIterator<Item = [u8; 32]>) {
        self.blocks_in_transit.lock().unwrap().extend(hashes);
    }

    /// Pops one arbitrary in-transit hash, if any.
    pub fn take_one_in_transit(&self) -> Option<[u8; 32]> {
        let mut transit = self.blocks_in_transit.lock().unwrap();
        let hash = *transit.iter().next()?;
        transit.remove(&hash);
        Some(hash)
    }

    pub fn mempool_insert(&self, tx: Transaction) {
        self.mempool.lock().unwrap().insert(tx.id, tx);
    }

    pub fn mempool_contains(&self, txid: &[u8; 32]) -> bool {
        self.mempool.lock().unwrap().contains_key(txid)
    }

    pub fn mempool_get(&self, txid: &[u8; 32]) -> Option<Transaction> {
        self.mempool.lock().unwrap().get(txid).cloned()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.lock().unwrap().len()
    }

    pub fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.mempool.lock().unwrap().values().cloned().collect()
    }

    pub fn mempool_remove(&self, txid: &[u8; 32]) {
        self.mempool.lock().unwrap().remove(txid);
    }

    pub async fn has_chain(&self) -> bool {
        self.chain.lock().await.is_some()
    }

    pub async fn best_height(&self) -> BondResult<Option<u64>> {
        let chain = self.chain.lock().await;
        chain.as_ref().map(|c| c.store.best_height().map(|(h, _)| h)).transpose()
    }

    pub async fn block_hashes(&self) -> BondResult<Vec<[u8; 32]>> {
        let chain = self.chain.lock().await;
        match chain.as_ref() {
            Some(c) => c.store.block_hashes(),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_block(&self, hash: &[u8; 32]) -> BondResult<Option<Block>> {
        let chain = self.chain.lock().await;
        match chain.as_ref() {
            Some(c) => c.store.get_block(hash),
            None => Ok(None),
        }
    }

    /// Installs the chain the first time it materializes, either from
    /// `createblockchain` or from an accepted genesis `block` message.
    pub async fn install_chain(&self, new_chain: Chain) {
        let mut chain = self.chain.lock().await;
        *chain = Some(new_chain);
    }
}
