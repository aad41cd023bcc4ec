//! Persistent, append-only block storage: a `blocks` namespace holding
//! `hash -> serialized block` plus the reserved key `"l" -> tip hash`, backed
//! by an embedded `sled` database (the closest maintained analogue to the
//! single-file, named-bucket, ACID-transaction store the original protocol
//! was built on).

use crate::block::Block;
use crate::error::{BondError, BondResult};

const TIP_KEY: &[u8] = b"l";
const BLOCKS_TREE: &str = "blocks";

/// A node's persistent chain: one block keyed by hash, plus a tip pointer,
/// both written atomically on append. Cheap to clone — `sled::Tree` is a
/// shared handle onto the same on-disk pages, so a clone can be moved onto a
/// blocking thread for mining without holding any lock idle.
#[derive(Clone)]
pub struct ChainStore {
    blocks: sled::Tree,
}

impl ChainStore {
    /// Opens an existing store at `path`. Fails if the per-node file is
    /// absent or has no tip recorded yet.
    pub fn open(path: &str) -> BondResult<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        if !blocks.contains_key(TIP_KEY)? {
            return Err(BondError::ConfigError(format!(
                "no blockchain found at {path}, run createblockchain first"
            )));
        }
        Ok(Self { blocks })
    }

    /// Creates a fresh store at `path` seeded with `genesis`. Fails if a tip
    /// is already recorded there.
    pub fn create(path: &str, genesis: &Block) -> BondResult<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        if blocks.contains_key(TIP_KEY)? {
            return Err(BondError::ConfigError(format!(
                "blockchain already exists at {path}"
            )));
        }
        let store = Self { blocks };
        store.append(genesis)?;
        Ok(store)
    }

    /// Looks up a block by hash.
    pub fn get_block(&self, hash: &[u8; 32]) -> BondResult<Option<Block>> {
        match self.blocks.get(hash)? {
            Some(bytes) => Ok(Some(Block::deserialize(&bytes).map_err(|e| {
                BondError::StoreCorruption(format!("undecodable block {}: {e}", hex::encode(hash)))
            })?)),
            None => Ok(None),
        }
    }

    /// Writes the block record and updates the tip pointer in a single
    /// transaction — a crash between the two is impossible.
    pub fn append(&self, block: &Block) -> BondResult<()> {
        let bytes = block
            .serialize()
            .map_err(|e| BondError::StoreCorruption(e.to_string()))?;
        let mut batch = sled::Batch::default();
        batch.insert(&block.hash[..], bytes);
        batch.insert(TIP_KEY, &block.hash[..]);
        self.blocks.apply_batch(batch)?;
        self.blocks.flush()?;
        Ok(())
    }

    /// Current `(height, tip_hash)`.
    pub fn best_height(&self) -> BondResult<(u64, [u8; 32])> {
        let tip = self.tip_hash()?;
        let block = self
            .get_block(&tip)?
            .ok_or_else(|| BondError::StoreCorruption("tip hash has no block".to_string()))?;
        Ok((block.height, tip))
    }

    fn tip_hash(&self) -> BondResult<[u8; 32]> {
        let bytes = self
            .blocks
            .get(TIP_KEY)?
            .ok_or_else(|| BondError::StoreCorruption("missing tip pointer".to_string()))?;
        bytes
            .as_ref()
            .try_into()
            .map_err(|_| BondError::StoreCorruption("malformed tip pointer".to_string()))
    }

    /// Iterates blocks from the tip back to genesis.
    pub fn iterator(&self) -> BondResult<ChainIterator<'_>> {
        Ok(ChainIterator {
            store: self,
            next_hash: Some(self.tip_hash()?),
        })
    }

    /// All block hashes, tip-to-genesis.
    pub fn block_hashes(&self) -> BondResult<Vec<[u8; 32]>> {
        self.iterator()?.map(|r| r.map(|b| b.hash)).collect()
    }
}

pub struct ChainIterator<'a> {
    store: &'a ChainStore,
    next_hash: Option<[u8; 32]>,
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = BondResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash.take()?;
        match self.store.get_block(&hash) {
            Ok(Some(block)) => {
                self.next_hash = if block.prev_block_hash.is_empty() {
                    None
                } else {
                    block.prev_block_hash.as_slice().try_into().ok()
                };
                Some(Ok(block))
            }
            Ok(None) => Some(Err(BondError::StoreCorruption(format!(
                "dangling reference to missing block {}",
                hex::encode(hash)
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn genesis() -> Block {
        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        Block::genesis(coinbase, 1_700_000_000).unwrap()
    }

    #[test]
    fn create_then_open_round_trips_the_genesis_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain").to_str().unwrap().to_string();
        let genesis_block = genesis();
        {
            let store = ChainStore::create(&path, &genesis_block).unwrap();
            let (height, tip) = store.best_height().unwrap();
            assert_eq!(height, 0);
            assert_eq!(tip, genesis_block.hash);
        }
        let reopened = ChainStore::open(&path).unwrap();
        assert_eq!(reopened.best_height().unwrap().0, 0);
    }

    #[test]
    fn create_twice_at_the_same_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain").to_str().unwrap().to_string();
        let genesis_block = genesis();
        ChainStore::create(&path, &genesis_block).unwrap();
        assert!(ChainStore::create(&path, &genesis_block).is_err());
    }

    #[test]
    fn open_without_existing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").to_str().unwrap().to_string();
        assert!(ChainStore::open(&path).is_err());
    }

    #[test]
    fn iterator_terminates_at_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain").to_str().unwrap().to_string();
        let genesis_block = genesis();
        let store = ChainStore::create(&path, &genesis_block).unwrap();
        let blocks: Vec<_> = store.iterator().unwrap().collect::<BondResult<_>>().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_genesis());
    }
}
