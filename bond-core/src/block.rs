use crate::pow;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared::{BlockchainError, Result};

/// An immutable block: a timestamped, ordered list of transactions committed
/// by a Merkle root, chained to its predecessor by hash, and sealed by a
/// proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Wall-clock Unix timestamp at creation.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    /// Hash of the predecessor block; empty for genesis.
    pub prev_block_hash: Vec<u8>,
    /// Proof-of-work output.
    pub hash: [u8; 32],
    pub nonce: u64,
    pub height: u64,
}

impl Block {
    /// Builds an unmined candidate block: validates the coinbase-first shape
    /// but leaves `hash`/`nonce` at their zero placeholder until [`Self::mine`]
    /// runs.
    pub fn candidate(
        transactions: Vec<Transaction>,
        prev_block_hash: Vec<u8>,
        height: u64,
        timestamp: i64,
    ) -> Result<Self> {
        if transactions.is_empty() || !transactions[0].is_coinbase() {
            return Err(BlockchainError::InvalidBlock(
                "block must open with a coinbase transaction".to_string(),
            ));
        }
        for tx in &transactions[1..] {
            if tx.is_coinbase() {
                return Err(BlockchainError::InvalidBlock(
                    "multiple coinbase transactions".to_string(),
                ));
            }
        }

        Ok(Self {
            timestamp,
            transactions,
            prev_block_hash,
            hash: [0u8; 32],
            nonce: 0,
            height,
        })
    }

    /// Builds and mines the genesis block: height 0, empty predecessor.
    pub fn genesis(coinbase: Transaction, timestamp: i64) -> Result<Self> {
        let mut block = Self::candidate(vec![coinbase], Vec::new(), 0, timestamp)?;
        block.mine()?;
        Ok(block)
    }

    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_block_hash.is_empty()
    }

    /// Merkle root over the block's serialized transactions.
    pub fn merkle_root(&self) -> Result<[u8; 32]> {
        let tx_bytes = self
            .transactions
            .iter()
            .map(Transaction::serialize)
            .collect::<Result<Vec<_>>>()?;
        Ok(pow::merkle_root(&tx_bytes))
    }

    /// Runs the proof-of-work search and sets `nonce`/`hash`.
    pub fn mine(&mut self) -> Result<()> {
        let merkle_root = self.merkle_root()?;
        let (nonce, hash) = pow::run(&self.prev_block_hash, &merkle_root, self.timestamp)?;
        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    /// Recomputes and checks the proof-of-work for this block's stored
    /// `nonce`/`hash`.
    pub fn validate_pow(&self) -> Result<bool> {
        let merkle_root = self.merkle_root()?;
        Ok(pow::validate(
            &self.prev_block_hash,
            &merkle_root,
            self.timestamp,
            self.nonce,
            &self.hash,
        ))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn coinbase() -> Transaction {
        Transaction::new_coinbase([7u8; 20], Vec::new(), 10).unwrap()
    }

    #[test]
    fn genesis_block_has_height_zero_and_empty_prev_hash() {
        let genesis = Block::genesis(coinbase(), 1_700_000_000).unwrap();
        assert!(genesis.is_genesis());
        assert!(genesis.prev_block_hash.is_empty());
        assert_eq!(genesis.height, 0);
    }

    #[test]
    fn mined_block_passes_its_own_pow_validation() {
        let genesis = Block::genesis(coinbase(), 1_700_000_000).unwrap();
        assert!(genesis.validate_pow().unwrap());
    }

    #[test]
    fn block_hash_is_deterministic_across_recomputation() {
        let genesis = Block::genesis(coinbase(), 1_700_000_000).unwrap();
        let merkle_again = genesis.merkle_root().unwrap();
        assert_eq!(merkle_again, genesis.merkle_root().unwrap());
    }

    #[test]
    fn round_trip_serialization_reproduces_the_block() {
        let genesis = Block::genesis(coinbase(), 1_700_000_000).unwrap();
        let bytes = genesis.serialize().unwrap();
        let restored = Block::deserialize(&bytes).unwrap();
        assert_eq!(restored.serialize().unwrap(), bytes);
    }

    #[test]
    fn candidate_rejects_a_block_without_leading_coinbase() {
        let tx = coinbase();
        let err = Block::candidate(vec![], vec![], 1, 0).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidBlock(_)));

        let non_coinbase_first = vec![tx.clone(), tx];
        let err = Block::candidate(non_coinbase_first, vec![1], 1, 0);
        // two coinbases: first is fine structurally but second is rejected
        assert!(err.is_err());
    }
}
