//! Derived index over unspent transaction outputs, kept under the
//! `chainstate` namespace: rebuildable from the chain in full
//! ([`UtxoSet::reindex`]) or kept incrementally consistent on every block
//! append ([`UtxoSet::update`]).

use crate::block::Block;
use crate::error::{BondError, BondResult};
use crate::store::ChainStore;
use crate::transaction::{txid_from_slice, TxOutput};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Live, unspent outputs of a single transaction, keyed by output index.
pub type TxOutputs = BTreeMap<u32, TxOutput>;

const CHAINSTATE_TREE: &str = "chainstate";

/// Cheap to clone — see [`crate::store::ChainStore`].
#[derive(Clone)]
pub struct UtxoSet {
    chainstate: sled::Tree,
}

impl UtxoSet {
    pub fn open(path: &str) -> BondResult<Self> {
        let db = sled::open(path)?;
        let chainstate = db.open_tree(CHAINSTATE_TREE)?;
        Ok(Self { chainstate })
    }

    pub(crate) fn read_outputs(&self, txid: &[u8; 32]) -> BondResult<Option<TxOutputs>> {
        match self.chainstate.get(txid)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                BondError::StoreCorruption(format!("undecodable TXOutputs: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    fn write_outputs(&self, txid: &[u8; 32], outputs: &TxOutputs) -> BondResult<()> {
        let bytes = serde_json::to_vec(outputs)
            .map_err(|e| BondError::StoreCorruption(e.to_string()))?;
        self.chainstate.insert(txid, bytes)?;
        Ok(())
    }

    /// Drops and rebuilds the whole index by walking the chain tip-to-genesis,
    /// maintaining a set of already-spent `(txid, out_idx)` pairs absorbed
    /// before each transaction's outputs are recorded.
    pub fn reindex(&self, store: &ChainStore) -> BondResult<()> {
        self.chainstate.clear()?;

        let mut spent: HashSet<([u8; 32], u32)> = HashSet::new();
        // Initialized explicitly before any write — the bug the source left
        // unchecked was writing into a map never allocated.
        let mut live: HashMap<[u8; 32], TxOutputs> = HashMap::new();

        for block in store.iterator()? {
            let block = block?;
            for tx in &block.transactions {
                let mut outputs = TxOutputs::new();
                for (idx, output) in tx.outputs.iter().enumerate() {
                    let idx = idx as u32;
                    if !spent.contains(&(tx.id, idx)) {
                        outputs.insert(idx, output.clone());
                    }
                }
                if !outputs.is_empty() {
                    live.insert(tx.id, outputs);
                }

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        let prev_id = txid_from_slice(&input.prev_tx_id)?;
                        spent.insert((prev_id, input.vout));
                    }
                }
            }
        }

        for (txid, outputs) in live {
            self.write_outputs(&txid, &outputs)?;
        }
        Ok(())
    }

    /// Applies one newly-appended block: removes spent entries, then
    /// unconditionally records every output of every transaction in the
    /// block as the current live set for that transaction.
    pub fn update(&self, block: &Block) -> BondResult<()> {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let prev_id = txid_from_slice(&input.prev_tx_id)?;
                    let mut outputs = self.read_outputs(&prev_id)?.unwrap_or_default();
                    outputs.remove(&input.vout);
                    if outputs.is_empty() {
                        self.chainstate.remove(prev_id)?;
                    } else {
                        self.write_outputs(&prev_id, &outputs)?;
                    }
                }
            }

            let mut outputs = TxOutputs::new();
            for (idx, output) in tx.outputs.iter().enumerate() {
                outputs.insert(idx as u32, output.clone());
            }
            self.write_outputs(&tx.id, &outputs)?;
        }
        Ok(())
    }

    /// Accumulates outputs locked by `pub_key_hash` until the running total
    /// exceeds `amount`, returning `(accumulated, txid -> spent output indices)`.
    /// Traversal order is unspecified; any subset meeting the amount is valid.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8; 20],
        amount: u64,
    ) -> BondResult<(u64, HashMap<[u8; 32], Vec<u32>>)> {
        let mut accumulated = 0u64;
        let mut selected: HashMap<[u8; 32], Vec<u32>> = HashMap::new();

        'outer: for entry in self.chainstate.iter() {
            let (key, value) = entry?;
            let txid: [u8; 32] = key
                .as_ref()
                .try_into()
                .map_err(|_| BondError::StoreCorruption("malformed chainstate key".to_string()))?;
            let outputs: TxOutputs = serde_json::from_slice(&value)
                .map_err(|e| BondError::StoreCorruption(format!("undecodable TXOutputs: {e}")))?;

            for (idx, output) in &outputs {
                if !output.is_locked_with_key(pub_key_hash) {
                    continue;
                }
                accumulated += output.value;
                selected.entry(txid).or_default().push(*idx);
                if accumulated > amount {
                    break 'outer;
                }
            }
        }

        Ok((accumulated, selected))
    }

    /// The full balance locked by `pub_key_hash`.
    pub fn find_utxo(&self, pub_key_hash: &[u8; 20]) -> BondResult<u64> {
        let (balance, _) = self.find_spendable_outputs(pub_key_hash, i64::MAX as u64)?;
        Ok(balance)
    }

    /// Number of transactions with at least one unspent output.
    pub fn count_transactions(&self) -> BondResult<usize> {
        Ok(self.chainstate.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Transaction, TxInput};

    fn open(dir: &tempfile::TempDir) -> (ChainStore, UtxoSet) {
        let path = dir.path().to_str().unwrap().to_string();
        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        let genesis = Block::genesis(coinbase, 1_700_000_000).unwrap();
        let store = ChainStore::create(&path, &genesis).unwrap();
        let utxo = UtxoSet::open(&path).unwrap();
        utxo.update(&genesis).unwrap();
        (store, utxo)
    }

    #[test]
    fn genesis_coinbase_output_is_spendable() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, utxo) = open(&dir);
        assert_eq!(utxo.find_utxo(&[1u8; 20]).unwrap(), 10);
        assert_eq!(utxo.count_transactions().unwrap(), 1);
    }

    #[test]
    fn spending_an_output_removes_it_from_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, utxo) = open(&dir);

        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        let spend_input = TxInput {
            prev_tx_id: coinbase.id.to_vec(),
            vout: 0,
            signature: vec![0; 64],
            pub_key: vec![0; 65],
        };
        let spend = Transaction::new(
            vec![spend_input],
            vec![crate::transaction::TxOutput::new(10, [2u8; 20])],
        )
        .unwrap();
        let block = Block::candidate(
            vec![Transaction::new_coinbase([3u8; 20], Vec::new(), 10).unwrap(), spend],
            coinbase.id.to_vec(),
            1,
            1_700_000_001,
        )
        .unwrap();

        utxo.update(&block).unwrap();
        assert_eq!(utxo.find_utxo(&[1u8; 20]).unwrap(), 0);
        assert_eq!(utxo.find_utxo(&[2u8; 20]).unwrap(), 10);
    }

    #[test]
    fn reindex_reproduces_incremental_update_state() {
        let dir = tempfile::tempdir().unwrap();
        let (store, utxo) = open(&dir);

        let before = utxo.find_utxo(&[1u8; 20]).unwrap();
        utxo.reindex(&store).unwrap();
        let after = utxo.find_utxo(&[1u8; 20]).unwrap();
        assert_eq!(before, after);
    }
}
