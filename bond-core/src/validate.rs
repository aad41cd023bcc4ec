//! Transaction and block acceptance rules, checked against the UTXO index
//! and chain store before a block is mined or appended.

use crate::block::Block;
use crate::error::{BondError, BondResult};
use crate::store::ChainStore;
use crate::transaction::{txid_from_slice, Transaction, TxOutput};
use crate::utxo::UtxoSet;
use std::collections::{HashMap, HashSet};

/// Builds the minimal stand-in for a previous transaction that
/// `Transaction::verify_signatures`'s trimmed-copy reconstruction needs: an
/// outputs vector long enough to index by vout, populated only at the
/// indices this spend actually references (other slots are never read).
fn stub_prev_tx(needed: &[(u32, TxOutput)]) -> Transaction {
    let len = needed.iter().map(|(vout, _)| *vout as usize + 1).max().unwrap_or(0);
    let mut outputs = vec![TxOutput::new(0, [0u8; 20]); len];
    for (vout, output) in needed {
        outputs[*vout as usize] = output.clone();
    }
    Transaction { id: [0u8; 32], inputs: Vec::new(), outputs }
}

/// Checks a transaction against the current UTXO index: every input
/// references a live output it is entitled to spend, no input is
/// referenced twice, outputs do not exceed inputs, and signatures verify.
/// Coinbase transactions are trivially valid.
pub fn verify_transaction(tx: &Transaction, utxo: &UtxoSet) -> BondResult<bool> {
    if tx.is_coinbase() {
        return Ok(true);
    }

    let mut seen: HashSet<([u8; 32], u32)> = HashSet::new();
    let mut in_sum: u64 = 0;
    let mut referenced: HashMap<[u8; 32], Vec<(u32, TxOutput)>> = HashMap::new();

    for input in &tx.inputs {
        let prev_id = txid_from_slice(&input.prev_tx_id)?;
        if !seen.insert((prev_id, input.vout)) {
            return Ok(false);
        }

        let Some(outputs) = utxo.read_outputs(&prev_id)? else {
            return Ok(false);
        };
        let Some(output) = outputs.get(&input.vout) else {
            return Ok(false);
        };
        if !input.uses_key(&output.pub_key_hash) {
            return Ok(false);
        }
        in_sum += output.value;
        referenced.entry(prev_id).or_default().push((input.vout, output.clone()));
    }

    let out_sum: u64 = tx.outputs.iter().map(|o| o.value).sum();
    if out_sum > in_sum {
        return Ok(false);
    }

    let prev_txs: HashMap<[u8; 32], Transaction> = referenced
        .into_iter()
        .map(|(txid, needed)| (txid, stub_prev_tx(&needed)))
        .collect();
    tx.verify_signatures(&prev_txs)
}

/// Checks a candidate (or received) block: it must extend the current tip
/// at the next height, contain no intra-block double-spend, and every
/// transaction must verify. `check_pow` is false for a just-mined block
/// (its hash has not been searched for yet) and true for a block received
/// from the network.
pub fn verify_block(
    block: &Block,
    store: &ChainStore,
    utxo: &UtxoSet,
    check_pow: bool,
) -> BondResult<bool> {
    let (best_height, tip) = store.best_height()?;
    if block.prev_block_hash != tip.to_vec() || block.height != best_height + 1 {
        return Ok(false);
    }

    if check_pow && !block.validate_pow()? {
        return Ok(false);
    }

    let mut spent: HashSet<([u8; 32], u32)> = HashSet::new();
    for tx in &block.transactions {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                let prev_id = txid_from_slice(&input.prev_tx_id)?;
                if !spent.insert((prev_id, input.vout)) {
                    return Ok(false);
                }
            }
        }
        if !verify_transaction(tx, utxo)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Shorthand for an invalid result turned into an error, used by callers
/// that want to propagate rejection rather than branch on a bool.
pub fn require_valid_block(
    block: &Block,
    store: &ChainStore,
    utxo: &UtxoSet,
    check_pow: bool,
) -> BondResult<()> {
    if verify_block(block, store, utxo, check_pow)? {
        Ok(())
    } else {
        Err(BondError::InvalidBlock("block failed verification".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxInput, TxOutput};

    fn genesis_chain() -> (ChainStore, UtxoSet, Transaction, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        let genesis = Block::genesis(coinbase.clone(), 1_700_000_000).unwrap();
        let store = ChainStore::create(&path, &genesis).unwrap();
        let utxo = UtxoSet::open(&path).unwrap();
        utxo.update(&genesis).unwrap();
        (store, utxo, coinbase, dir)
    }

    #[test]
    fn coinbase_is_trivially_valid() {
        let (_store, utxo, _coinbase, _dir) = genesis_chain();
        let tx = Transaction::new_coinbase([2u8; 20], Vec::new(), 10).unwrap();
        assert!(verify_transaction(&tx, &utxo).unwrap());
    }

    #[test]
    fn spend_exceeding_inputs_is_rejected() {
        let (_store, utxo, coinbase, _dir) = genesis_chain();
        let spend_input = TxInput {
            prev_tx_id: coinbase.id.to_vec(),
            vout: 0,
            signature: vec![0; 64],
            pub_key: vec![0; 65],
        };
        let spend = Transaction::new(
            vec![spend_input],
            vec![TxOutput::new(999, [2u8; 20])],
        )
        .unwrap();
        assert!(!verify_transaction(&spend, &utxo).unwrap());
    }

    #[test]
    fn verify_block_rejects_wrong_prev_hash() {
        let (store, utxo, _coinbase, _dir) = genesis_chain();
        let next_coinbase = Transaction::new_coinbase([3u8; 20], Vec::new(), 10).unwrap();
        let bogus = Block::candidate(vec![next_coinbase], vec![9; 32], 1, 1_700_000_001).unwrap();
        assert!(!verify_block(&bogus, &store, &utxo, false).unwrap());
    }

    #[test]
    fn intra_block_double_spend_is_rejected() {
        let (store, utxo, coinbase, _dir) = genesis_chain();
        let (_, tip) = store.best_height().unwrap();

        let make_spend = |to: [u8; 20]| {
            let input = TxInput {
                prev_tx_id: coinbase.id.to_vec(),
                vout: 0,
                signature: vec![0; 64],
                pub_key: vec![0; 65],
            };
            Transaction::new(vec![input], vec![TxOutput::new(1, to)]).unwrap()
        };

        let next_coinbase = Transaction::new_coinbase([4u8; 20], Vec::new(), 10).unwrap();
        let block = Block::candidate(
            vec![next_coinbase, make_spend([5u8; 20]), make_spend([6u8; 20])],
            tip.to_vec(),
            1,
            1_700_000_001,
        )
        .unwrap();

        assert!(!verify_block(&block, &store, &utxo, false).unwrap());
    }
}
