//! Block assembly: turns a set of mempool transactions plus a coinbase into
//! an appended, UTXO-consistent block.

use crate::block::Block;
use crate::error::BondResult;
use crate::store::ChainStore;
use crate::transaction::Transaction;
use crate::utxo::UtxoSet;
use crate::validate::require_valid_block;
use tracing::info;

/// Block reward paid to the miner's address; fixed, no halving schedule.
pub const SUBSIDY: u64 = 10;

/// Assembles `txs` behind a coinbase paying `miner_pub_key_hash`, verifies
/// the candidate (`check_pow = false`, its hash has not been searched for
/// yet), runs proof-of-work, and appends the result to `store`.
///
/// Callers must subsequently call [`UtxoSet::update`] with the returned
/// block and gossip an `inv` announcing its hash.
pub fn mine_block(
    txs: Vec<Transaction>,
    store: &ChainStore,
    utxo: &UtxoSet,
    miner_pub_key_hash: [u8; 20],
    timestamp: i64,
) -> BondResult<Block> {
    let (height, tip) = store.best_height()?;
    let coinbase = Transaction::new_coinbase(miner_pub_key_hash, Vec::new(), SUBSIDY)?;

    let mut transactions = Vec::with_capacity(txs.len() + 1);
    transactions.push(coinbase);
    transactions.extend(txs);

    let mut candidate = Block::candidate(transactions, tip.to_vec(), height + 1, timestamp)?;
    require_valid_block(&candidate, store, utxo, false)?;

    candidate.mine()?;
    store.append(&candidate)?;
    info!(height = candidate.height, nonce = candidate.nonce, "mined block");
    Ok(candidate)
}

/// Single-pass dedup of a mempool snapshot: a transaction whose any input
/// collides with one already accepted in this pass is dropped, along with
/// transactions that no longer verify against the UTXO index. Returns the
/// accepted transactions plus the ids of every dropped one, so the caller
/// can evict the dropped ids from the live mempool.
#[must_use]
pub fn select_valid_and_disjoint(
    mempool: Vec<Transaction>,
    utxo: &UtxoSet,
) -> (Vec<Transaction>, Vec<[u8; 32]>) {
    use crate::validate::verify_transaction;
    use std::collections::HashSet;

    let mut accepted = Vec::new();
    let mut dropped = Vec::new();
    let mut claimed: HashSet<([u8; 32], u32)> = HashSet::new();

    'tx: for tx in mempool {
        if !verify_transaction(&tx, utxo).unwrap_or(false) {
            dropped.push(tx.id);
            continue;
        }
        let mut this_tx_inputs = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let Ok(prev_id) = crate::transaction::txid_from_slice(&input.prev_tx_id) else {
                dropped.push(tx.id);
                continue 'tx;
            };
            if claimed.contains(&(prev_id, input.vout)) {
                dropped.push(tx.id);
                continue 'tx;
            }
            this_tx_inputs.push((prev_id, input.vout));
        }
        claimed.extend(this_tx_inputs);
        accepted.push(tx);
    }

    (accepted, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxInput, TxOutput};

    fn open(dir: &tempfile::TempDir) -> (ChainStore, UtxoSet) {
        let path = dir.path().to_str().unwrap().to_string();
        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), SUBSIDY).unwrap();
        let genesis = Block::genesis(coinbase, 1_700_000_000).unwrap();
        let store = ChainStore::create(&path, &genesis).unwrap();
        let utxo = UtxoSet::open(&path).unwrap();
        utxo.update(&genesis).unwrap();
        (store, utxo)
    }

    #[test]
    fn mine_block_extends_the_chain_by_one() {
        let dir = tempfile::tempdir().unwrap();
        let (store, utxo) = open(&dir);

        let block = mine_block(vec![], &store, &utxo, [2u8; 20], 1_700_000_001).unwrap();
        assert_eq!(block.height, 1);
        assert!(block.validate_pow().unwrap());
        assert_eq!(store.best_height().unwrap().0, 1);
    }

    #[test]
    fn select_valid_and_disjoint_drops_conflicting_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, utxo) = open(&dir);
        let coinbase = Transaction::new_coinbase([1u8; 20], Vec::new(), SUBSIDY).unwrap();
        utxo.update(&Block::candidate(vec![coinbase.clone()], vec![], 0, 0).unwrap())
            .unwrap();

        let make_spend = |to: [u8; 20]| {
            let input = TxInput {
                prev_tx_id: coinbase.id.to_vec(),
                vout: 0,
                signature: vec![0; 64],
                pub_key: vec![0; 65],
            };
            Transaction::new(vec![input], vec![TxOutput::new(1, to)]).unwrap()
        };

        let mempool = vec![make_spend([5u8; 20]), make_spend([6u8; 20])];
        let (accepted, dropped) = select_valid_and_disjoint(mempool, &utxo);
        assert_eq!(accepted.len(), 1);
        assert_eq!(dropped.len(), 1);
    }
}
