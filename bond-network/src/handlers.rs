//! Per-verb handler behavior, dispatched by the accept loop. Each handler
//! mirrors the table in the protocol design one entry at a time.

use crate::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvKind, InvPayload, TxPayload,
    VersionPayload,
};
use crate::mining::run_miner_loop;
use crate::node::{Chain, Node};
use crate::peer;
use bond_core::{Block, ChainStore, Transaction, UtxoSet};
use tracing::{info, warn};

pub async fn handle_version(node: &Node, payload: VersionPayload) {
    match node.best_height().await {
        Ok(Some(my_height)) => {
            if my_height < payload.best_height {
                peer::send_get_blocks(node, &payload.addr_from).await;
            } else if my_height > payload.best_height {
                peer::send_version(node, &payload.addr_from).await;
            }
        }
        Ok(None) => {
            // No local chain yet: nothing to compare, nothing to request.
        }
        Err(e) => warn!(error = %e, "version: failed to read local height"),
    }
    node.add_known_node(&payload.addr_from);
}

pub async fn handle_get_blocks(node: &Node, payload: GetBlocksPayload) {
    match node.block_hashes().await {
        Ok(hashes) => peer::send_inv(node, &payload.addr_from, InvKind::Block, hashes).await,
        Err(e) => warn!(error = %e, "getblocks: failed to read block hashes"),
    }
}

pub async fn handle_inv(node: &Node, payload: InvPayload) {
    match payload.kind {
        InvKind::Block => {
            node.mark_in_transit(payload.items);
            if let Some(hash) = node.take_one_in_transit() {
                peer::send_get_data(node, &payload.addr_from, InvKind::Block, hash).await;
            }
        }
        InvKind::Tx => {
            for txid in payload.items {
                if !node.mempool_contains(&txid) {
                    peer::send_get_data(node, &payload.addr_from, InvKind::Tx, txid).await;
                    break;
                }
            }
        }
    }
}

pub async fn handle_get_data(node: &Node, payload: GetDataPayload) {
    match payload.kind {
        InvKind::Block => match node.get_block(&payload.id).await {
            Ok(Some(block)) => peer::send_block(node, &payload.addr_from, &block).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "getdata: block lookup failed"),
        },
        InvKind::Tx => {
            if let Some(tx) = node.mempool_get(&payload.id) {
                peer::send_tx(node, &payload.addr_from, &tx).await;
            }
        }
    }
}

pub async fn handle_block(node: &Node, payload: BlockPayload) {
    let block = match Block::deserialize(&payload.block) {
        Ok(block) => block,
        Err(e) => {
            warn!(error = %e, "block: undecodable payload");
            return;
        }
    };

    if is_genesis_block(&block) {
        if !node.has_chain().await {
            match materialize_genesis(node, &block).await {
                Ok(()) => info!(hash = %hex::encode(block.hash), "accepted network genesis"),
                Err(e) => warn!(error = %e, "failed to materialize genesis from network"),
            }
        }
    } else {
        let mut chain = node.chain.lock().await;
        if let Some(c) = chain.as_mut() {
            match bond_core::verify_block(&block, &c.store, &c.utxo, true) {
                Ok(true) => match c.store.append(&block).and_then(|()| c.utxo.update(&block)) {
                    Ok(()) => info!(hash = %hex::encode(block.hash), height = block.height, "appended block"),
                    Err(e) => warn!(error = %e, "failed to append verified block"),
                },
                Ok(false) => warn!(hash = %hex::encode(block.hash), "received block failed verification"),
                Err(e) => warn!(error = %e, "block verification errored"),
            }
        }
    }

    if let Some(hash) = node.take_one_in_transit() {
        peer::send_get_data(node, &payload.addr_from, InvKind::Block, hash).await;
    }
}

fn is_genesis_block(block: &Block) -> bool {
    block.is_genesis() && block.transactions.len() == 1 && block.transactions[0].is_coinbase()
}

async fn materialize_genesis(node: &Node, genesis: &Block) -> bond_core::BondResult<()> {
    let store = ChainStore::create(&node.data_dir, genesis)?;
    let utxo = UtxoSet::open(&node.data_dir)?;
    utxo.reindex(&store)?;
    node.install_chain(Chain { store, utxo }).await;
    Ok(())
}

pub async fn handle_tx(node: &Node, payload: TxPayload) {
    let tx = match Transaction::deserialize(&payload.transaction) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "tx: undecodable payload");
            return;
        }
    };

    let accepted = {
        let chain = node.chain.lock().await;
        match chain.as_ref() {
            Some(c) => bond_core::verify_transaction(&tx, &c.utxo).unwrap_or(false),
            None => false,
        }
    };
    if accepted && !tx.is_coinbase() {
        node.mempool_insert(tx.clone());
    }

    if node.is_full_node() {
        for addr in node.peers() {
            if addr != node.address && addr != payload.addr_from {
                peer::send_inv(node, &addr, InvKind::Tx, vec![tx.id]).await;
            }
        }
    } else if node.is_miner() && node.mempool_len() >= 2 {
        run_miner_loop(node).await;
    }
}

pub async fn handle_addr(node: &Node, payload: AddrPayload) {
    node.merge_known_nodes(&payload.addr_list);
    info!(count = node.peers().len(), "known nodes updated");
    for addr in node.peers() {
        peer::send_get_blocks(node, &addr).await;
    }
}
