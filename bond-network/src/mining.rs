//! Miner loop triggered from `handleTx`: repeatedly drains the mempool into
//! mined blocks while transactions remain. The chain lock is held only long
//! enough to clone the store/UTXO handles; the actual proof-of-work search
//! runs on a blocking thread so it never holds the lock idle while searching.

use crate::message::InvKind;
use crate::node::Node;
use crate::peer;
use bond_core::{select_valid_and_disjoint, ChainStore, UtxoSet};
use tracing::{info, warn};

pub async fn run_miner_loop(node: &Node) {
    loop {
        let snapshot = node.mempool_snapshot();
        if snapshot.is_empty() {
            return;
        }

        let Some(mining_hash) = node.mining_pub_key_hash else { return };

        let Some((store, utxo)) = clone_chain(node).await else { return };

        let (candidates, dropped) = select_valid_and_disjoint(snapshot, &utxo);
        for txid in &dropped {
            node.mempool_remove(txid);
        }
        if candidates.is_empty() {
            info!("no mempool transactions currently verify, waiting for new ones");
            return;
        }

        let timestamp = i64::try_from(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        )
        .unwrap_or(0);

        let included_ids: Vec<[u8; 32]> = candidates.iter().map(|tx| tx.id).collect();
        let mined = tokio::task::spawn_blocking(move || {
            let block = bond_core::mine_block(candidates, &store, &utxo, mining_hash, timestamp)?;
            utxo.update(&block)?;
            Ok::<_, bond_core::BondError>(block)
        })
        .await;

        let block = match mined {
            Ok(Ok(block)) => block,
            Ok(Err(e)) => {
                warn!(error = %e, "mining failed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "mining task panicked");
                return;
            }
        };

        for txid in &included_ids {
            node.mempool_remove(txid);
        }
        info!(hash = %hex::encode(block.hash), height = block.height, "mined block");

        for addr in node.peers() {
            if addr != node.address {
                peer::send_inv(node, &addr, InvKind::Block, vec![block.hash]).await;
            }
        }
    }
}

async fn clone_chain(node: &Node) -> Option<(ChainStore, UtxoSet)> {
    let chain = node.chain.lock().await;
    let c = chain.as_ref()?;
    Some((c.store.clone(), c.utxo.clone()))
}
