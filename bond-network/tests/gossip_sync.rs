//! End-to-end: two nodes sharing a genesis block, one of them mines a new
//! block, and the other picks it up entirely over the wire through the
//! `inv` -> `getdata` -> `block` cycle.

use bond_core::{Block, ChainStore, Transaction, UtxoSet};
use bond_network::message::InvKind;
use bond_network::node::{Chain, Node};
use bond_network::{peer, server};
use std::sync::Arc;
use std::time::Duration;

fn shared_genesis() -> Block {
    let coinbase = Transaction::new_coinbase([1u8; 20], b"genesis".to_vec(), 10).unwrap();
    Block::genesis(coinbase, 1_700_000_000).unwrap()
}

async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) {
    let start = std::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("condition did not become true in time");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn a_mined_block_propagates_to_a_peer_over_the_wire() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let genesis = shared_genesis();

    let path_a = dir_a.path().to_str().unwrap().to_string();
    let path_b = dir_b.path().to_str().unwrap().to_string();

    let store_a = ChainStore::create(&path_a, &genesis).unwrap();
    let utxo_a = UtxoSet::open(&path_a).unwrap();
    utxo_a.reindex(&store_a).unwrap();

    let store_b = ChainStore::create(&path_b, &genesis).unwrap();
    let utxo_b = UtxoSet::open(&path_b).unwrap();
    utxo_b.reindex(&store_b).unwrap();

    let addr_a = "127.0.0.1:19181".to_string();
    let addr_b = "127.0.0.1:19182".to_string();

    let node_a = Arc::new(Node::new(
        addr_a.clone(),
        path_a,
        Some(Chain { store: store_a, utxo: utxo_a }),
        Some([2u8; 20]),
    ));
    let node_b = Arc::new(Node::new(
        addr_b.clone(),
        path_b,
        Some(Chain { store: store_b, utxo: utxo_b }),
        None,
    ));

    tokio::spawn(server::start(Arc::clone(&node_a)));
    tokio::spawn(server::start(Arc::clone(&node_b)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mined = {
        let chain = node_a.chain.lock().await;
        let c = chain.as_ref().unwrap();
        bond_core::mine_block(vec![], &c.store, &c.utxo, [2u8; 20], 1_700_000_100).unwrap()
    };
    {
        let chain = node_a.chain.lock().await;
        chain.as_ref().unwrap().utxo.update(&mined).unwrap();
    }

    peer::send_inv(&node_a, &addr_b, InvKind::Block, vec![mined.hash]).await;

    wait_until(
        || {
            node_b
                .chain
                .try_lock()
                .ok()
                .and_then(|c| c.as_ref().map(|c| c.store.best_height().ok()))
                .flatten()
                .map(|(h, _)| h)
                == Some(1)
        },
        Duration::from_secs(5),
    )
    .await;

    let chain = node_b.chain.lock().await;
    let (height, tip) = chain.as_ref().unwrap().store.best_height().unwrap();
    assert_eq!(height, 1);
    assert_eq!(tip, mined.hash);
}
