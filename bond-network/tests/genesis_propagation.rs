//! A node with no local database accepts a genesis block pushed to it over
//! the wire and materializes a chain + UTXO index from it.

use bond_core::{Block, Transaction};
use bond_network::handlers::handle_block;
use bond_network::message::BlockPayload;
use bond_network::node::Node;

#[tokio::test]
async fn inbound_genesis_block_bootstraps_a_chainless_node() {
    let coinbase = Transaction::new_coinbase([4u8; 20], b"seed".to_vec(), 10).unwrap();
    let genesis = Block::genesis(coinbase, 1_700_000_000).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let node = Node::new(
        "127.0.0.1:19183".to_string(),
        dir.path().to_str().unwrap().to_string(),
        None,
        None,
    );

    assert!(!node.has_chain().await);

    let payload = BlockPayload {
        addr_from: "127.0.0.1:19184".to_string(),
        block: genesis.serialize().unwrap(),
    };
    handle_block(&node, payload).await;

    assert!(node.has_chain().await);
    assert_eq!(node.best_height().await.unwrap(), Some(0));
}

#[tokio::test]
async fn a_non_genesis_block_is_ignored_when_no_chain_exists_yet() {
    let coinbase = Transaction::new_coinbase([5u8; 20], b"seed".to_vec(), 10).unwrap();
    let genesis = Block::genesis(coinbase, 1_700_000_000).unwrap();
    let second = Block::candidate(
        vec![Transaction::new_coinbase([6u8; 20], Vec::new(), 10).unwrap()],
        genesis.hash.to_vec(),
        1,
        1_700_000_100,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let node = Node::new(
        "127.0.0.1:19185".to_string(),
        dir.path().to_str().unwrap().to_string(),
        None,
        None,
    );

    let payload = BlockPayload {
        addr_from: "127.0.0.1:19186".to_string(),
        block: second.serialize().unwrap(),
    };
    handle_block(&node, payload).await;

    assert!(!node.has_chain().await);
}
