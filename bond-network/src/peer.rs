//! Outbound sends: one short-lived TCP connection per message, matching the
//! source's `sendData`/`send*` family.

use crate::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvKind, InvPayload, Message,
    TxPayload, VersionPayload,
};
use crate::node::{Node, PROTOCOL_VERSION};
use bond_core::{Block, Transaction};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

/// Connects, writes the full message, and closes. On failure the peer is
/// dropped from `known_nodes` — the network-error recovery policy.
pub async fn send_data(node: &Node, addr: &str, bytes: Vec<u8>) {
    match TcpStream::connect(addr).await {
        Ok(mut stream) => {
            if let Err(e) = stream.write_all(&bytes).await {
                warn!(peer = addr, error = %e, "send failed, dropping peer");
                node.forget_peer(addr);
            }
        }
        Err(e) => {
            warn!(peer = addr, error = %e, "peer unreachable, dropping peer");
            node.forget_peer(addr);
        }
    }
}

pub async fn send_version(node: &Node, addr: &str) {
    let Ok(Some(best_height)) = node.best_height().await else { return };
    let payload = VersionPayload {
        version: PROTOCOL_VERSION,
        best_height,
        addr_from: node.address.clone(),
    };
    if let Ok(bytes) = Message::Version(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_get_blocks(node: &Node, addr: &str) {
    let payload = GetBlocksPayload { addr_from: node.address.clone() };
    if let Ok(bytes) = Message::GetBlocks(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_inv(node: &Node, addr: &str, kind: InvKind, items: Vec<[u8; 32]>) {
    let payload = InvPayload { addr_from: node.address.clone(), kind, items };
    if let Ok(bytes) = Message::Inv(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_get_data(node: &Node, addr: &str, kind: InvKind, id: [u8; 32]) {
    let payload = GetDataPayload { addr_from: node.address.clone(), kind, id };
    if let Ok(bytes) = Message::GetData(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_block(node: &Node, addr: &str, block: &Block) {
    let Ok(serialized) = block.serialize() else { return };
    let payload = BlockPayload { addr_from: node.address.clone(), block: serialized };
    if let Ok(bytes) = Message::Block(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_tx(node: &Node, addr: &str, tx: &Transaction) {
    let Ok(serialized) = tx.serialize() else { return };
    let payload = TxPayload { addr_from: node.address.clone(), transaction: serialized };
    if let Ok(bytes) = Message::Tx(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}

pub async fn send_addr(node: &Node, addr: &str) {
    let mut addr_list = node.peers();
    addr_list.push(node.address.clone());
    let payload = AddrPayload { addr_list };
    if let Ok(bytes) = Message::Addr(payload).encode() {
        send_data(node, addr, bytes).await;
    }
}
