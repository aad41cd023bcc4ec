//! The accept loop: single-threaded, each connection handled on its own
//! task, reading the full message to EOF before dispatching and closing.
//! There is no long-lived per-peer connection.

use crate::handlers;
use crate::message::Message;
use crate::node::Node;
use crate::peer;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

pub async fn start(node: Arc<Node>) -> bond_core::BondResult<()> {
    let listener = TcpListener::bind(&node.address).await?;
    info!(address = %node.address, "listening");

    if node.has_chain().await && !node.is_full_node() {
        let seed = crate::node::SEED_FULL_NODES[0];
        peer::send_version(&node, seed).await;
    }

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        info!(peer = %peer_addr, "peer connected");
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&node, stream).await {
                warn!(error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(node: &Node, mut stream: TcpStream) -> bond_core::BondResult<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;

    let message = match Message::decode(&buf) {
        Ok(Some(message)) => message,
        Ok(None) => {
            warn!("unknown command, dropping");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "malformed message, dropping");
            return Ok(());
        }
    };

    match message {
        Message::Version(p) => handlers::handle_version(node, p).await,
        Message::GetBlocks(p) => handlers::handle_get_blocks(node, p).await,
        Message::Inv(p) => handlers::handle_inv(node, p).await,
        Message::GetData(p) => handlers::handle_get_data(node, p).await,
        Message::Block(p) => handlers::handle_block(node, p).await,
        Message::Tx(p) => handlers::handle_tx(node, p).await,
        Message::Addr(p) => handlers::handle_addr(node, p).await,
    }

    Ok(())
}
