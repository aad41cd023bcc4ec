use thiserror::Error;

/// Errors the network layer distinguishes. A send failure against one peer
/// never propagates past the handler that caused it — the peer is dropped
/// from `known_nodes` and the caller moves on.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("peer {0} unreachable")]
    PeerUnreachable(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error(transparent)]
    Core(#[from] bond_core::BondError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetResult<T> = std::result::Result<T, NetError>;
