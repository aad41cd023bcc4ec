use shared::BlockchainError;
use thiserror::Error;

/// Error kinds the core distinguishes, per the error-handling design: some
/// are locally recoverable (handlers drop the offending item and move on),
/// some are fatal to the process.
#[derive(Error, Debug)]
pub enum BondError {
    /// Block or transaction absent. Locally recoverable — callers retry via
    /// normal gossip.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Chain store corruption. Fatal.
    #[error("store corruption: {0}")]
    StoreCorruption(String),

    /// Fatal at startup: database exists/missing where forbidden.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Send failure on a peer connection. Recoverable — the peer is dropped.
    #[error("network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    Chain(#[from] BlockchainError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Sled(#[from] sled::Error),
}

pub type BondResult<T> = std::result::Result<T, BondError>;

impl BondError {
    /// True for errors the error-handling design marks as fatal to the
    /// process (store corruption, config error at startup).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreCorruption(_) | Self::ConfigError(_) | Self::Sled(_)
        )
    }
}
