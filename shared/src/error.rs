use thiserror::Error;

/// Errors shared across the chain, store, and network layers.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid hash")]
    InvalidHash,

    #[error("insufficient difficulty")]
    InsufficientDifficulty,

    #[error("nonce not found")]
    NonceNotFound,

    #[error("utxo not found")]
    UtxoNotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("cryptographic error: {0}")]
    CryptographicError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("i/o error: {0}")]
    IoError(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
