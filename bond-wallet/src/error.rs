use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("no wallet for address {0}")]
    NotFound(String),
    #[error(transparent)]
    Crypto(#[from] shared::BlockchainError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed wallet file: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type WalletResult<T> = std::result::Result<T, WalletError>;
