pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{
    hash160, public_key_from_bytes, sign_transaction_hash, signature_from_bytes,
    verify_transaction_signature, KeyPair, PrivateKey, PublicKey, Signature,
};
pub use error::BlockchainError;
pub use hash::Hash256;
pub use types::{Amount, BlockHeight, BlockId, NodeConfig, Timestamp, TxId, COINBASE_VOUT};

pub type Result<T> = std::result::Result<T, BlockchainError>;
