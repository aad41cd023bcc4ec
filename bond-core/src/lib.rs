pub mod block;
pub mod error;
pub mod mining;
pub mod pow;
pub mod store;
pub mod transaction;
pub mod utxo;
pub mod validate;

pub use block::Block;
pub use error::{BondError, BondResult};
pub use mining::{mine_block, select_valid_and_disjoint, SUBSIDY};
pub use pow::DIFFICULTY_BITS;
pub use store::{ChainIterator, ChainStore};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use utxo::{TxOutputs, UtxoSet};
pub use validate::{require_valid_block, verify_block, verify_transaction};

pub use shared::{BlockchainError, Hash256, Result};
