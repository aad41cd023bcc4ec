pub mod address;
pub mod error;
pub mod wallet;

pub use error::{WalletError, WalletResult};
pub use wallet::{Wallet, Wallets};
