pub mod error;
pub mod handlers;
pub mod message;
pub mod mining;
pub mod node;
pub mod peer;
pub mod server;

pub use error::{NetError, NetResult};
pub use node::{Chain, Node, PROTOCOL_VERSION, SEED_FULL_NODES};
