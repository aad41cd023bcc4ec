//! Small type aliases and the node's runtime configuration, shared across
//! the chain, network, and wallet crates.

use serde::{Deserialize, Serialize};

/// Transaction id.
pub type TxId = crate::Hash256;

/// Block hash.
pub type BlockId = crate::Hash256;

/// Value carried by a transaction output, in the chain's base unit.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Block height, counted from the genesis block at height zero.
pub type BlockHeight = u64;

/// Index of an output within a transaction.
pub type OutputIndex = u32;

/// Sentinel `vout` value marking a coinbase input — the Rust stand-in for
/// the `-1` sentinel used by an unsigned-free reference implementation.
pub const COINBASE_VOUT: OutputIndex = u32::MAX;

/// Runtime configuration for a node process: identity, network addresses,
/// mining target, and on-disk location of its chain store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Arbitrary identifier used in log lines and `version` handshakes.
    pub node_id: String,
    /// Address this node's TCP server binds to.
    pub listen_address: String,
    /// Address a mined block's coinbase output pays to, if this node mines.
    pub mining_address: Option<String>,
    /// Hard-coded seed peers dialed at startup.
    pub seed_peers: Vec<String>,
    /// Directory holding the `blocks` and `chainstate` sled trees.
    pub data_dir: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "localhost:3000".to_string(),
            listen_address: "127.0.0.1:3000".to_string(),
            mining_address: None,
            seed_peers: vec!["localhost:3000".to_string()],
            data_dir: "./data".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_config_defaults_to_loopback_seed() {
        let config = NodeConfig::default();
        assert_eq!(config.listen_address, "127.0.0.1:3000");
        assert_eq!(config.seed_peers, vec!["localhost:3000".to_string()]);
    }
}
