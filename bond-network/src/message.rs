//! Wire framing: `command[12] || json-payload` on one TCP connection per
//! message, per the seven-verb protocol.

use crate::error::{NetError, NetResult};
use serde::{Deserialize, Serialize};

pub const COMMAND_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    GetBlocks,
    Inv,
    GetData,
    Block,
    Tx,
    Addr,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::GetBlocks => "getblocks",
            Self::Inv => "inv",
            Self::GetData => "getdata",
            Self::Block => "block",
            Self::Tx => "tx",
            Self::Addr => "addr",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "version" => Some(Self::Version),
            "getblocks" => Some(Self::GetBlocks),
            "inv" => Some(Self::Inv),
            "getdata" => Some(Self::GetData),
            "block" => Some(Self::Block),
            "tx" => Some(Self::Tx),
            "addr" => Some(Self::Addr),
            _ => None,
        }
    }

    fn to_bytes(self) -> [u8; COMMAND_LEN] {
        let mut bytes = [0u8; COMMAND_LEN];
        let ascii = self.as_str().as_bytes();
        bytes[..ascii.len()].copy_from_slice(ascii);
        bytes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionPayload {
    pub version: u32,
    pub best_height: u64,
    pub addr_from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlocksPayload {
    pub addr_from: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvKind {
    Block,
    Tx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvPayload {
    pub addr_from: String,
    pub kind: InvKind,
    pub items: Vec<[u8; 32]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDataPayload {
    pub addr_from: String,
    pub kind: InvKind,
    pub id: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPayload {
    pub addr_from: String,
    pub block: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxPayload {
    pub addr_from: String,
    pub transaction: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddrPayload {
    pub addr_list: Vec<String>,
}

/// A decoded, dispatch-ready wire message.
#[derive(Debug, Clone)]
pub enum Message {
    Version(VersionPayload),
    GetBlocks(GetBlocksPayload),
    Inv(InvPayload),
    GetData(GetDataPayload),
    Block(BlockPayload),
    Tx(TxPayload),
    Addr(AddrPayload),
}

fn encode<T: Serialize>(command: Command, payload: &T) -> NetResult<Vec<u8>> {
    let mut bytes = command.to_bytes().to_vec();
    let payload_bytes = serde_json::to_vec(payload)
        .map_err(|e| NetError::MalformedMessage(e.to_string()))?;
    bytes.extend_from_slice(&payload_bytes);
    Ok(bytes)
}

impl Message {
    pub fn encode(&self) -> NetResult<Vec<u8>> {
        match self {
            Self::Version(p) => encode(Command::Version, p),
            Self::GetBlocks(p) => encode(Command::GetBlocks, p),
            Self::Inv(p) => encode(Command::Inv, p),
            Self::GetData(p) => encode(Command::GetData, p),
            Self::Block(p) => encode(Command::Block, p),
            Self::Tx(p) => encode(Command::Tx, p),
            Self::Addr(p) => encode(Command::Addr, p),
        }
    }

    /// Decodes a full received stream. Unknown verbs return `Ok(None)` —
    /// callers log and drop rather than erroring.
    pub fn decode(bytes: &[u8]) -> NetResult<Option<Self>> {
        if bytes.len() < COMMAND_LEN {
            return Err(NetError::MalformedMessage("message shorter than command prefix".to_string()));
        }
        let command_bytes = &bytes[..COMMAND_LEN];
        let command_str = std::str::from_utf8(command_bytes)
            .map_err(|_| NetError::MalformedMessage("non-ASCII command".to_string()))?
            .trim_end_matches('\0');
        let Some(command) = Command::from_str(command_str) else {
            return Ok(None);
        };
        let payload = &bytes[COMMAND_LEN..];

        let message = match command {
            Command::Version => Self::Version(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::GetBlocks => Self::GetBlocks(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::Inv => Self::Inv(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::GetData => Self::GetData(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::Block => Self::Block(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::Tx => Self::Tx(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
            Command::Addr => Self::Addr(
                serde_json::from_slice(payload).map_err(|e| NetError::MalformedMessage(e.to_string()))?,
            ),
        };
        Ok(Some(message))
    }
}
