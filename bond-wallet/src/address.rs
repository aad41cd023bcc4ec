//! Base58Check address encoding: `version || hash160(pubkey)`, with a
//! 4-byte double-SHA256 checksum appended before the Base58 encode.
//! Not part of the chain-state engine itself — addresses are a display and
//! input-parsing convenience layered over the raw 20-byte `PubKeyHash` that
//! transaction outputs actually lock against.

use crate::error::{WalletError, WalletResult};
use sha2::{Digest, Sha256};

const VERSION: u8 = 0x00;
const CHECKSUM_LEN: usize = 4;

fn checksum(versioned_payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(versioned_payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Encodes a 20-byte `PubKeyHash` as a Base58Check address.
#[must_use]
pub fn encode(pub_key_hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(1 + 20 + CHECKSUM_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(pub_key_hash);
    payload.extend_from_slice(&checksum(&payload));
    bs58::encode(payload).into_string()
}

/// Decodes a Base58Check address back to its 20-byte `PubKeyHash`, verifying
/// the version byte and checksum.
pub fn decode(address: &str) -> WalletResult<[u8; 20]> {
    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|e| WalletError::MalformedAddress(e.to_string()))?;
    if payload.len() != 1 + 20 + CHECKSUM_LEN {
        return Err(WalletError::MalformedAddress(format!(
            "expected {} bytes, got {}",
            1 + 20 + CHECKSUM_LEN,
            payload.len()
        )));
    }
    let (versioned, want_checksum) = payload.split_at(1 + 20);
    if versioned[0] != VERSION {
        return Err(WalletError::MalformedAddress(format!(
            "unsupported version byte {}",
            versioned[0]
        )));
    }
    if checksum(versioned) != want_checksum {
        return Err(WalletError::BadChecksum);
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&versioned[1..]);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_hash160() {
        let hash = [7u8; 20];
        let address = encode(&hash);
        assert_eq!(decode(&address).unwrap(), hash);
    }

    #[test]
    fn rejects_a_flipped_character() {
        let address = encode(&[9u8; 20]);
        let mut bytes: Vec<char> = address.chars().collect();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == '1' { '2' } else { '1' };
        let tampered: String = bytes.into_iter().collect();
        assert!(decode(&tampered).is_err());
    }

    #[test]
    fn rejects_wrong_length_payload() {
        let short = bs58::encode([0u8; 10]).into_string();
        assert!(decode(&short).is_err());
    }
}
