//! Merkle commitment and proof-of-work, the two pure, leaf-level pieces the
//! rest of the chain is built on.

use sha2::{Digest, Sha256};
use shared::Hash256;

/// Fixed target difficulty, in leading zero bits the block hash must have.
/// Not adjustable at runtime — the protocol has no retargeting.
pub const DIFFICULTY_BITS: u32 = 16;

/// Nonce search gives up past this value rather than wrapping silently.
/// 63-bit range, never reached in practice at [`DIFFICULTY_BITS`] = 16.
const MAX_NONCE: u64 = i64::MAX as u64;

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Builds the Merkle root over a list of serialized transactions: leaves are
/// `SHA256(tx_bytes)`, odd levels duplicate their last element, parents are
/// `SHA256(left || right)`.
///
/// # Panics
///
/// Panics if `tx_bytes` is empty — every block has a coinbase, so this is
/// only ever called with at least one element.
#[must_use]
pub fn merkle_root(tx_bytes: &[Vec<u8>]) -> [u8; 32] {
    assert!(!tx_bytes.is_empty(), "merkle_root requires at least one transaction");

    let mut level: Vec<[u8; 32]> = tx_bytes.iter().map(|bytes| sha256(bytes)).collect();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(&pair[0]);
                data.extend_from_slice(&pair[1]);
                sha256(&data)
            })
            .collect();
    }

    level[0]
}

fn preimage(prev_hash: &[u8], merkle_root: &[u8; 32], timestamp: i64, nonce: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(prev_hash.len() + 32 + 8 + 8 + 8);
    data.extend_from_slice(prev_hash);
    data.extend_from_slice(merkle_root);
    data.extend_from_slice(&timestamp.to_be_bytes());
    data.extend_from_slice(&u64::from(DIFFICULTY_BITS).to_be_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    data
}

fn meets_target(hash: &[u8; 32]) -> bool {
    Hash256::from_bytes(*hash).meets_difficulty(DIFFICULTY_BITS)
}

/// Searches for the first nonce whose preimage hash, read as a big-endian
/// 256-bit integer, is below the difficulty target. Returns `(nonce, hash)`.
///
/// # Errors
///
/// Returns an error if the nonce space is exhausted without finding a valid
/// hash — a fatal search exhaustion, never reached at [`DIFFICULTY_BITS`].
pub fn run(prev_hash: &[u8], merkle_root: &[u8; 32], timestamp: i64) -> shared::Result<(u64, [u8; 32])> {
    let mut nonce: u64 = 0;
    loop {
        if nonce > MAX_NONCE {
            return Err(shared::BlockchainError::InsufficientDifficulty);
        }
        let hash = sha256(&preimage(prev_hash, merkle_root, timestamp, nonce));
        if meets_target(&hash) {
            return Ok((nonce, hash));
        }
        nonce += 1;
    }
}

/// Recomputes the preimage hash for `(prev_hash, merkle_root, timestamp,
/// nonce)` and checks it equals `hash` and meets the difficulty target.
#[must_use]
pub fn validate(prev_hash: &[u8], merkle_root: &[u8; 32], timestamp: i64, nonce: u64, hash: &[u8; 32]) -> bool {
    let recomputed = sha256(&preimage(prev_hash, merkle_root, timestamp, nonce));
    &recomputed == hash && meets_target(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merkle_root_of_single_leaf_is_its_hash() {
        let leaf = b"only-transaction".to_vec();
        assert_eq!(merkle_root(&[leaf.clone()]), sha256(&leaf));
    }

    #[test]
    fn merkle_root_duplicates_last_leaf_on_odd_count() {
        let a = b"a".to_vec();
        let b = b"b".to_vec();
        let c = b"c".to_vec();

        let odd = merkle_root(&[a.clone(), b.clone(), c.clone()]);
        let padded = merkle_root(&[a, b, c.clone(), c]);
        assert_eq!(odd, padded);
    }

    #[test]
    fn run_finds_hash_meeting_difficulty() {
        let merkle = sha256(b"some-root");
        let (nonce, hash) = run(&[], &merkle, 1_700_000_000).unwrap();
        assert!(validate(&[], &merkle, 1_700_000_000, nonce, &hash));
    }

    #[test]
    fn validate_rejects_tampered_nonce() {
        let merkle = sha256(b"some-root");
        let (nonce, hash) = run(&[], &merkle, 1_700_000_000).unwrap();
        assert!(!validate(&[], &merkle, 1_700_000_000, nonce + 1, &hash));
    }
}
