//! ECDSA (NIST P-256) signing and verification for transaction inputs.
//!
//! Signatures are the raw `r || s` encoding (64 bytes, no DER framing) and
//! public keys are the 65-byte uncompressed SEC1 point (`0x04 || X || Y`),
//! matching what a minimal wire protocol needs to move over the network
//! without a certificate or key-exchange handshake.

use crate::{BlockchainError, Hash256, Result};
use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Byte length of an uncompressed SEC1 public key (`0x04 || X || Y`).
pub const PUBLIC_KEY_LEN: usize = 65;
/// Byte length of a raw `r || s` signature.
pub const SIGNATURE_LEN: usize = 64;

/// An uncompressed SEC1 public key over P-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key_data: Vec<u8>,
}

/// A P-256 private scalar. Zeroized on drop.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key_data: Vec<u8>,
}

/// A matched public/private keypair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// A raw `r || s` ECDSA signature, bundled with the public key that produced
/// it so callers can verify without threading the key through separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    data: Vec<u8>,
    public_key: PublicKey,
}

impl PublicKey {
    /// Builds a public key from raw bytes, validating the point is a valid
    /// 65-byte uncompressed SEC1 encoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(BlockchainError::InvalidKeySize {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let _ = Self::to_verifying_key(&bytes)?;
        Ok(Self { key_data: bytes })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    /// `RIPEMD160(SHA256(pubkey))` — the 20-byte `PubKeyHash` locking a
    /// pay-to-pubkey-hash output.
    #[must_use]
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.key_data)
    }

    fn to_verifying_key(bytes: &[u8]) -> Result<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| BlockchainError::CryptographicError("invalid public key point".into()))
    }
}

impl PrivateKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        // validate eagerly so a bad key fails at construction, not at sign time.
        SigningKey::from_slice(&bytes)
            .map_err(|_| BlockchainError::CryptographicError("invalid private key scalar".into()))?;
        Ok(Self { key_data: bytes })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    fn to_signing_key(&self) -> SigningKey {
        SigningKey::from_slice(&self.key_data).expect("validated at construction")
    }
}

impl KeyPair {
    /// Generates a new random P-256 keypair.
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let public_bytes = verifying_key.to_encoded_point(false).as_bytes().to_vec();

        Ok(Self {
            public_key: PublicKey::from_bytes(public_bytes)?,
            private_key: PrivateKey::from_bytes(signing_key.to_bytes().to_vec())?,
        })
    }

    /// Signs `message` and returns the raw `r || s` signature bundled with
    /// this keypair's public key.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let signing_key = self.private_key.to_signing_key();
        let signature: P256Signature = signing_key.sign(message);
        Ok(Signature {
            data: signature.to_bytes().to_vec(),
            public_key: self.public_key.clone(),
        })
    }
}

impl Signature {
    /// Builds a signature from a raw 64-byte `r || s` buffer and the public
    /// key it is claimed to verify against.
    pub fn from_parts(data: Vec<u8>, public_key: PublicKey) -> Result<Self> {
        if data.len() != SIGNATURE_LEN {
            return Err(BlockchainError::InvalidKeySize {
                expected: SIGNATURE_LEN,
                actual: data.len(),
            });
        }
        Ok(Self { data, public_key })
    }

    /// Verifies the signature against `message`.
    pub fn verify(&self, message: &[u8]) -> Result<bool> {
        let verifying_key = PublicKey::to_verifying_key(&self.public_key.key_data)?;
        let signature = P256Signature::from_slice(&self.data)
            .map_err(|_| BlockchainError::InvalidSignature)?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Raw `r || s` bytes, as carried on the wire inside a `TxInput`.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        self.key_data.zeroize();
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// `RIPEMD160(SHA256(data))`, used to derive a `PubKeyHash` from a public key.
#[must_use]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// Signs a transaction hash with the given keypair.
pub fn sign_transaction_hash(tx_hash: &Hash256, keypair: &KeyPair) -> Result<Signature> {
    keypair.sign(tx_hash.as_bytes())
}

/// Verifies a signature against a transaction hash.
pub fn verify_transaction_signature(tx_hash: &Hash256, signature: &Signature) -> Result<bool> {
    signature.verify(tx_hash.as_bytes())
}

/// Creates a public key from raw bytes.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_bytes(bytes.to_vec())
}

/// Creates a signature from its raw `r || s` bytes and the public key.
pub fn signature_from_bytes(data: Vec<u8>, public_key: PublicKey) -> Result<Signature> {
    Signature::from_parts(data, public_key)
}
