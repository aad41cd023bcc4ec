use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{crypto, BlockchainError, Result, COINBASE_VOUT};
use std::collections::HashMap;

/// A transaction input: a reference to a previous output plus the proof
/// (signature + public key) that the spender owns it. A coinbase input is
/// recognized structurally: empty `prev_tx_id`, `vout == COINBASE_VOUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_id: Vec<u8>,
    pub vout: u32,
    /// `R || S`, 64 bytes. Empty for coinbase or an unsigned input.
    pub signature: Vec<u8>,
    /// 65-byte uncompressed SEC1 public key. For a coinbase input this is
    /// caller-supplied data (arbitrary bytes) rather than a real key.
    pub pub_key: Vec<u8>,
}

impl TxInput {
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id.is_empty() && self.vout == COINBASE_VOUT
    }

    /// Whether this input's public key hashes to `pub_key_hash` — the
    /// pay-to-pubkey-hash unlock check.
    #[must_use]
    pub fn uses_key(&self, pub_key_hash: &[u8; 20]) -> bool {
        self.pub_key.len() == crypto::PUBLIC_KEY_LEN && crypto::hash160(&self.pub_key) == *pub_key_hash
    }
}

/// A transaction output: a value locked to whoever can produce a public key
/// hashing to `pub_key_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: [u8; 20],
}

impl TxOutput {
    #[must_use]
    pub const fn new(value: u64, pub_key_hash: [u8; 20]) -> Self {
        Self { value, pub_key_hash }
    }

    #[must_use]
    pub fn is_locked_with_key(&self, pub_key_hash: &[u8; 20]) -> bool {
        self.pub_key_hash == *pub_key_hash
    }
}

/// A transaction: an identifier cached at construction, an ordered list of
/// inputs, and an ordered list of outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: [u8; 32],
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub(crate) fn txid_from_slice(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| BlockchainError::InvalidTransaction("malformed previous transaction id".to_string()))
}

impl Transaction {
    /// Builds a transaction and assigns its `id` once, here, by hashing the
    /// serialization of a copy with every input's signature and public key
    /// cleared.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Self { id: [0u8; 32], inputs, outputs };
        tx.id = tx.id_hash()?;
        Ok(tx)
    }

    /// Builds the single coinbase transaction that opens a block: one input
    /// carrying arbitrary data in place of a public key, one output paying
    /// the block subsidy to `to_pub_key_hash`.
    pub fn new_coinbase(to_pub_key_hash: [u8; 20], mut data: Vec<u8>, subsidy: u64) -> Result<Self> {
        if data.is_empty() {
            let mut nonce = [0u8; 20];
            OsRng.fill_bytes(&mut nonce);
            data = nonce.to_vec();
        }
        let input = TxInput {
            prev_tx_id: Vec::new(),
            vout: COINBASE_VOUT,
            signature: Vec::new(),
            pub_key: data,
        };
        let output = TxOutput::new(subsidy, to_pub_key_hash);
        Self::new(vec![input], vec![output])
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    fn id_hash(&self) -> Result<[u8; 32]> {
        let mut cleared = self.clone();
        for input in &mut cleared.inputs {
            input.signature = Vec::new();
            if !input.is_coinbase() {
                input.pub_key = Vec::new();
            }
        }
        cleared.id = [0u8; 32];
        Ok(sha256(&serde_json::to_vec(&cleared)?))
    }

    /// Builds the trimmed copy used to sign/verify input `index`: every
    /// input's signature is cleared, input `index`'s public key is replaced
    /// by the `PubKeyHash` of the output it spends, and every other input's
    /// public key is cleared to empty.
    fn trimmed_copy_for_signing(
        &self,
        index: usize,
        prev_txs: &HashMap<[u8; 32], Transaction>,
    ) -> Result<Self> {
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for (i, input) in self.inputs.iter().enumerate() {
            if i == index {
                let prev_id = txid_from_slice(&input.prev_tx_id)?;
                let prev_tx = prev_txs
                    .get(&prev_id)
                    .ok_or(BlockchainError::UtxoNotFound)?;
                let referenced = prev_tx
                    .outputs
                    .get(input.vout as usize)
                    .ok_or(BlockchainError::UtxoNotFound)?;
                inputs.push(TxInput {
                    prev_tx_id: input.prev_tx_id.clone(),
                    vout: input.vout,
                    signature: Vec::new(),
                    pub_key: referenced.pub_key_hash.to_vec(),
                });
            } else {
                inputs.push(TxInput {
                    prev_tx_id: input.prev_tx_id.clone(),
                    vout: input.vout,
                    signature: Vec::new(),
                    pub_key: Vec::new(),
                });
            }
        }
        Ok(Self { id: [0u8; 32], inputs, outputs: self.outputs.clone() })
    }

    fn signing_hash(&self, index: usize, prev_txs: &HashMap<[u8; 32], Transaction>) -> Result<[u8; 32]> {
        let trimmed = self.trimmed_copy_for_signing(index, prev_txs)?;
        Ok(sha256(&serde_json::to_vec(&trimmed)?))
    }

    /// Signs every non-coinbase input, looking up the owning keypair for
    /// each referenced previous transaction by its id.
    pub fn sign(
        &mut self,
        keys: &HashMap<[u8; 32], shared::KeyPair>,
        prev_txs: &HashMap<[u8; 32], Transaction>,
    ) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        for index in 0..self.inputs.len() {
            let sig_hash = shared::Hash256::from_bytes(self.signing_hash(index, prev_txs)?);
            let prev_id = txid_from_slice(&self.inputs[index].prev_tx_id)?;
            let keypair = keys
                .get(&prev_id)
                .ok_or(BlockchainError::InvalidSignature)?;
            let signature = crypto::sign_transaction_hash(&sig_hash, keypair)?;
            self.inputs[index].signature = signature.as_bytes().to_vec();
            self.inputs[index].pub_key = keypair.public_key.as_bytes().to_vec();
        }
        Ok(())
    }

    /// Verifies every non-coinbase input's signature. Fails fast on the
    /// first input that does not verify.
    pub fn verify_signatures(&self, prev_txs: &HashMap<[u8; 32], Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        for index in 0..self.inputs.len() {
            let input = &self.inputs[index];
            if input.signature.len() != crypto::SIGNATURE_LEN {
                return Ok(false);
            }
            let sig_hash = shared::Hash256::from_bytes(self.signing_hash(index, prev_txs)?);
            let public_key = crypto::public_key_from_bytes(&input.pub_key)?;
            let signature = crypto::signature_from_bytes(input.signature.clone(), public_key)?;
            if !crypto::verify_transaction_signature(&sig_hash, &signature)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }

    #[must_use]
    pub fn estimated_size(&self) -> usize {
        32 + self.inputs.len() * 150 + self.outputs.len() * 28
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::KeyPair;

    #[test]
    fn coinbase_has_no_real_input() {
        let tx = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs.len(), 1);
        assert!(tx.inputs[0].prev_tx_id.is_empty());
        assert_eq!(tx.inputs[0].vout, COINBASE_VOUT);
    }

    #[test]
    fn coinbase_verifies_without_a_signature() {
        let tx = Transaction::new_coinbase([1u8; 20], Vec::new(), 10).unwrap();
        assert!(tx.verify_signatures(&HashMap::new()).unwrap());
    }

    #[test]
    fn id_is_stable_across_clones_and_reserializations() {
        let tx = Transaction::new_coinbase([2u8; 20], Vec::new(), 10).unwrap();
        let bytes = tx.serialize().unwrap();
        let restored = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(tx.id, restored.id);
    }

    #[test]
    fn sign_then_verify_round_trip_succeeds() {
        let payer = KeyPair::generate().unwrap();
        let payer_hash = payer.public_key.hash160();

        let funding_tx = Transaction::new_coinbase(payer_hash, Vec::new(), 50).unwrap();

        let spend_input = TxInput {
            prev_tx_id: funding_tx.id.to_vec(),
            vout: 0,
            signature: Vec::new(),
            pub_key: Vec::new(),
        };
        let spend_output = TxOutput::new(50, [9u8; 20]);
        let mut spend = Transaction::new(vec![spend_input], vec![spend_output]).unwrap();

        let mut keys = HashMap::new();
        keys.insert(funding_tx.id, payer);
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding_tx.id, funding_tx);

        spend.sign(&keys, &prev_txs).unwrap();
        assert!(spend.verify_signatures(&prev_txs).unwrap());
    }

    #[test]
    fn verification_fails_after_outputs_are_tampered() {
        let payer = KeyPair::generate().unwrap();
        let payer_hash = payer.public_key.hash160();
        let funding_tx = Transaction::new_coinbase(payer_hash, Vec::new(), 50).unwrap();

        let spend_input = TxInput {
            prev_tx_id: funding_tx.id.to_vec(),
            vout: 0,
            signature: Vec::new(),
            pub_key: Vec::new(),
        };
        let spend_output = TxOutput::new(50, [9u8; 20]);
        let mut spend = Transaction::new(vec![spend_input], vec![spend_output]).unwrap();

        let mut keys = HashMap::new();
        keys.insert(funding_tx.id, payer);
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding_tx.id, funding_tx);
        spend.sign(&keys, &prev_txs).unwrap();

        spend.outputs[0].value = 999;
        assert!(!spend.verify_signatures(&prev_txs).unwrap());
    }

    #[test]
    fn uses_key_matches_only_the_owning_hash() {
        let keypair = KeyPair::generate().unwrap();
        let input = TxInput {
            prev_tx_id: vec![1; 32],
            vout: 0,
            signature: vec![0; 64],
            pub_key: keypair.public_key.as_bytes().to_vec(),
        };
        assert!(input.uses_key(&keypair.public_key.hash160()));
        assert!(!input.uses_key(&[0u8; 20]));
    }

    #[test]
    fn multi_input_spend_signs_and_verifies_each_input_independently() {
        let payer_a = KeyPair::generate().unwrap();
        let payer_b = KeyPair::generate().unwrap();
        let funding_a = Transaction::new_coinbase(payer_a.public_key.hash160(), Vec::new(), 20).unwrap();
        let funding_b = Transaction::new_coinbase(payer_b.public_key.hash160(), Vec::new(), 30).unwrap();

        let input_a = TxInput {
            prev_tx_id: funding_a.id.to_vec(),
            vout: 0,
            signature: Vec::new(),
            pub_key: Vec::new(),
        };
        let input_b = TxInput {
            prev_tx_id: funding_b.id.to_vec(),
            vout: 0,
            signature: Vec::new(),
            pub_key: Vec::new(),
        };
        let mut spend = Transaction::new(vec![input_a, input_b], vec![TxOutput::new(50, [9u8; 20])]).unwrap();

        let mut keys = HashMap::new();
        keys.insert(funding_a.id, payer_a);
        keys.insert(funding_b.id, payer_b);
        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding_a.id, funding_a);
        prev_txs.insert(funding_b.id, funding_b);

        spend.sign(&keys, &prev_txs).unwrap();
        assert!(spend.verify_signatures(&prev_txs).unwrap());
    }

    #[test]
    fn coinbase_ids_to_the_same_address_are_unique() {
        let first = Transaction::new_coinbase([3u8; 20], Vec::new(), 10).unwrap();
        let second = Transaction::new_coinbase([3u8; 20], Vec::new(), 10).unwrap();
        assert_ne!(first.id, second.id);
    }
}
