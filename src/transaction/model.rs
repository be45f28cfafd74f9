use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TransactionError;
use crate::wallet::{normalize_pubkey_hex, public_key_hex, sign_hex, verify_signature_hex};

/// A signed movement of medical supplies between two identities.
///
/// `sender` and `receiver` are compressed secp256k1 public keys (hex). The
/// consensus layer treats the payload as opaque and only looks at the
/// signature, which identifies the transaction for mempool dedup and
/// replay detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub item: String,
    pub quantity: u64,
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
    /// Hex-encoded DER ECDSA signature over [`Transaction::sighash`]
    pub signature: String,
}

impl Transaction {
    /// Build and sign a transaction with the sender's secret key (hex).
    pub fn signed(
        sender_secret_hex: &str,
        receiver: &str,
        item: impl Into<String>,
        quantity: u64,
    ) -> Result<Self, TransactionError> {
        let mut tx = Self {
            sender: public_key_hex(sender_secret_hex).map_err(TransactionError::Key)?,
            receiver: normalize_pubkey_hex(receiver).map_err(TransactionError::Key)?,
            item: item.into(),
            quantity,
            timestamp: Utc::now().timestamp_millis(),
            signature: String::new(),
        };
        tx.signature = sign_hex(sender_secret_hex, tx.sighash()).map_err(TransactionError::Key)?;
        Ok(tx)
    }

    /// Canonical signing payload (JSON) with every field but the signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        let payload = serde_json::json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "item": self.item,
            "quantity": self.quantity,
            "timestamp": self.timestamp,
        });
        serde_json::to_vec(&payload).expect("serialize signing payload")
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_payload());
        hasher.finalize().into()
    }

    /// Stable identifier over the full content, signature included.
    pub fn txid(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self).expect("serialize transaction"));
        hex::encode(hasher.finalize())
    }

    /// Check the signature against the sender key and basic field sanity.
    pub fn verify(&self) -> Result<(), TransactionError> {
        if self.quantity == 0 {
            return Err(TransactionError::ZeroQuantity);
        }
        if self.signature.is_empty() {
            return Err(TransactionError::MissingSignature);
        }
        let ok = verify_signature_hex(&self.sender, &self.signature, self.sighash())
            .map_err(TransactionError::Key)?;
        if !ok {
            return Err(TransactionError::BadSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::generate_keypair_hex;

    #[test]
    fn signed_transaction_verifies() {
        let (sk, _) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let tx = Transaction::signed(&sk, &receiver, "syringes", 40).unwrap();
        assert!(tx.verify().is_ok());
        assert_eq!(tx.receiver, receiver);
        assert_eq!(tx.txid().len(), 64);
    }

    #[test]
    fn tampering_breaks_signature() {
        let (sk, _) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let mut tx = Transaction::signed(&sk, &receiver, "masks", 5).unwrap();
        tx.quantity = 500;
        assert!(matches!(tx.verify(), Err(TransactionError::BadSignature)));
    }

    #[test]
    fn zero_quantity_and_missing_signature() {
        let (sk, _) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let mut tx = Transaction::signed(&sk, &receiver, "gauze", 1).unwrap();
        tx.signature.clear();
        assert!(matches!(tx.verify(), Err(TransactionError::MissingSignature)));
        tx.quantity = 0;
        assert!(matches!(tx.verify(), Err(TransactionError::ZeroQuantity)));
    }

    #[test]
    fn bad_receiver_key_is_rejected() {
        let (sk, _) = generate_keypair_hex();
        assert!(Transaction::signed(&sk, "not-a-key", "gauze", 1).is_err());
    }
}
