use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wallet::{self, WalletError};

/// Virtual sender of mining rewards. Only the ledger creates transactions
/// from this address, signed with the system identity.
pub const SYSTEM_ADDRESS: &str = "SYSTEM";

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("cannot sign a transaction without a sender address")]
    MissingSender,

    #[error("signing failed: {0}")]
    Signing(#[from] WalletError),
}

/// A signed value transfer between two addresses (hex public keys).
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    /// Hex-encoded DER ECDSA signature over `canonical_payload()`
    pub signature: Option<String>,
}

/// Persisted / wire form of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub signature: Option<String>,
}

impl Transaction {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: f64) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            signature: None,
        }
    }

    /// Unsigned reward paid by the `SYSTEM` address.
    pub fn reward(to_address: impl Into<String>, amount: f64) -> Self {
        Self::new(SYSTEM_ADDRESS, to_address, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.from_address == SYSTEM_ADDRESS
    }

    /// `from:to:amount`. Addresses never contain `:` (admission rejects
    /// them), so the encoding is unambiguous.
    pub fn canonical_payload(&self) -> String {
        format!("{}:{}:{}", self.from_address, self.to_address, self.amount)
    }

    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), TransactionError> {
        if self.from_address.trim().is_empty() {
            return Err(TransactionError::MissingSender);
        }
        let signature = wallet::sign_message_hex(private_key_hex, self.canonical_payload().as_bytes())?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Signature check only: `SYSTEM` transactions verify against the
    /// system public key, everything else against `from_address`.
    pub fn is_valid(&self, system_public_key: &str) -> bool {
        let Some(signature) = self.signature.as_deref() else {
            return false;
        };
        let signer = if self.is_reward() {
            system_public_key
        } else {
            self.from_address.as_str()
        };
        wallet::verify_signature_hex(signer, self.canonical_payload().as_bytes(), signature)
    }

    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            from: self.from_address.clone(),
            to: self.to_address.clone(),
            amount: self.amount,
            signature: self.signature.clone(),
        }
    }

    /// Rebuild from a record, keeping its signature as-is.
    pub fn from_record(record: TransactionRecord) -> Self {
        Self {
            from_address: record.from,
            to_address: record.to,
            amount: record.amount,
            signature: record.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{SystemIdentity, generate_keypair_hex};

    fn signed(amount: f64) -> (Transaction, String) {
        let (sk, pk) = generate_keypair_hex();
        let (_, to) = generate_keypair_hex();
        let mut tx = Transaction::new(pk, to, amount);
        tx.sign(&sk).unwrap();
        (tx, sk)
    }

    #[test]
    fn signed_transaction_is_valid() {
        let system = SystemIdentity::generate();
        let (tx, _) = signed(12.5);
        assert!(tx.is_valid(system.public_key()));
    }

    #[test]
    fn unsigned_transaction_is_invalid() {
        let system = SystemIdentity::generate();
        let (_, pk) = generate_keypair_hex();
        let tx = Transaction::new(pk, "bob", 1.0);
        assert!(!tx.is_valid(system.public_key()));
    }

    #[test]
    fn tampered_amount_breaks_signature() {
        let system = SystemIdentity::generate();
        let (mut tx, _) = signed(10.0);
        tx.amount = 1000.0;
        assert!(!tx.is_valid(system.public_key()));
    }

    #[test]
    fn signing_requires_sender() {
        let (sk, _) = generate_keypair_hex();
        let mut tx = Transaction::new("", "bob", 1.0);
        assert!(matches!(tx.sign(&sk), Err(TransactionError::MissingSender)));
        assert!(tx.signature.is_none());
    }

    #[test]
    fn reward_verifies_against_system_key_only() {
        let system = SystemIdentity::generate();
        let mut reward = Transaction::reward("miner", 100.0);
        reward.signature = Some(system.sign(reward.canonical_payload().as_bytes()).unwrap());
        assert!(reward.is_valid(system.public_key()));

        let other = SystemIdentity::generate();
        assert!(!reward.is_valid(other.public_key()));
    }

    #[test]
    fn reward_signed_by_ordinary_key_is_invalid() {
        let system = SystemIdentity::generate();
        let (sk, _) = generate_keypair_hex();
        let mut reward = Transaction::reward("miner", 100.0);
        reward.sign(&sk).unwrap();
        assert!(!reward.is_valid(system.public_key()));
    }

    #[test]
    fn record_keeps_every_field() {
        let (tx, _) = signed(0.1 + 0.2);
        let json = serde_json::to_string(&tx.to_record()).unwrap();
        let back: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(Transaction::from_record(back), tx);
    }

    #[test]
    fn record_uses_short_field_names() {
        let tx = Transaction::new("a", "b", 3.0);
        let value = serde_json::to_value(tx.to_record()).unwrap();
        assert_eq!(value["from"], "a");
        assert_eq!(value["to"], "b");
        assert_eq!(value["amount"], 3.0);
        assert!(value["signature"].is_null());
    }
}
