use std::fmt;
use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("public key does not belong to the private key")]
    KeyMismatch,

    #[error("wallet file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed wallet file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Generate a new secp256k1 keypair and return (priv_hex, pub_hex_compressed).
/// The public key doubles as the account address.
pub fn generate_keypair_hex() -> (String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (hex::encode(sk.secret_bytes()), hex::encode(pk.serialize()))
}

/// Derive the compressed public key (hex) belonging to a hex private key.
pub fn public_key_from_private_hex(private_key_hex: &str) -> Result<String, WalletError> {
    let sk = parse_secret_key(private_key_hex)?;
    let secp = Secp256k1::signing_only();
    Ok(hex::encode(PublicKey::from_secret_key(&secp, &sk).serialize()))
}

/// Sign `message` with a hex private key. The message is hashed with
/// SHA-256 first; the result is a hex-encoded DER ECDSA signature.
pub fn sign_message_hex(private_key_hex: &str, message: &[u8]) -> Result<String, WalletError> {
    let sk = parse_secret_key(private_key_hex)?;
    let secp = Secp256k1::signing_only();
    let sig = secp.sign_ecdsa(&digest(message), &sk);
    Ok(hex::encode(&*sig.serialize_der()))
}

/// Verify a hex DER signature over `message` against a hex public key.
/// Any decoding failure counts as an invalid signature.
pub fn verify_signature_hex(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&digest(message), &sig, &pk).is_ok()
}

fn parse_secret_key(private_key_hex: &str) -> Result<SecretKey, WalletError> {
    let bytes = hex::decode(private_key_hex.trim()).map_err(|_| WalletError::InvalidPrivateKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| WalletError::InvalidPrivateKey)
}

fn digest(message: &[u8]) -> Message {
    let hash: [u8; 32] = Sha256::digest(message).into();
    Message::from_digest(hash)
}

/// Key file as written by the wallet tool: `{"private": .., "public": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFile {
    pub private: String,
    pub public: String,
}

impl WalletFile {
    pub fn generate() -> Self {
        let (private, public) = generate_keypair_hex();
        Self { private, public }
    }

    /// Read a key file and check that both halves belong together.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let raw = fs::read_to_string(path)?;
        let wallet: WalletFile = serde_json::from_str(&raw)?;
        wallet.check()?;
        Ok(wallet)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WalletError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn check(&self) -> Result<(), WalletError> {
        let derived = public_key_from_private_hex(&self.private)?;
        let declared = hex::decode(self.public.trim()).map_err(|_| WalletError::InvalidPublicKey)?;
        let declared = PublicKey::from_slice(&declared).map_err(|_| WalletError::InvalidPublicKey)?;
        if hex::encode(declared.serialize()) != derived {
            return Err(WalletError::KeyMismatch);
        }
        Ok(())
    }
}

/// Key pair that authorizes mining-reward transactions. Loaded once at
/// startup and handed to the ledger; its public half verifies every
/// `SYSTEM` transaction.
#[derive(Clone)]
pub struct SystemIdentity {
    public_key: String,
    private_key: String,
}

impl fmt::Debug for SystemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemIdentity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl SystemIdentity {
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let public_key = public_key_from_private_hex(private_key_hex)?;
        Ok(Self {
            public_key,
            private_key: private_key_hex.trim().to_string(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let wallet = WalletFile::load(path)?;
        Self::from_private_key(&wallet.private)
    }

    /// Fresh random identity, used by tests and first-time setups.
    pub fn generate() -> Self {
        let (private_key, public_key) = generate_keypair_hex();
        Self {
            public_key,
            private_key,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> Result<String, WalletError> {
        sign_message_hex(&self.private_key, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let (sk, pk) = generate_keypair_hex();
        let sig = sign_message_hex(&sk, b"alice:bob:10").unwrap();
        assert!(verify_signature_hex(&pk, b"alice:bob:10", &sig));
        assert!(!verify_signature_hex(&pk, b"alice:bob:11", &sig));
    }

    #[test]
    fn derived_public_key_matches_generated() {
        let (sk, pk) = generate_keypair_hex();
        assert_eq!(public_key_from_private_hex(&sk).unwrap(), pk);
        assert_eq!(pk.len(), 66);
    }

    #[test]
    fn verify_is_false_on_garbage() {
        let (sk, pk) = generate_keypair_hex();
        let sig = sign_message_hex(&sk, b"msg").unwrap();
        let (_, other_pk) = generate_keypair_hex();

        assert!(!verify_signature_hex(&other_pk, b"msg", &sig));
        assert!(!verify_signature_hex("zz", b"msg", &sig));
        assert!(!verify_signature_hex("abcd", b"msg", &sig));
        assert!(!verify_signature_hex(&pk, b"msg", "not-hex"));
        assert!(!verify_signature_hex(&pk, b"msg", "deadbeef"));
        assert!(!verify_signature_hex(&pk, b"msg", ""));
    }

    #[test]
    fn rejects_bad_private_key() {
        assert!(matches!(
            sign_message_hex("xyz", b"msg"),
            Err(WalletError::InvalidPrivateKey)
        ));
        assert!(matches!(
            public_key_from_private_hex(&"00".repeat(32)),
            Err(WalletError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn wallet_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/alice.json");
        let wallet = WalletFile::generate();
        wallet.save(&path).unwrap();
        assert_eq!(WalletFile::load(&path).unwrap(), wallet);
    }

    #[test]
    fn wallet_file_with_foreign_public_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut wallet = WalletFile::generate();
        wallet.public = WalletFile::generate().public;
        wallet.save(&path).unwrap();
        assert!(matches!(
            WalletFile::load(&path),
            Err(WalletError::KeyMismatch)
        ));
    }

    #[test]
    fn system_identity_signs_for_its_public_key() {
        let system = SystemIdentity::generate();
        let sig = system.sign(b"SYSTEM:miner:100").unwrap();
        assert!(verify_signature_hex(
            system.public_key(),
            b"SYSTEM:miner:100",
            &sig
        ));
    }
}
