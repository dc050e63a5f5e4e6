//! Cryptographic utilities for Sui

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use blake2::digest::{consts::U32, Digest};
use blake2::Blake2b;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::path::Path;

/// Signature scheme flag for Ed25519
pub const ED25519_FLAG: u8 = 0x00;

/// Intent prefix for transaction data (scope, version, app id)
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Intent prefix for personal messages
const PERSONAL_MESSAGE_INTENT: [u8; 3] = [3, 0, 0];

/// Length of `flag || signature || public key`
const SERIALIZED_SIGNATURE_LEN: usize = 1 + 64 + 32;

/// Ed25519 keypair for signing transactions and messages
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create keypair from 32-byte secret key
    pub fn from_secret_key(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(anyhow!("Secret key must be 32 bytes, got {}", bytes.len()));
        }
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(bytes);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_bytes),
        })
    }

    /// Parse a single keystore entry: base64 of `flag || secret`
    pub fn from_keystore_entry(entry: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(entry.trim())
            .with_context(|| "Failed to decode base64 keystore entry")?;
        match bytes.split_first() {
            Some((&ED25519_FLAG, secret)) => Self::from_secret_key(secret),
            Some((flag, _)) => Err(anyhow!("Unsupported key scheme flag: {:#04x}", flag)),
            None => Err(anyhow!("Empty keystore entry")),
        }
    }

    /// Load keypair from a file (Sui keystore JSON array, keystore entry, or raw hex)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {:?}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim();

        // Keystore file: JSON array of base64 entries, the first one is used
        if let Ok(entries) = serde_json::from_str::<Vec<String>>(trimmed) {
            let first = entries
                .first()
                .ok_or_else(|| anyhow!("Keystore file contains no keys"))?;
            return Self::from_keystore_entry(first);
        }

        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_str.len() == 64 && hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(hex_str).with_context(|| "Failed to decode hex key")?;
            return Self::from_secret_key(&bytes);
        }

        Self::from_keystore_entry(trimmed)
    }

    /// Get the public key
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key().to_bytes()
    }

    /// Sui address: Blake2b-256 of `flag || public key`, 0x-prefixed hex
    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Sign a digest and serialize as `flag || signature || public key` in base64
    fn sign_serialized(&self, digest: &[u8; 32]) -> String {
        let signature = self.signing_key.sign(digest).to_bytes();
        let mut serialized = Vec::with_capacity(SERIALIZED_SIGNATURE_LEN);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature);
        serialized.extend_from_slice(&self.public_key_bytes());
        BASE64.encode(serialized)
    }

    /// Sign BCS transaction bytes for `sui_executeTransactionBlock`
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        self.sign_serialized(&intent_digest(TRANSACTION_INTENT, tx_bytes))
    }

    /// Sign a personal message
    pub fn sign_personal_message(&self, message: &[u8]) -> Result<String> {
        let digest = personal_message_digest(message)?;
        Ok(self.sign_serialized(&digest))
    }
}

/// Compute Blake2b-256 hash (32 bytes)
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    type Blake2b256 = Blake2b<U32>;
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

fn intent_digest(intent: [u8; 3], payload: &[u8]) -> [u8; 32] {
    let mut message = Vec::with_capacity(intent.len() + payload.len());
    message.extend_from_slice(&intent);
    message.extend_from_slice(payload);
    blake2b_256(&message)
}

/// Personal messages are BCS-encoded as `vector<u8>` before the intent is applied
fn personal_message_digest(message: &[u8]) -> Result<[u8; 32]> {
    let encoded = bcs::to_bytes(&message.to_vec()).with_context(|| "Failed to BCS-encode message")?;
    Ok(intent_digest(PERSONAL_MESSAGE_INTENT, &encoded))
}

pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(33);
    data.push(ED25519_FLAG);
    data.extend_from_slice(public_key);
    format!("0x{}", hex::encode(blake2b_256(&data)))
}

/// Lowercase, 0x-prefixed, left-padded to 32 bytes
pub fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let hex_str = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_str.is_empty() || hex_str.len() > 64 || !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid Sui address: {}", address));
    }
    Ok(format!("0x{:0>64}", hex_str.to_lowercase()))
}

/// Verify a serialized personal-message signature against a signer address
pub fn verify_personal_message(message: &[u8], address: &str, signature: &str) -> Result<()> {
    let bytes = BASE64
        .decode(signature.trim())
        .with_context(|| "Signature is not valid base64")?;

    if bytes.len() != SERIALIZED_SIGNATURE_LEN {
        return Err(anyhow!(
            "Signature must be {} bytes, got {}",
            SERIALIZED_SIGNATURE_LEN,
            bytes.len()
        ));
    }
    if bytes[0] != ED25519_FLAG {
        return Err(anyhow!("Unsupported signature scheme flag: {:#04x}", bytes[0]));
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&bytes[1..65]);
    let mut pk_bytes = [0u8; 32];
    pk_bytes.copy_from_slice(&bytes[65..]);

    let signer = address_from_public_key(&pk_bytes);
    if signer != normalize_address(address)? {
        return Err(anyhow!("Signature was created by {}, not {}", signer, address));
    }

    let public_key =
        VerifyingKey::from_bytes(&pk_bytes).map_err(|e| anyhow!("Invalid public key: {}", e))?;
    let digest = personal_message_digest(message)?;
    public_key
        .verify(&digest, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| anyhow!("Signature does not match message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keypair() -> Keypair {
        Keypair::from_secret_key(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_blake2b_256() {
        let data = b"hello";
        let hash = blake2b_256(data);
        assert_eq!(hash.len(), 32);
    }

    #[test]
    fn test_keystore_entry_roundtrip() {
        let mut entry = vec![ED25519_FLAG];
        entry.extend_from_slice(&[7u8; 32]);
        let encoded = BASE64.encode(&entry);

        let from_entry = Keypair::parse(&encoded).unwrap();
        let from_keystore = Keypair::parse(&format!("[\"{}\"]", encoded)).unwrap();
        let from_hex = Keypair::parse(&hex::encode([7u8; 32])).unwrap();

        assert_eq!(from_entry.address(), test_keypair().address());
        assert_eq!(from_keystore.address(), test_keypair().address());
        assert_eq!(from_hex.address(), test_keypair().address());
    }

    #[test]
    fn test_rejects_non_ed25519_entry() {
        let mut entry = vec![0x01];
        entry.extend_from_slice(&[7u8; 32]);
        assert!(Keypair::parse(&BASE64.encode(&entry)).is_err());
    }

    #[test]
    fn test_address_shape() {
        let address = test_keypair().address();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 66);
    }

    #[test]
    fn test_normalize_address_pads() {
        assert_eq!(
            normalize_address("0x2").unwrap(),
            format!("0x{}2", "0".repeat(63))
        );
        assert!(normalize_address("0xzz").is_err());
    }

    #[test]
    fn test_personal_message_signature_verifies() {
        let keypair = test_keypair();
        let signature = keypair.sign_personal_message(b"Hello Sui").unwrap();

        verify_personal_message(b"Hello Sui", &keypair.address(), &signature).unwrap();
    }

    #[test]
    fn test_personal_message_rejects_wrong_message_or_address() {
        let keypair = test_keypair();
        let signature = keypair.sign_personal_message(b"Hello Sui").unwrap();

        assert!(verify_personal_message(b"Hello Move", &keypair.address(), &signature).is_err());

        let other = Keypair::from_secret_key(&[9u8; 32]).unwrap();
        assert!(verify_personal_message(b"Hello Sui", &other.address(), &signature).is_err());
    }
}
