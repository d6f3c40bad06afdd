use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised by malformed key or signature material
///
/// These are faults of the caller's input, not ledger rejections, and are
/// propagated instead of being folded into a failed validation.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// SHA-256 digest of a UTF-8 string
pub fn sha256_digest(data: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.finalize().into()
}

/// SHA-256 digest of a UTF-8 string as lowercase hex
pub fn sha256_hex(data: &str) -> String {
    hex::encode(sha256_digest(data))
}

fn decode_fixed<const N: usize>(
    value: &str,
    on_length: fn(String) -> CryptoError,
) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(value).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| on_length(format!("expected {} bytes, got {}", N, len)))
}

/// Parses a hex-encoded public key (the ledger's address format)
pub fn public_key_from_hex(public_key: &str) -> Result<VerifyingKey, CryptoError> {
    let bytes = decode_fixed::<32>(public_key, CryptoError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

fn signature_from_hex(signature: &str) -> Result<Signature, CryptoError> {
    let bytes = decode_fixed::<64>(signature, CryptoError::InvalidSignature)?;
    Ok(Signature::from_bytes(&bytes))
}

/// Signs a digest with a hex-encoded private key, returning a hex signature
pub fn sign_digest(digest: &[u8], private_key: &str) -> Result<String, CryptoError> {
    let wallet = Wallet::from_private_key(private_key)?;
    Ok(wallet.sign(digest))
}

/// Verifies a hex signature over a digest against a hex public key
///
/// Returns `Ok(false)` for a well-formed signature that does not verify and an
/// error when either the key or the signature cannot be decoded.
pub fn verify_signature(
    digest: &[u8],
    signature: &str,
    public_key: &str,
) -> Result<bool, CryptoError> {
    let public_key = public_key_from_hex(public_key)?;
    let signature = signature_from_hex(signature)?;

    Ok(public_key.verify(digest, &signature).is_ok())
}

/// An Ed25519 key pair whose public key doubles as the wallet address
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = VerifyingKey::from(&signing_key);

        Wallet {
            signing_key,
            verifying_key,
        }
    }

    /// Restores a wallet from a hex-encoded 32-byte private key
    pub fn from_private_key(private_key: &str) -> Result<Self, CryptoError> {
        let bytes = decode_fixed::<32>(private_key, CryptoError::InvalidPrivateKey)?;

        let signing_key = SigningKey::from_bytes(&bytes);
        let verifying_key = VerifyingKey::from(&signing_key);

        Ok(Wallet {
            signing_key,
            verifying_key,
        })
    }

    /// Hex-encoded public key, used as the address
    pub fn public_key(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Hex-encoded private key
    pub fn private_key(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Signs a message, returning the hex-encoded signature
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.public_key().len(), 64);
        assert_eq!(wallet.private_key().len(), 64);
    }

    #[test]
    fn test_wallet_restored_from_private_key() {
        let wallet = Wallet::generate();
        let restored = Wallet::from_private_key(&wallet.private_key()).unwrap();
        assert_eq!(restored.public_key(), wallet.public_key());
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::generate();
        let digest = sha256_digest("Hello, world!");

        let signature = sign_digest(&digest, &wallet.private_key()).unwrap();
        assert!(verify_signature(&digest, &signature, &wallet.public_key()).unwrap());

        // Verify with wrong message
        let wrong = sha256_digest("Wrong message");
        assert!(!verify_signature(&wrong, &signature, &wallet.public_key()).unwrap());

        // Verify with another key
        let other = Wallet::generate();
        assert!(!verify_signature(&digest, &signature, &other.public_key()).unwrap());
    }

    #[test]
    fn test_malformed_material_is_an_error() {
        let wallet = Wallet::generate();
        let digest = sha256_digest("data");
        let signature = wallet.sign(&digest);

        assert!(matches!(
            verify_signature(&digest, &signature, "not hex"),
            Err(CryptoError::DecodingError(_))
        ));
        assert!(matches!(
            verify_signature(&digest, "abcd", &wallet.public_key()),
            Err(CryptoError::InvalidSignature(_))
        ));
        assert!(matches!(
            Wallet::from_private_key("00ff"),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
