//! Signing keys
//!
//! The pipeline only needs three things from a signer: the accounts it can
//! sign for, the public key of an account, and a signature over a 32-byte
//! digest. [`InMemorySigner`] holds one ed25519 key.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};
use crate::types::{decode_check, Address, KeyKind, PublicKey, Signature, SignatureKind};

const EDSK_SEED_PREFIX: [u8; 4] = [13, 15, 58, 7];
const EDSK_EXPANDED_PREFIX: [u8; 4] = [43, 246, 78, 7];
const SEED_LEN: usize = 32;

#[async_trait]
pub trait Signer: Send + Sync + std::fmt::Debug {
    /// Accounts this signer holds keys for
    fn addresses(&self) -> Vec<Address>;

    fn public_key(&self, address: &Address) -> Result<PublicKey>;

    /// Sign `digest` with the key of `address`; returns the generic `sig…` form
    async fn sign_digest(&self, address: &Address, digest: &[u8; 32]) -> Result<Signature>;
}

/// ed25519 key kept in process memory
pub struct InMemorySigner {
    key: SigningKey,
    public_key: PublicKey,
    address: Address,
}

impl std::fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl InMemorySigner {
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Result<Self> {
        let key = SigningKey::from_bytes(seed);
        let public_key = PublicKey::from_raw(KeyKind::Ed25519, key.verifying_key().as_bytes())?;
        Ok(Self {
            address: public_key.address(),
            public_key,
            key,
        })
    }

    /// Parse an `edsk…` secret key, seed (32-byte) or expanded (64-byte) form
    pub fn from_secret_key(text: &str) -> Result<Self> {
        let text = text.trim();
        let raw = decode_check(text, &EDSK_SEED_PREFIX, SEED_LEN)
            .or_else(|| decode_check(text, &EDSK_EXPANDED_PREFIX, 2 * SEED_LEN))
            .map(Zeroizing::new)
            .ok_or_else(|| Error::Signing("unrecognised secret key encoding".to_string()))?;

        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&raw[..SEED_LEN]);
        let signer = Self::from_seed(&seed)?;

        if raw.len() == 2 * SEED_LEN && raw[SEED_LEN..] != *signer.key.verifying_key().as_bytes() {
            return Err(Error::Signing(
                "expanded secret key has a mismatched public half".to_string(),
            ));
        }
        Ok(signer)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    fn check_address(&self, address: &Address) -> Result<()> {
        if *address != self.address {
            return Err(Error::Signing(format!("no key for {}", address)));
        }
        Ok(())
    }
}

#[async_trait]
impl Signer for InMemorySigner {
    fn addresses(&self) -> Vec<Address> {
        vec![self.address]
    }

    fn public_key(&self, address: &Address) -> Result<PublicKey> {
        self.check_address(address)?;
        Ok(self.public_key.clone())
    }

    async fn sign_digest(&self, address: &Address, digest: &[u8; 32]) -> Result<Signature> {
        self.check_address(address)?;
        let signature = self.key.sign(digest);
        Signature::from_raw(SignatureKind::Generic, &signature.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BOOTSTRAP1_ADDRESS, BOOTSTRAP1_PUBLIC_KEY, BOOTSTRAP1_SECRET_KEY};
    use ed25519_dalek::{Verifier, VerifyingKey};

    #[test]
    fn test_secret_key_derives_account() {
        let signer = InMemorySigner::from_secret_key(BOOTSTRAP1_SECRET_KEY).unwrap();
        assert_eq!(signer.address().to_string(), BOOTSTRAP1_ADDRESS);
        let pk = signer.public_key(signer.address()).unwrap();
        assert_eq!(pk.to_string(), BOOTSTRAP1_PUBLIC_KEY);
        assert_eq!(signer.addresses(), vec![*signer.address()]);
        assert!(!format!("{:?}", signer).contains("edsk"));
    }

    #[test]
    fn test_rejects_garbage_keys() {
        assert!(matches!(
            InMemorySigner::from_secret_key("edsk-not-a-key"),
            Err(Error::Signing(_))
        ));
        assert!(InMemorySigner::from_secret_key(BOOTSTRAP1_PUBLIC_KEY).is_err());
    }

    #[tokio::test]
    async fn test_signature_verifies() {
        let signer = InMemorySigner::from_seed(&[7u8; 32]).unwrap();
        let digest = crate::types::blake2b_256(b"payload");
        let sig = signer.sign_digest(signer.address(), &digest).await.unwrap();
        assert_eq!(sig.kind(), SignatureKind::Generic);
        assert!(sig.to_string().starts_with("sig"));

        let verifying = VerifyingKey::from_bytes(signer.key.verifying_key().as_bytes()).unwrap();
        let raw: [u8; 64] = sig.as_bytes().try_into().unwrap();
        assert!(verifying
            .verify(&digest, &ed25519_dalek::Signature::from_bytes(&raw))
            .is_ok());
    }

    #[tokio::test]
    async fn test_foreign_address_is_refused() {
        let signer = InMemorySigner::from_seed(&[7u8; 32]).unwrap();
        let other = InMemorySigner::from_seed(&[8u8; 32]).unwrap();
        assert!(signer.public_key(other.address()).is_err());
        assert!(signer.sign_digest(other.address(), &[0; 32]).await.is_err());
    }
}
