//! Text encryptors.
//!
//! A [`TextEncryptor`] maps plaintext to ciphertext and, when it holds the
//! private key material, back again. Two implementations:
//!
//! - [`AesTextEncryptor`]: AES-256-GCM with a key derived from a shared
//!   secret via SHA-256. Wire form: hex of `nonce || ciphertext`.
//! - [`RsaTextEncryptor`]: hybrid RSA-OAEP(SHA-256) around a fresh AES
//!   session key per message. Wire form: base64 of
//!   `len(wrapped) || wrapped-session-key || nonce || ciphertext`.
//!   Can be constructed public-key-only, in which case decryption is
//!   unsupported.

use crate::error::{EncryptionError, EncryptionResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const NONCE_LENGTH: usize = 12;
const SESSION_KEY_LENGTH: usize = 32;

/// An opaque capability that maps plaintext to ciphertext and back.
pub trait TextEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> EncryptionResult<String>;
    fn decrypt(&self, ciphertext: &str) -> EncryptionResult<String>;

    /// The PEM public key, for encryptors that hold one.
    fn public_key_pem(&self) -> Option<String> {
        None
    }

    /// False for public-key-only encryptors.
    fn can_decrypt(&self) -> bool {
        true
    }
}

/// Symmetric AES-256-GCM encryptor keyed from a shared secret.
pub struct AesTextEncryptor {
    key: [u8; 32],
}

impl AesTextEncryptor {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    fn cipher(&self) -> EncryptionResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|err| EncryptionError::Crypto(err.to_string()))
    }
}

impl TextEncryptor for AesTextEncryptor {
    fn encrypt(&self, plaintext: &str) -> EncryptionResult<String> {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|err| EncryptionError::Crypto(err.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> EncryptionResult<String> {
        let bytes = hex::decode(ciphertext).map_err(|_| EncryptionError::InvalidCipher)?;
        if bytes.len() <= NONCE_LENGTH {
            return Err(EncryptionError::InvalidCipher);
        }
        let (nonce, payload) = bytes.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| EncryptionError::InvalidCipher)?;
        String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidCipher)
    }
}

/// Hybrid RSA encryptor; decrypts only when the private key is held.
pub struct RsaTextEncryptor {
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl RsaTextEncryptor {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            public_key: private_key.to_public_key(),
            private_key: Some(private_key),
        }
    }

    /// An encrypt-only holder around a public key.
    pub fn from_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            private_key: None,
        }
    }
}

impl TextEncryptor for RsaTextEncryptor {
    fn encrypt(&self, plaintext: &str) -> EncryptionResult<String> {
        let mut session_key = [0u8; SESSION_KEY_LENGTH];
        OsRng.fill_bytes(&mut session_key);
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);

        let wrapped = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &session_key)
            .map_err(|err| EncryptionError::Crypto(err.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&session_key)
            .map_err(|err| EncryptionError::Crypto(err.to_string()))?;
        let payload = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|err| EncryptionError::Crypto(err.to_string()))?;

        let mut out = Vec::with_capacity(2 + wrapped.len() + NONCE_LENGTH + payload.len());
        out.extend_from_slice(&(wrapped.len() as u16).to_be_bytes());
        out.extend_from_slice(&wrapped);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&payload);
        Ok(BASE64.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> EncryptionResult<String> {
        let Some(private_key) = &self.private_key else {
            return Err(EncryptionError::DecryptionNotSupported);
        };
        let bytes = BASE64
            .decode(ciphertext.as_bytes())
            .map_err(|_| EncryptionError::InvalidCipher)?;
        if bytes.len() < 2 {
            return Err(EncryptionError::InvalidCipher);
        }
        let wrapped_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let rest = &bytes[2..];
        if rest.len() <= wrapped_len + NONCE_LENGTH {
            return Err(EncryptionError::InvalidCipher);
        }
        let (wrapped, rest) = rest.split_at(wrapped_len);
        let (nonce, payload) = rest.split_at(NONCE_LENGTH);

        let session_key = private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| EncryptionError::InvalidCipher)?;
        let cipher = Aes256Gcm::new_from_slice(&session_key)
            .map_err(|_| EncryptionError::InvalidCipher)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| EncryptionError::InvalidCipher)?;
        String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidCipher)
    }

    fn public_key_pem(&self) -> Option<String> {
        self.public_key.to_public_key_pem(LineEnding::LF).ok()
    }

    fn can_decrypt(&self) -> bool {
        self.private_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_rsa_key;

    #[test]
    fn aes_round_trips() {
        let encryptor = AesTextEncryptor::new("secret");
        let ciphertext = encryptor.encrypt("hello").unwrap();
        assert_ne!(ciphertext, "hello");
        assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), "hello");
    }

    #[test]
    fn aes_ciphertexts_are_salted() {
        let encryptor = AesTextEncryptor::new("secret");
        let first = encryptor.encrypt("hello").unwrap();
        let second = encryptor.encrypt("hello").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn aes_rejects_garbage_ciphertext() {
        let encryptor = AesTextEncryptor::new("secret");
        assert!(matches!(
            encryptor.decrypt("not hex"),
            Err(EncryptionError::InvalidCipher)
        ));
        assert!(matches!(
            encryptor.decrypt("deadbeef"),
            Err(EncryptionError::InvalidCipher)
        ));
    }

    #[test]
    fn aes_rejects_ciphertext_from_another_key() {
        let one = AesTextEncryptor::new("one");
        let two = AesTextEncryptor::new("two");
        let ciphertext = one.encrypt("hello").unwrap();
        assert!(matches!(
            two.decrypt(&ciphertext),
            Err(EncryptionError::InvalidCipher)
        ));
    }

    #[test]
    fn rsa_round_trips() {
        let encryptor = RsaTextEncryptor::new(test_rsa_key());
        let ciphertext = encryptor.encrypt("hello").unwrap();
        assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), "hello");
    }

    #[test]
    fn rsa_exposes_a_pem_public_key() {
        let encryptor = RsaTextEncryptor::new(test_rsa_key());
        let pem = encryptor.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn public_key_only_holder_cannot_decrypt() {
        let full = RsaTextEncryptor::new(test_rsa_key());
        let public_only = RsaTextEncryptor::from_public_key(full.public_key.clone());
        let ciphertext = public_only.encrypt("hello").unwrap();

        assert!(!public_only.can_decrypt());
        assert!(matches!(
            public_only.decrypt(&ciphertext),
            Err(EncryptionError::DecryptionNotSupported)
        ));
        // The matching private key still reads it.
        assert_eq!(full.decrypt(&ciphertext).unwrap(), "hello");
    }
}
