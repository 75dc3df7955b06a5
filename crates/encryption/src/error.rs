//! Error types for the encryption service.

/// Error type for all encryption service operations.
///
/// Each variant corresponds to one externally visible failure; the HTTP
/// layer maps them to `{status, description}` responses.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("no key was installed for encryption service")]
    KeyNotInstalled,
    #[error("no public key available")]
    KeyNotAvailable,
    #[error("server-side decryption is not supported")]
    DecryptionNotSupported,
    #[error("the encryption algorithm is not strong enough")]
    EncryptionTooWeak,
    #[error("text not encrypted with this key")]
    InvalidCipher,
    #[error("key data not in correct format (PEM or jks keystore)")]
    KeyFormat,
    #[error("failed to read key material: {0}")]
    KeyRead(std::io::Error),
    #[error("encryption failed: {0}")]
    Crypto(String),
}

/// Type alias for Results that can fail with [`EncryptionError`].
pub type EncryptionResult<T> = std::result::Result<T, EncryptionError>;
