//! # confgit encryption
//!
//! Server-side encryption for configuration values: the text-encryptor
//! implementations (symmetric AES and hybrid RSA), key-material parsing,
//! the `{key:...}` selector-prefix helper, recovery of form-mangled
//! payloads, and the [`EncryptionService`] that ties them together behind
//! the encrypt/decrypt/key endpoints.

pub mod encryptor;
pub mod error;
pub mod form;
pub mod keys;
pub mod prefix;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use encryptor::{AesTextEncryptor, RsaTextEncryptor, TextEncryptor};
pub use error::{EncryptionError, EncryptionResult};
pub use keys::{load_key_file, parse_key_material};
pub use service::{ActiveKeyLocator, EncryptionService, TextEncryptorLocator};
