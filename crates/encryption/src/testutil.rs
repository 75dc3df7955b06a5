//! Fixtures for encryption tests.

use rsa::RsaPrivateKey;
use std::sync::OnceLock;

/// A process-wide RSA test key.
///
/// Generation is the slow part of these tests, so it happens once; 1024
/// bits is plenty for test vectors.
pub(crate) fn test_rsa_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).expect("generate test key")
    })
    .clone()
}
