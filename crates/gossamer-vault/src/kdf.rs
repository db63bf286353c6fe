//! PBKDF2 key derivation: password + salt → encryption and integrity keys.
//!
//! A single PBKDF2-HMAC-SHA256 pass produces 64 bytes of key material which
//! is split into two independent 256-bit keys: bytes 0–31 encrypt the
//! package payload (AES-256-GCM), bytes 32–63 key the integrity digest
//! (HMAC-SHA256) over the serialized package. Deriving both from one pass
//! keeps the two keys bound to the same `(password, salt)` pair while never
//! reusing one key for two purposes.
//!
//! The iteration count is fixed: changing it would silently invalidate every
//! package already on disk, because decryption re-derives with the stored
//! salt and the current count.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{KEY_LEN, SALT_LEN};
use crate::error::{Result, VaultError};

/// PBKDF2-HMAC-SHA256 iteration count (OWASP floor for SHA-256).
pub const PBKDF2_ITERATIONS: u32 = 310_000;

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Total PBKDF2 output: two 256-bit keys.
const DERIVED_LEN: usize = KEY_LEN * 2;

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: ring::pbkdf2::Algorithm = ring::pbkdf2::PBKDF2_HMAC_SHA256;

// ---------------------------------------------------------------------------
// DerivedKeys
// ---------------------------------------------------------------------------

/// The two keys derived from one `(password, salt)` pair.
///
/// Zeroized on drop. Deliberately neither `Clone` nor `Debug`: key material
/// must not be duplicated or logged.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    encryption: [u8; KEY_LEN],
    integrity: [u8; KEY_LEN],
}

impl DerivedKeys {
    /// The AES-256-GCM key (derived bytes 0–31).
    pub fn encryption_key(&self) -> &[u8; KEY_LEN] {
        &self.encryption
    }

    /// The HMAC-SHA256 key (derived bytes 32–63).
    pub fn integrity_key(&self) -> &[u8; KEY_LEN] {
        &self.integrity
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the encryption and integrity keys from `password` and `salt`.
///
/// Deterministic: the same `(password, salt)` always yields the same keys;
/// different salts for the same password yield unrelated keys. The
/// intermediate 64-byte buffer is zeroized after the split.
///
/// # Errors
///
/// Returns [`VaultError::KeyDerivationFailed`] if the salt has the wrong
/// length.
pub fn derive_keys(password: &str, salt: &[u8]) -> Result<DerivedKeys> {
    if salt.len() != SALT_LEN {
        return Err(VaultError::KeyDerivationFailed {
            reason: format!("salt must be {} bytes, got {}", SALT_LEN, salt.len()),
        });
    }

    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");

    let mut material = [0u8; DERIVED_LEN];
    ring::pbkdf2::derive(
        PBKDF2_ALG,
        iterations,
        salt,
        password.as_bytes(),
        &mut material,
    );

    let mut encryption = [0u8; KEY_LEN];
    let mut integrity = [0u8; KEY_LEN];
    encryption.copy_from_slice(&material[..KEY_LEN]);
    integrity.copy_from_slice(&material[KEY_LEN..]);
    material.zeroize();

    tracing::trace!(iterations = PBKDF2_ITERATIONS, "derived vault keys");

    Ok(DerivedKeys {
        encryption,
        integrity,
    })
}

/// Enforce the minimum password length before any encryption is performed.
///
/// # Errors
///
/// Returns [`VaultError::WeakPassword`] for passwords shorter than
/// [`MIN_PASSWORD_LEN`] characters.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_salt;

    #[test]
    fn same_password_and_salt_is_deterministic() {
        let salt = generate_salt().unwrap();
        let k1 = derive_keys("correct horse battery staple", &salt).unwrap();
        let k2 = derive_keys("correct horse battery staple", &salt).unwrap();

        assert_eq!(k1.encryption_key(), k2.encryption_key());
        assert_eq!(k1.integrity_key(), k2.integrity_key());
    }

    #[test]
    fn different_salts_give_unrelated_keys() {
        let s1 = generate_salt().unwrap();
        let s2 = generate_salt().unwrap();
        let k1 = derive_keys("same-password", &s1).unwrap();
        let k2 = derive_keys("same-password", &s2).unwrap();

        assert_ne!(k1.encryption_key(), k2.encryption_key());
        assert_ne!(k1.integrity_key(), k2.integrity_key());
    }

    #[test]
    fn encryption_and_integrity_keys_are_independent() {
        let salt = generate_salt().unwrap();
        let keys = derive_keys("some-password", &salt).unwrap();
        assert_ne!(keys.encryption_key(), keys.integrity_key());
    }

    #[test]
    fn wrong_salt_length_rejected() {
        let result = derive_keys("password", &[0u8; 16]);
        assert!(matches!(
            result,
            Err(VaultError::KeyDerivationFailed { .. })
        ));
    }

    #[test]
    fn password_strength_boundary() {
        assert!(validate_password_strength("short!7").is_err());
        assert!(validate_password_strength("8chars!!").is_ok());
        // Multi-byte characters count as characters, not bytes.
        assert!(validate_password_strength("pässwörd").is_ok());
    }
}
