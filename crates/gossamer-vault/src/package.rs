//! The versioned encrypted package: on-disk codec plus seal/open.
//!
//! Every secret the vault persists — a mnemonic, the password check marker,
//! a full backup — is wrapped in an [`EncryptedPackage`]. A package is
//! immutable once created; re-encrypting always produces a brand new package
//! with a fresh salt and iv, never a mutation of an existing one.
//!
//! # Wire format
//!
//! Packages serialize to JSON with base64 (standard alphabet) for the binary
//! fields and an epoch-millisecond timestamp:
//!
//! ```json
//! { "version": 1, "ciphertext": "<base64>", "iv": "<base64>",
//!   "salt": "<base64>", "createdAt": 1700000000000, "hmac": "<base64>" }
//! ```
//!
//! # Integrity digest
//!
//! Alongside the GCM tag, each package carries an HMAC-SHA256 over the
//! canonical framing `"{version}:{b64(ciphertext)}:{b64(iv)}:{b64(salt)}"`
//! under the derived integrity key. The `:` delimiter cannot collide with
//! field content because the base64 alphabet excludes it. This framing is a
//! compatibility surface: do not change it.
//!
//! Decryption checks the HMAC before attempting the AEAD open. The GCM tag
//! alone would detect tampering, but the separate digest lets the vault
//! report "tampered record" ([`VaultError::IntegrityFailure`]) distinctly
//! from "wrong password" ([`VaultError::WrongPassword`]), so a user facing a
//! corrupted record is not misled into retrying passwords.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::hmac;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, IV_LEN};
use crate::error::{Result, VaultError};
use crate::kdf;

/// Current package format version. Decryption hard-fails on any other value.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Base64 serde helpers
// ---------------------------------------------------------------------------

/// Serde helpers mapping `Vec<u8>` to standard-alphabet base64 strings.
mod serde_base64 {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// EncryptedPackage
// ---------------------------------------------------------------------------

/// A single encrypted, integrity-protected, versioned blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPackage {
    /// Format version; must equal [`FORMAT_VERSION`] to decrypt.
    pub version: u32,

    /// AES-256-GCM ciphertext with the 128-bit tag appended.
    #[serde(with = "serde_base64")]
    pub ciphertext: Vec<u8>,

    /// The 96-bit GCM nonce used for this package.
    #[serde(with = "serde_base64")]
    pub iv: Vec<u8>,

    /// The 32-byte PBKDF2 salt used for this package.
    #[serde(with = "serde_base64")]
    pub salt: Vec<u8>,

    /// Creation time, epoch milliseconds.
    pub created_at: i64,

    /// HMAC-SHA256 over the canonical `version:ciphertext:iv:salt` framing.
    #[serde(with = "serde_base64")]
    pub hmac: Vec<u8>,
}

impl EncryptedPackage {
    /// The canonical string the integrity digest is computed over.
    fn mac_message(version: u32, ciphertext: &[u8], iv: &[u8], salt: &[u8]) -> String {
        format!(
            "{}:{}:{}:{}",
            version,
            BASE64.encode(ciphertext),
            BASE64.encode(iv),
            BASE64.encode(salt)
        )
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `password` into a fresh [`EncryptedPackage`].
///
/// Generates a new random salt and iv for every call, so encrypting the same
/// plaintext twice never yields the same package.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] or
/// [`VaultError::KeyDerivationFailed`] if a primitive fails. Password
/// strength is the caller's responsibility (the manager validates before
/// encrypting).
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedPackage> {
    let salt = crypto::generate_salt()?;
    let iv = crypto::generate_iv()?;

    let keys = kdf::derive_keys(password, &salt)?;
    let ciphertext = crypto::seal(plaintext, keys.encryption_key(), &iv)?;

    let message = EncryptedPackage::mac_message(FORMAT_VERSION, &ciphertext, &iv, &salt);
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, keys.integrity_key());
    let digest = hmac::sign(&mac_key, message.as_bytes());

    tracing::debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "encrypted package"
    );

    Ok(EncryptedPackage {
        version: FORMAT_VERSION,
        ciphertext,
        iv: iv.to_vec(),
        salt: salt.to_vec(),
        created_at: chrono::Utc::now().timestamp_millis(),
        hmac: digest.as_ref().to_vec(),
    })
}

/// Decrypt `package` under `password`, returning the plaintext in a
/// zeroize-on-drop buffer.
///
/// Verification order is version → integrity digest → AEAD open, so the
/// error distinguishes tampering from a wrong password.
///
/// # Errors
///
/// - [`VaultError::UnsupportedVersion`] — `package.version` is not
///   [`FORMAT_VERSION`].
/// - [`VaultError::IntegrityFailure`] — the HMAC does not verify; the record
///   is presumed tampered with or corrupted.
/// - [`VaultError::WrongPassword`] — the GCM tag does not verify under the
///   derived key.
pub fn decrypt(package: &EncryptedPackage, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    if package.version != FORMAT_VERSION {
        return Err(VaultError::UnsupportedVersion {
            found: package.version,
            expected: FORMAT_VERSION,
        });
    }

    let keys = kdf::derive_keys(password, &package.salt)?;

    let message = EncryptedPackage::mac_message(
        package.version,
        &package.ciphertext,
        &package.iv,
        &package.salt,
    );
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, keys.integrity_key());
    hmac::verify(&mac_key, message.as_bytes(), &package.hmac)
        .map_err(|_| VaultError::IntegrityFailure)?;

    if package.iv.len() != IV_LEN {
        return Err(VaultError::IntegrityFailure);
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&package.iv);

    let plaintext = crypto::open(&package.ciphertext, keys.encryption_key(), &iv)?;

    tracing::debug!(plaintext_len = plaintext.len(), "decrypted package");

    Ok(Zeroizing::new(plaintext))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SALT_LEN;

    const PASSWORD: &str = "correcthorse1";

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let package = encrypt(b"alpha bravo charlie delta echo foxtrot", PASSWORD).unwrap();
        assert_eq!(package.version, FORMAT_VERSION);
        assert_eq!(package.salt.len(), SALT_LEN);
        assert_eq!(package.iv.len(), IV_LEN);

        let plaintext = decrypt(&package, PASSWORD).unwrap();
        assert_eq!(&**plaintext, b"alpha bravo charlie delta echo foxtrot");
    }

    #[test]
    fn wrong_password_is_authentication_error() {
        let package = encrypt(b"secret", PASSWORD).unwrap();
        let result = decrypt(&package, "battery-staple2");
        assert!(matches!(result, Err(VaultError::WrongPassword)));
    }

    #[test]
    fn encrypting_twice_never_reuses_salt_or_iv() {
        let p1 = encrypt(b"same plaintext", PASSWORD).unwrap();
        let p2 = encrypt(b"same plaintext", PASSWORD).unwrap();

        assert_ne!(p1.salt, p2.salt);
        assert_ne!(p1.iv, p2.iv);
        assert_ne!(p1.ciphertext, p2.ciphertext);
        assert_ne!(p1.hmac, p2.hmac);
    }

    #[test]
    fn tampered_ciphertext_is_integrity_failure() {
        let mut package = encrypt(b"secret", PASSWORD).unwrap();
        package.ciphertext[0] ^= 0x01;

        let result = decrypt(&package, PASSWORD);
        assert!(matches!(result, Err(VaultError::IntegrityFailure)));
    }

    #[test]
    fn tampered_iv_is_integrity_failure() {
        let mut package = encrypt(b"secret", PASSWORD).unwrap();
        package.iv[0] ^= 0x01;

        let result = decrypt(&package, PASSWORD);
        assert!(matches!(result, Err(VaultError::IntegrityFailure)));
    }

    #[test]
    fn tampered_salt_is_integrity_failure() {
        let mut package = encrypt(b"secret", PASSWORD).unwrap();
        package.salt[0] ^= 0x01;

        let result = decrypt(&package, PASSWORD);
        assert!(matches!(result, Err(VaultError::IntegrityFailure)));
    }

    #[test]
    fn tampered_hmac_is_integrity_failure() {
        let mut package = encrypt(b"secret", PASSWORD).unwrap();
        package.hmac[0] ^= 0x01;

        let result = decrypt(&package, PASSWORD);
        assert!(matches!(result, Err(VaultError::IntegrityFailure)));
    }

    #[test]
    fn unsupported_version_is_hard_failure() {
        let mut package = encrypt(b"secret", PASSWORD).unwrap();
        package.version = 2;

        let result = decrypt(&package, PASSWORD);
        assert!(matches!(
            result,
            Err(VaultError::UnsupportedVersion {
                found: 2,
                expected: FORMAT_VERSION
            })
        ));
    }

    #[test]
    fn json_shape_is_stable() {
        let package = encrypt(b"secret", PASSWORD).unwrap();
        let json = serde_json::to_value(&package).unwrap();

        // Exact on-disk field names: camelCase createdAt, base64 strings.
        assert_eq!(json["version"], 1);
        assert!(json["ciphertext"].is_string());
        assert!(json["iv"].is_string());
        assert!(json["salt"].is_string());
        assert!(json["createdAt"].is_i64());
        assert!(json["hmac"].is_string());
        assert_eq!(json.as_object().unwrap().len(), 6);

        let back: EncryptedPackage = serde_json::from_value(json).unwrap();
        assert_eq!(back, package);
    }

    #[test]
    fn mac_framing_is_colon_delimited_base64() {
        let msg = EncryptedPackage::mac_message(1, b"\x01\x02", b"\x03", b"\x04");
        assert_eq!(msg, format!(
            "1:{}:{}:{}",
            BASE64.encode(b"\x01\x02"),
            BASE64.encode(b"\x03"),
            BASE64.encode(b"\x04")
        ));
    }
}
