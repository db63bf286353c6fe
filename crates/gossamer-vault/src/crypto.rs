//! AES-256-GCM primitives and secure randomness via the `ring` crate.
//!
//! This module provides the raw cryptographic building blocks for the vault:
//!
//! - **Seal/open**: AES-256-GCM authenticated encryption with caller-supplied
//!   96-bit nonces and a 128-bit authentication tag appended to the
//!   ciphertext.
//! - **Random generation**: cryptographically secure salts, nonces, and
//!   arbitrary byte strings via `ring`'s `SystemRandom`.
//! - **Self check**: a startup probe that fails fast when the platform CSPRNG
//!   or cipher is unusable.
//!
//! Password handling, key derivation, and the on-disk package format live a
//! level up in [`crate::kdf`] and [`crate::package`].
//!
//! # Security Notes
//!
//! - Nonces are generated randomly for each encryption operation. With a
//!   96-bit nonce and random generation, the probability of a collision is
//!   negligible for the vault's write rates (every package also carries its
//!   own fresh salt, so keys are never shared across packages either).
//! - Key material passed into [`seal`]/[`open`] must be exactly 256 bits;
//!   anything else is rejected before touching the cipher.

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce (iv) in bytes (96 bits).
pub const IV_LEN: usize = NONCE_LEN;

/// Length of the per-package PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// Length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A single-use nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` requires a [`NonceSequence`] for sealing operations. Since the
/// vault generates a fresh random nonce per encryption call, this wrapper
/// ensures each sealing key is used exactly once.
struct SingleNonce(Option<[u8; IV_LEN]>);

impl SingleNonce {
    fn new(bytes: [u8; IV_LEN]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Random generation
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::CryptoUnavailable`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| VaultError::CryptoUnavailable {
            reason: "failed to generate random bytes".into(),
        })?;
    Ok(buf)
}

/// Generate a fresh random 32-byte key-derivation salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| VaultError::KeyDerivationFailed {
            reason: "failed to generate random salt".into(),
        })?;
    Ok(salt)
}

/// Generate a fresh random 96-bit AES-GCM nonce.
pub fn generate_iv() -> Result<[u8; IV_LEN]> {
    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;
    Ok(iv)
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` with AES-256-GCM under `key` and `iv`.
///
/// Returns the ciphertext with the 128-bit authentication tag appended by
/// `ring`.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] if the key length is wrong or
/// `ring` reports a failure.
pub fn seal(plaintext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::EncryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;

    let mut sealing_key = SealingKey::new(unbound_key, SingleNonce::new(*iv));

    // `ring` encrypts in-place and appends the authentication tag.
    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "sealed data"
    );

    Ok(in_out)
}

/// Decrypt `ciphertext` (which includes the GCM tag) under `key` and `iv`.
///
/// # Errors
///
/// Returns [`VaultError::WrongPassword`] on tag verification failure: the
/// only way the vault reaches this point with a bad key is a wrong password,
/// since the independent integrity digest over the package is checked first.
pub fn open(ciphertext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::EncryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;

    let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(*iv));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::WrongPassword)?;

    let result = plaintext.to_vec();

    tracing::trace!(
        ciphertext_len = ciphertext.len(),
        plaintext_len = result.len(),
        "opened data"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Platform self check
// ---------------------------------------------------------------------------

/// Verify the platform provides a working CSPRNG and AES-256-GCM.
///
/// Called once from `VaultManager::initialize`. A failure here is fatal:
/// the wallet cannot operate without these primitives.
///
/// # Errors
///
/// Returns [`VaultError::CryptoUnavailable`] if the probe fails.
pub fn self_check() -> Result<()> {
    let key = random_bytes(KEY_LEN)?;
    let iv = generate_iv()?;

    let probe = b"gossamer-vault-self-check";
    let sealed = seal(probe, &key, &iv)?;
    let opened = open(&sealed, &key, &iv).map_err(|_| VaultError::CryptoUnavailable {
        reason: "AES-256-GCM probe round-trip failed".into(),
    })?;

    if opened != probe {
        return Err(VaultError::CryptoUnavailable {
            reason: "AES-256-GCM probe produced wrong plaintext".into(),
        });
    }

    tracing::debug!("crypto self check passed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
