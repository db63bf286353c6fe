//! Vault error types.
//!
//! All vault subsystems surface errors through [`VaultError`], which is the
//! single error type returned by every public API in this crate.  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.
//!
//! Variants fall into four classes, exposed via [`VaultError::kind`]:
//!
//! - **Wallet** — operation-level failures (weak password, no keystore for an
//!   address). Recoverable; the caller picks a different input.
//! - **Authentication** — wrong password (AEAD tag mismatch). Recoverable;
//!   the user retries.
//! - **Crypto** — version mismatch, integrity failure, missing platform
//!   crypto. Integrity failures mean the record is presumed tampered or
//!   corrupted and retrying a password will not help; surface these
//!   distinctly from [`VaultError::WrongPassword`].
//! - **Storage** — repository read/write/delete failure.

/// Coarse failure class of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Wallet,
    Authentication,
    Crypto,
    Storage,
}

/// Unified error type for the Gossamer credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Wallet errors ------------------------------------------------------
    /// The supplied password does not meet the minimum strength requirement.
    #[error("password too weak: must be at least {min} characters")]
    WeakPassword { min: usize },

    /// No keystore exists for the requested address.
    #[error("no keystore found for address {address}")]
    KeystoreNotFound { address: String },

    /// An operation that needs a current wallet was called on an empty vault.
    #[error("no wallet has been created yet")]
    NoWallet,

    // -- Authentication errors ----------------------------------------------
    /// AEAD tag verification failed — the derived key is wrong, which means
    /// the supplied password is wrong.
    #[error("wrong password: authentication tag mismatch")]
    WrongPassword,

    // -- Crypto errors ------------------------------------------------------
    /// The package format version is not supported by this build.
    #[error("unsupported package version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The integrity digest over the serialized package did not verify.
    /// The record is presumed tampered with or corrupted.
    #[error("integrity check failed: package has been tampered with or corrupted")]
    IntegrityFailure,

    /// The platform cannot provide a required cryptographic primitive or the
    /// storage backend. Fatal at startup — the vault cannot operate.
    #[error("platform crypto/storage unavailable: {reason}")]
    CryptoUnavailable { reason: String },

    /// Encryption failed (e.g. invalid key length, ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Key derivation failed (e.g. random salt generation failed).
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    // -- Storage errors -----------------------------------------------------
    /// SQLite error from `rusqlite`.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error for a persisted record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking storage task failed to join.
    #[error("storage task failed: {0}")]
    TaskJoin(String),
}

impl VaultError {
    /// The coarse class of this error: wallet / authentication / crypto /
    /// storage.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeakPassword { .. } | Self::KeystoreNotFound { .. } | Self::NoWallet => {
                ErrorKind::Wallet
            }
            Self::WrongPassword => ErrorKind::Authentication,
            Self::UnsupportedVersion { .. }
            | Self::IntegrityFailure
            | Self::CryptoUnavailable { .. }
            | Self::EncryptionFailed { .. }
            | Self::KeyDerivationFailed { .. } => ErrorKind::Crypto,
            Self::Storage(_) | Self::Serialization(_) | Self::TaskJoin(_) => ErrorKind::Storage,
        }
    }

    /// Whether the failure is recoverable by user action (retry with a
    /// different password / input). Integrity and platform failures are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::IntegrityFailure | Self::CryptoUnavailable { .. }
        )
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskJoin(e.to_string())
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_taxonomy() {
        assert_eq!(VaultError::WeakPassword { min: 8 }.kind(), ErrorKind::Wallet);
        assert_eq!(VaultError::WrongPassword.kind(), ErrorKind::Authentication);
        assert_eq!(VaultError::IntegrityFailure.kind(), ErrorKind::Crypto);
        assert_eq!(
            VaultError::UnsupportedVersion {
                found: 2,
                expected: 1
            }
            .kind(),
            ErrorKind::Crypto
        );
        assert_eq!(
            VaultError::TaskJoin("boom".into()).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn integrity_failure_is_not_recoverable() {
        assert!(!VaultError::IntegrityFailure.is_recoverable());
        assert!(VaultError::WrongPassword.is_recoverable());
        assert!(
            VaultError::KeystoreNotFound {
                address: "5Grw".into()
            }
            .is_recoverable()
        );
    }
}
