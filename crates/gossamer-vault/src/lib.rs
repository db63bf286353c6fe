//! Encrypted mnemonic vault for Gossamer Wallet.
//!
//! This crate turns a user-chosen password into a durable, tamper-evident,
//! password-recoverable encrypted store for wallet recovery phrases, and
//! manages multiple such secrets (one keystore per account address). All
//! secret material is encrypted at rest with AES-256-GCM under keys derived
//! by PBKDF2-HMAC-SHA256, with an independent HMAC integrity layer over
//! every persisted package.
//!
//! # Modules
//!
//! - [`crypto`] — AES-256-GCM seal/open, secure randomness, self check.
//! - [`kdf`] — PBKDF2 derivation of the encryption + integrity key pair.
//! - [`package`] — the versioned [`EncryptedPackage`] codec and
//!   encrypt/decrypt with the HMAC-before-AEAD verification order.
//! - [`store`] — async SQLite-backed keystore repository.
//! - [`keyring`] — the narrow seam to the external mnemonic/keypair
//!   derivation collaborator.
//! - [`manager`] — the [`VaultManager`] public API: create, unlock, switch
//!   account, change password, backup/restore, delete.
//! - [`error`] — unified [`VaultError`] taxonomy.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gossamer_vault::{VaultManager, VaultStore};
//!
//! # async fn example() -> gossamer_vault::Result<()> {
//! let store = VaultStore::open("data/vault.db")?;
//! let vault = VaultManager::initialize(store).await?;
//!
//! vault
//!     .store_encrypted_mnemonic(
//!         "alpha bravo charlie delta echo foxtrot",
//!         "correcthorse1",
//!         "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
//!     )
//!     .await?;
//!
//! let mnemonic = vault
//!     .retrieve_encrypted_mnemonic("correcthorse1", None)
//!     .await?;
//! # let _ = mnemonic;
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod kdf;
pub mod keyring;
pub mod manager;
pub mod package;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{ErrorKind, Result, VaultError};
pub use keyring::{DerivedAccount, KeypairDeriver};
pub use manager::{SecureKeystore, SessionState, UnlockRequest, VaultManager, WalletBackup};
pub use package::{EncryptedPackage, FORMAT_VERSION};
pub use store::VaultStore;
