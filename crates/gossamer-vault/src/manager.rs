//! The vault manager: the public API the wallet state layer consumes.
//!
//! [`VaultManager`] orchestrates key derivation, authenticated encryption,
//! the integrity layer, and the keystore repository into
//! create/unlock/switch/change-password/backup/restore/delete semantics over
//! a multi-account vault.
//!
//! The manager is an explicit context object with a defined lifecycle
//! ([`VaultManager::initialize`] / [`VaultManager::teardown`]) passed to
//! call sites — there is no ambient global vault state.
//!
//! # Sessions
//!
//! Each wallet session moves through `NoWallet → Unlocking → Unlocked ⇄
//! Locked`; deletion returns to `NoWallet` from anywhere. Switching the
//! current address always forces `Locked` — no derived key material ever
//! carries over between accounts (none is cached in the first place; every
//! unlock re-derives from the password).
//!
//! # Concurrency
//!
//! Vault-mutating operations serialize through a single-flight lock held by
//! the manager, so a `change_password` can never interleave with another
//! mutation of the same vault. Reads (`verify_password`,
//! `retrieve_encrypted_mnemonic`) do not take the lock; they operate on
//! whole-record snapshots and packages are immutable once written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto;
use crate::error::{Result, VaultError};
use crate::kdf;
use crate::package::{self, EncryptedPackage};
use crate::store::{VaultStore, records};

/// The sentinel encrypted into the password check marker. Decrypting the
/// marker and comparing against this verifies a password without ever
/// touching real secret material.
const PASSWORD_CHECK_SENTINEL: &str = "gossamer-master-key-check";

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// One persisted wallet account: an address and its encrypted mnemonic.
///
/// Exactly one keystore exists per address; re-storing the same address
/// replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecureKeystore {
    /// The account address — the unique keystore key.
    pub address: String,

    /// The mnemonic, sealed in a versioned package.
    pub encrypted_mnemonic: EncryptedPackage,

    /// When this keystore was created, epoch milliseconds.
    pub created_at: i64,
}

/// The whole-vault snapshot serialized as backup plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBackup {
    pub keystores: Vec<SecureKeystore>,
    pub aliases: BTreeMap<String, String>,
    pub current_address: Option<String>,
}

/// Where a wallet session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The vault holds no keystores.
    NoWallet,
    /// A decryption attempt is in flight.
    Unlocking,
    /// The current account's mnemonic was decrypted this session.
    Unlocked,
    /// A wallet exists but no key material is available.
    Locked,
}

/// How an unlock attempt supplies its credential.
///
/// The variant is decided explicitly at the call site — there is no
/// runtime inspection of what the caller happened to pass.
pub enum UnlockRequest {
    /// The caller collected a password and supplies it inline.
    Password(String),
    /// Re-assert an already-unlocked session (e.g. a UI resume). Valid only
    /// while the session is `Unlocked`; anything else requires a password.
    Resume,
}

// ---------------------------------------------------------------------------
// VaultManager
// ---------------------------------------------------------------------------

/// Orchestrates the encrypted vault. See the module docs for semantics.
pub struct VaultManager {
    store: VaultStore,
    /// Single-flight lock serializing vault-mutating operations.
    op_lock: tokio::sync::Mutex<()>,
    session: std::sync::Mutex<SessionState>,
}

impl VaultManager {
    // -- Lifecycle ----------------------------------------------------------

    /// Build a manager over `store` after verifying the platform provides
    /// working crypto primitives and a reachable storage backend.
    ///
    /// # Errors
    ///
    /// [`VaultError::CryptoUnavailable`] or [`VaultError::Storage`] — both
    /// fatal; the wallet cannot proceed without them.
    pub async fn initialize(store: VaultStore) -> Result<Self> {
        crypto::self_check()?;
        store.ping().await?;

        let manager = Self {
            store,
            op_lock: tokio::sync::Mutex::new(()),
            session: std::sync::Mutex::new(SessionState::NoWallet),
        };

        let state = if manager.has_wallet().await? {
            SessionState::Locked
        } else {
            SessionState::NoWallet
        };
        manager.set_session(state);

        info!(session = ?state, "vault manager initialized");
        Ok(manager)
    }

    /// End the session: discard session state and lock the vault. The
    /// manager holds no cached key material, so this is purely a state
    /// transition; the store handle stays usable by other holders.
    pub async fn teardown(&self) -> Result<()> {
        let state = if self.has_wallet().await? {
            SessionState::Locked
        } else {
            SessionState::NoWallet
        };
        self.set_session(state);
        info!("vault manager torn down");
        Ok(())
    }

    /// The current session state.
    pub fn session_state(&self) -> SessionState {
        *self.session.lock().expect("session mutex poisoned")
    }

    fn set_session(&self, state: SessionState) {
        *self.session.lock().expect("session mutex poisoned") = state;
    }

    // -- Create / unlock ----------------------------------------------------

    /// Encrypt `mnemonic` under `password` and persist it as the keystore
    /// for `address`, making that account current.
    ///
    /// Re-storing an existing address replaces its keystore. Also assigns a
    /// default alias for new accounts and (re)writes the password check
    /// marker under the same password. The session ends `Unlocked`.
    ///
    /// # Errors
    ///
    /// [`VaultError::WeakPassword`] before anything is encrypted; storage
    /// and crypto errors otherwise.
    pub async fn store_encrypted_mnemonic(
        &self,
        mnemonic: &str,
        password: &str,
        address: &str,
    ) -> Result<()> {
        kdf::validate_password_strength(password)?;
        let _guard = self.op_lock.lock().await;

        let encrypted = package::encrypt(mnemonic.as_bytes(), password)?;
        let keystore = SecureKeystore {
            address: address.to_string(),
            encrypted_mnemonic: encrypted,
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut keystores = self.load_keystores().await?;
        let mut aliases = self.load_aliases().await?;

        match keystores.iter().position(|k| k.address == address) {
            Some(i) => keystores[i] = keystore,
            None => {
                aliases
                    .entry(address.to_string())
                    .or_insert_with(|| format!("Account {}", keystores.len() + 1));
                keystores.push(keystore);
            }
        }

        let marker = package::encrypt(PASSWORD_CHECK_SENTINEL.as_bytes(), password)?;

        self.store
            .set_many(vec![
                (records::KEYSTORES.into(), serde_json::to_string(&keystores)?),
                (records::ALIASES.into(), serde_json::to_string(&aliases)?),
                (records::CURRENT_ADDRESS.into(), address.to_string()),
                (
                    records::MASTER_KEY_CHECK.into(),
                    serde_json::to_string(&marker)?,
                ),
            ])
            .await?;

        self.set_session(SessionState::Unlocked);
        info!(address = %address, "stored encrypted mnemonic");
        Ok(())
    }

    /// Decrypt and return the mnemonic for `address` (or the current
    /// account when `address` is `None`).
    ///
    /// # Errors
    ///
    /// - [`VaultError::NoWallet`] — no target address could be resolved.
    /// - [`VaultError::KeystoreNotFound`] — no keystore for that address.
    /// - [`VaultError::WrongPassword`] / [`VaultError::IntegrityFailure`] —
    ///   propagated from decryption.
    pub async fn retrieve_encrypted_mnemonic(
        &self,
        password: &str,
        address: Option<&str>,
    ) -> Result<String> {
        let target = match address {
            Some(a) => a.to_string(),
            None => self
                .get_current_address()
                .await?
                .ok_or(VaultError::NoWallet)?,
        };

        let keystores = self.load_keystores().await?;
        let keystore = keystores
            .iter()
            .find(|k| k.address == target)
            .ok_or_else(|| VaultError::KeystoreNotFound {
                address: target.clone(),
            })?;

        self.set_session(SessionState::Unlocking);
        let plaintext = match package::decrypt(&keystore.encrypted_mnemonic, password) {
            Ok(p) => p,
            Err(e) => {
                self.set_session(SessionState::Locked);
                return Err(e);
            }
        };

        let mnemonic = String::from_utf8(plaintext.to_vec()).map_err(|_| {
            warn!(address = %target, "decrypted mnemonic is not valid UTF-8");
            VaultError::IntegrityFailure
        })?;

        self.set_session(SessionState::Unlocked);
        debug!(address = %target, "retrieved mnemonic");
        Ok(mnemonic)
    }

    /// Check `password` against the check marker without touching any
    /// mnemonic. Every failure — missing marker, tamper, wrong password —
    /// maps to `false`; this call never errors on a bad password.
    pub async fn verify_password(&self, password: &str) -> Result<bool> {
        let Some(raw) = self.store.get(records::MASTER_KEY_CHECK).await? else {
            return Ok(false);
        };
        let Ok(marker) = serde_json::from_str::<EncryptedPackage>(&raw) else {
            return Ok(false);
        };

        match package::decrypt(&marker, password) {
            Ok(plaintext) => Ok(&**plaintext == PASSWORD_CHECK_SENTINEL.as_bytes()),
            Err(e) => {
                debug!(error = %e, "password verification failed");
                Ok(false)
            }
        }
    }

    /// Drive the session state machine through an explicit unlock attempt.
    ///
    /// `Password` verifies against the check marker; `Resume` is only valid
    /// while the session is already `Unlocked`.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoWallet`] with an empty vault,
    /// [`VaultError::WrongPassword`] otherwise on failure.
    pub async fn unlock(&self, request: UnlockRequest) -> Result<()> {
        if !self.has_wallet().await? {
            return Err(VaultError::NoWallet);
        }

        match request {
            UnlockRequest::Password(password) => {
                self.set_session(SessionState::Unlocking);
                if self.verify_password(&password).await? {
                    self.set_session(SessionState::Unlocked);
                    Ok(())
                } else {
                    self.set_session(SessionState::Locked);
                    Err(VaultError::WrongPassword)
                }
            }
            UnlockRequest::Resume => match self.session_state() {
                SessionState::Unlocked => Ok(()),
                _ => Err(VaultError::WrongPassword),
            },
        }
    }

    /// Lock the session. No key material exists to discard — the vault never
    /// caches derived keys — so this is a pure state transition.
    pub async fn lock(&self) -> Result<()> {
        let state = if self.has_wallet().await? {
            SessionState::Locked
        } else {
            SessionState::NoWallet
        };
        self.set_session(state);
        Ok(())
    }

    // -- Password change ----------------------------------------------------

    /// Re-encrypt every keystore and the check marker under `new_password`.
    ///
    /// All-or-nothing: every keystore is decrypted under `old_password`
    /// in memory first; only when all of them succeed is anything
    /// persisted, in a single transaction. A failure anywhere leaves the
    /// prior state fully intact.
    ///
    /// # Errors
    ///
    /// - [`VaultError::WeakPassword`] — `new_password` too short.
    /// - [`VaultError::WrongPassword`] — `old_password` does not verify.
    /// - [`VaultError::NoWallet`] — empty vault.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        kdf::validate_password_strength(new_password)?;
        let _guard = self.op_lock.lock().await;

        if !self.verify_password(old_password).await? {
            return Err(VaultError::WrongPassword);
        }

        let keystores = self.load_keystores().await?;
        if keystores.is_empty() {
            return Err(VaultError::NoWallet);
        }

        // Decrypt everything first; any failure aborts before persistence.
        let mut reencrypted = Vec::with_capacity(keystores.len());
        for keystore in &keystores {
            let plaintext = package::decrypt(&keystore.encrypted_mnemonic, old_password)?;
            let encrypted = package::encrypt(&plaintext, new_password)?;
            reencrypted.push(SecureKeystore {
                address: keystore.address.clone(),
                encrypted_mnemonic: encrypted,
                created_at: keystore.created_at,
            });
        }

        let marker = package::encrypt(PASSWORD_CHECK_SENTINEL.as_bytes(), new_password)?;

        self.store
            .set_many(vec![
                (
                    records::KEYSTORES.into(),
                    serde_json::to_string(&reencrypted)?,
                ),
                (
                    records::MASTER_KEY_CHECK.into(),
                    serde_json::to_string(&marker)?,
                ),
            ])
            .await?;

        info!(accounts = reencrypted.len(), "password changed");
        Ok(())
    }

    // -- Backup / restore ---------------------------------------------------

    /// Serialize the whole vault (keystores, aliases, current address) and
    /// encrypt it as a single package for export.
    ///
    /// # Errors
    ///
    /// [`VaultError::WeakPassword`] or [`VaultError::NoWallet`].
    pub async fn export_wallet_backup(&self, password: &str) -> Result<EncryptedPackage> {
        kdf::validate_password_strength(password)?;

        let backup = WalletBackup {
            keystores: self.load_keystores().await?,
            aliases: self.load_aliases().await?,
            current_address: self.get_current_address().await?,
        };
        if backup.keystores.is_empty() {
            return Err(VaultError::NoWallet);
        }

        let plaintext = serde_json::to_vec(&backup)?;
        let package = package::encrypt(&plaintext, password)?;

        info!(accounts = backup.keystores.len(), "exported wallet backup");
        Ok(package)
    }

    /// Decrypt `package` under `password` and wholesale-replace the vault
    /// with its contents, regenerating the check marker.
    ///
    /// # Errors
    ///
    /// Propagates version/integrity/authentication errors from decryption;
    /// [`VaultError::NoWallet`] if the backup holds no keystores.
    pub async fn import_wallet_backup(
        &self,
        package: &EncryptedPackage,
        password: &str,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let plaintext = package::decrypt(package, password)?;
        let backup: WalletBackup = serde_json::from_slice(&plaintext)?;

        if backup.keystores.is_empty() {
            return Err(VaultError::NoWallet);
        }

        let current = backup
            .current_address
            .clone()
            .filter(|a| backup.keystores.iter().any(|k| &k.address == a))
            .unwrap_or_else(|| backup.keystores[0].address.clone());

        let marker = package::encrypt(PASSWORD_CHECK_SENTINEL.as_bytes(), password)?;

        self.store
            .set_many(vec![
                (
                    records::KEYSTORES.into(),
                    serde_json::to_string(&backup.keystores)?,
                ),
                (
                    records::ALIASES.into(),
                    serde_json::to_string(&backup.aliases)?,
                ),
                (records::CURRENT_ADDRESS.into(), current),
                (
                    records::MASTER_KEY_CHECK.into(),
                    serde_json::to_string(&marker)?,
                ),
            ])
            .await?;

        self.set_session(SessionState::Locked);
        info!(accounts = backup.keystores.len(), "imported wallet backup");
        Ok(())
    }

    // -- Account management -------------------------------------------------

    /// All persisted keystores, in storage order.
    pub async fn load_all_keystores(&self) -> Result<Vec<SecureKeystore>> {
        self.load_keystores().await
    }

    /// Whether the vault holds at least one keystore.
    pub async fn has_wallet(&self) -> Result<bool> {
        Ok(!self.load_keystores().await?.is_empty())
    }

    /// The currently selected address, if any.
    pub async fn get_current_address(&self) -> Result<Option<String>> {
        self.store.get(records::CURRENT_ADDRESS).await
    }

    /// The currently selected address, failing when the vault is empty.
    pub async fn get_stored_address(&self) -> Result<String> {
        self.get_current_address()
            .await?
            .ok_or(VaultError::NoWallet)
    }

    /// Switch the current account. Always forces the session into `Locked`:
    /// nothing derived for the previous account may carry over.
    ///
    /// # Errors
    ///
    /// [`VaultError::KeystoreNotFound`] if no keystore exists for `address`.
    pub async fn set_current_address(&self, address: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let keystores = self.load_keystores().await?;
        if !keystores.iter().any(|k| k.address == address) {
            return Err(VaultError::KeystoreNotFound {
                address: address.to_string(),
            });
        }

        self.store.set(records::CURRENT_ADDRESS, address).await?;
        self.set_session(SessionState::Locked);
        info!(address = %address, "switched current account");
        Ok(())
    }

    /// The alias for `address`, if one is set.
    pub async fn get_alias(&self, address: &str) -> Result<Option<String>> {
        Ok(self.load_aliases().await?.remove(address))
    }

    /// Set (or replace) the alias for `address`.
    pub async fn set_alias(&self, address: &str, alias: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let mut aliases = self.load_aliases().await?;
        aliases.insert(address.to_string(), alias.to_string());
        self.store
            .set(records::ALIASES, &serde_json::to_string(&aliases)?)
            .await?;
        Ok(())
    }

    /// Delete the keystore (and alias) for `address`.
    ///
    /// If the deleted account was current, the pointer moves to the first
    /// remaining account. Deleting the last account wipes the vault
    /// entirely, check marker included.
    ///
    /// # Errors
    ///
    /// [`VaultError::KeystoreNotFound`] if no keystore exists for `address`.
    pub async fn delete_wallet_by_address(&self, address: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let mut keystores = self.load_keystores().await?;
        let before = keystores.len();
        keystores.retain(|k| k.address != address);
        if keystores.len() == before {
            return Err(VaultError::KeystoreNotFound {
                address: address.to_string(),
            });
        }

        if keystores.is_empty() {
            self.store.clear().await?;
            self.set_session(SessionState::NoWallet);
            info!(address = %address, "deleted last wallet; vault wiped");
            return Ok(());
        }

        let mut aliases = self.load_aliases().await?;
        aliases.remove(address);

        let current = self.get_current_address().await?;
        let current = match current {
            Some(c) if c != address => c,
            _ => keystores[0].address.clone(),
        };

        self.store
            .set_many(vec![
                (records::KEYSTORES.into(), serde_json::to_string(&keystores)?),
                (records::ALIASES.into(), serde_json::to_string(&aliases)?),
                (records::CURRENT_ADDRESS.into(), current),
            ])
            .await?;

        self.set_session(SessionState::Locked);
        info!(address = %address, remaining = keystores.len(), "deleted wallet");
        Ok(())
    }

    /// Delete the current account's keystore.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoWallet`] if no account is current.
    pub async fn delete_wallet(&self) -> Result<()> {
        let current = self.get_stored_address().await?;
        self.delete_wallet_by_address(&current).await
    }

    /// Wipe the vault completely: all keystores, aliases, the current
    /// address pointer, and the check marker.
    pub async fn delete_all_wallets(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.store.clear().await?;
        self.set_session(SessionState::NoWallet);
        info!("deleted all wallets");
        Ok(())
    }

    // -- Internal helpers ---------------------------------------------------

    async fn load_keystores(&self) -> Result<Vec<SecureKeystore>> {
        match self.store.get(records::KEYSTORES).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn load_aliases(&self) -> Result<BTreeMap<String, String>> {
        match self.store.get(records::ALIASES).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
