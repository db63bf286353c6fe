//! The mnemonic/keypair derivation seam.
//!
//! Mnemonic generation and address derivation (BIP39 wordlists, SR25519
//! keypairs) are external collaborators, not part of the vault core. The
//! vault consumes them through the narrow [`KeypairDeriver`] trait so the
//! core stays testable in isolation and the heavyweight chain crypto can be
//! swapped per target.
//!
//! Implementations must be `Send + Sync` so the vault can be used across
//! async tasks.

use crate::error::Result;

/// An account derived from a mnemonic. The vault only ever needs the
/// address; private key material stays inside the deriver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAccount {
    /// The chain address (SS58-style, e.g. `5Grw...`). Unique per account
    /// and used as the keystore key.
    pub address: String,
}

/// Narrow interface to the external mnemonic/keypair collaborator.
pub trait KeypairDeriver: Send + Sync {
    /// Generate a fresh recovery phrase.
    fn generate_mnemonic(&self) -> Result<String>;

    /// Check whether `mnemonic` is a well-formed recovery phrase.
    fn validate_mnemonic(&self, mnemonic: &str) -> bool;

    /// Derive the account (address) a mnemonic controls.
    fn create_keypair_from_mnemonic(&self, mnemonic: &str) -> Result<DerivedAccount>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;

    /// Deterministic fake deriver: twelve fixed words, address = word count.
    struct FakeDeriver;

    impl KeypairDeriver for FakeDeriver {
        fn generate_mnemonic(&self) -> Result<String> {
            Ok("alpha bravo charlie delta echo foxtrot".to_string())
        }

        fn validate_mnemonic(&self, mnemonic: &str) -> bool {
            let words = mnemonic.split_whitespace().count();
            words == 6 || words == 12 || words == 24
        }

        fn create_keypair_from_mnemonic(&self, mnemonic: &str) -> Result<DerivedAccount> {
            if !self.validate_mnemonic(mnemonic) {
                return Err(VaultError::NoWallet);
            }
            Ok(DerivedAccount {
                address: format!("5Fake{}", mnemonic.split_whitespace().count()),
            })
        }
    }

    #[test]
    fn deriver_seam_is_object_safe() {
        let deriver: Box<dyn KeypairDeriver> = Box::new(FakeDeriver);

        let mnemonic = deriver.generate_mnemonic().unwrap();
        assert!(deriver.validate_mnemonic(&mnemonic));

        let account = deriver.create_keypair_from_mnemonic(&mnemonic).unwrap();
        assert_eq!(account.address, "5Fake6");

        assert!(deriver.create_keypair_from_mnemonic("one two three").is_err());
    }
}
