//! Ephemeral signing accounts backed by encrypted keyfiles.
//!
//! A [`KeyAccount`] wraps a raw private key into a password-protected
//! keystore file under the context's accounts directory. The keyfile is
//! the only on-disk secret artifact and lives exactly as long as the
//! account value: [`KeyAccount::dispose`] and `Drop` both delete it,
//! double deletion is a no-op. Signing goes through [`KeyAccount::acquire`],
//! which yields an armed [`LiveAccount`]; dropping the live view disarms
//! signing and resets the autosign flag on every exit path.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::network::EthereumWallet;
use alloy::primitives::{hex, Address};
use alloy::signers::local::PrivateKeySigner;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// An ephemeral account whose key material lives in an encrypted
/// keystore file.
pub struct KeyAccount {
    alias: String,
    password: String,
    keyfile: PathBuf,
    address: Address,
    autosign: AtomicBool,
}

impl KeyAccount {
    /// Encrypt `private_key` into `<accounts_dir>/<alias>.json`.
    ///
    /// Alias and password are generated when not supplied. The plaintext
    /// key does not persist past construction.
    pub fn new(
        accounts_dir: &Path,
        private_key: &str,
        alias: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let alias = alias.unwrap_or_else(|| random_hex(16));
        let password = password.unwrap_or_else(|| random_hex(32));
        let filename = format!("{alias}.json");

        let signer = PrivateKeySigner::from_str(private_key.trim())?;
        let address = signer.address();

        let mut raw_key = signer.to_bytes().0;
        let mut rng = rand::thread_rng();
        let encrypted = PrivateKeySigner::encrypt_keystore(
            accounts_dir,
            &mut rng,
            raw_key,
            &password,
            Some(&filename),
        );
        raw_key.zeroize();
        encrypted?;

        tracing::debug!(alias = %alias, address = %address, "encrypted account keyfile");

        Ok(Self {
            alias,
            password,
            keyfile: accounts_dir.join(filename),
            address,
            autosign: AtomicBool::new(false),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Checksummed address derived from the key.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn keyfile(&self) -> &Path {
        &self.keyfile
    }

    /// Arm automatic signing, builder-style. This is the one public way
    /// to flip the flag; acquiring resets it on release.
    pub fn autosign_enabled(self) -> Self {
        self.set_autosign(true);
        self
    }

    pub fn is_autosign(&self) -> bool {
        self.autosign.load(Ordering::Relaxed)
    }

    pub(crate) fn set_autosign(&self, enabled: bool) {
        self.autosign.store(enabled, Ordering::Relaxed);
    }

    /// Load and decrypt the keyfile, producing the armed signer view.
    ///
    /// Fails with [`Error::SigningLocked`] when autosign is disabled;
    /// there is no interactive unlock path.
    pub fn acquire(&self) -> Result<LiveAccount<'_>> {
        if !self.is_autosign() {
            return Err(Error::SigningLocked {
                alias: self.alias.clone(),
            });
        }
        let signer = PrivateKeySigner::decrypt_keystore(&self.keyfile, &self.password)?;
        let wallet = EthereumWallet::from(signer);
        tracing::debug!(alias = %self.alias, "account armed for signing");
        Ok(LiveAccount {
            account: self,
            wallet,
        })
    }

    /// Delete the keyfile. Idempotent: deleting an already-deleted
    /// keyfile is a no-op.
    pub fn dispose(&self) -> Result<()> {
        match fs::remove_file(&self.keyfile) {
            Ok(()) => {
                tracing::debug!(alias = %self.alias, "removed account keyfile");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for KeyAccount {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}

// Keeps the password out of debug output.
impl fmt::Debug for KeyAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAccount")
            .field("alias", &self.alias)
            .field("address", &self.address)
            .field("keyfile", &self.keyfile)
            .field("autosign", &self.is_autosign())
            .finish_non_exhaustive()
    }
}

/// The transient, armed view of a [`KeyAccount`]: key decrypted and
/// wrapped into a wallet ready to sign. Dropping it disarms the owning
/// account regardless of how the scope was exited.
pub struct LiveAccount<'a> {
    account: &'a KeyAccount,
    wallet: EthereumWallet,
}

impl LiveAccount<'_> {
    pub fn address(&self) -> Address {
        self.account.address
    }

    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

impl Drop for LiveAccount<'_> {
    fn drop(&mut self) {
        self.account.set_autosign(false);
        tracing::debug!(alias = %self.account.alias, "account disarmed");
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known anvil dev key, safe to embed.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn keyfile_exists_until_disposed_and_double_dispose_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let account = KeyAccount::new(dir.path(), DEV_KEY, Some("alice".to_string()), None).unwrap();

        let keyfile = account.keyfile().to_path_buf();
        assert_eq!(keyfile, dir.path().join("alice.json"));
        assert!(keyfile.is_file());

        account.dispose().unwrap();
        assert!(!keyfile.exists());
        account.dispose().unwrap();
    }

    #[test]
    fn drop_deletes_the_keyfile() {
        let dir = tempfile::tempdir().unwrap();
        let keyfile = {
            let account = KeyAccount::new(dir.path(), DEV_KEY, None, None).unwrap();
            let keyfile = account.keyfile().to_path_buf();
            assert!(keyfile.is_file());
            keyfile
        };
        assert!(!keyfile.exists());
    }

    #[test]
    fn derives_the_checksum_address() {
        let dir = tempfile::tempdir().unwrap();
        let account = KeyAccount::new(dir.path(), DEV_KEY, None, None).unwrap();
        assert_eq!(account.address().to_checksum(None), DEV_ADDRESS);
    }

    #[test]
    fn generates_alias_and_accepts_unprefixed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let account =
            KeyAccount::new(dir.path(), DEV_KEY.trim_start_matches("0x"), None, None).unwrap();
        // token-style alias: 16 random bytes, hex encoded
        assert_eq!(account.alias().len(), 32);
        assert!(account.keyfile().is_file());
    }

    #[test]
    fn acquire_requires_autosign() {
        let dir = tempfile::tempdir().unwrap();
        let account = KeyAccount::new(dir.path(), DEV_KEY, None, None).unwrap();
        assert!(!account.is_autosign());
        match account.acquire() {
            Err(Error::SigningLocked { alias }) => assert_eq!(alias, account.alias()),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        };
    }

    #[test]
    fn release_resets_autosign() {
        let dir = tempfile::tempdir().unwrap();
        let account = KeyAccount::new(dir.path(), DEV_KEY, None, None)
            .unwrap()
            .autosign_enabled();
        assert!(account.is_autosign());

        {
            let live = account.acquire().unwrap();
            assert_eq!(live.address().to_checksum(None), DEV_ADDRESS);
        }
        assert!(!account.is_autosign());

        // locked again until re-armed
        assert!(account.acquire().is_err());
    }

    #[test]
    fn debug_output_hides_the_password() {
        let dir = tempfile::tempdir().unwrap();
        let account = KeyAccount::new(
            dir.path(),
            DEV_KEY,
            Some("bob".to_string()),
            Some("hunter2".to_string()),
        )
        .unwrap();
        let rendered = format!("{account:?}");
        assert!(rendered.contains("bob"));
        assert!(!rendered.contains("hunter2"));
    }
}
