//! Encryption key management for password items.

use anyhow::Result;
use clap::Args;

use crate::config::Settings;
use crate::crypto::{AesCipher, encrypt_value};

/// Print a new encryption key.
///
/// Store it as `encryption_key` in the settings file or export it as
/// `KOTS_RENDER_ENCRYPTION_KEY`.
#[derive(Args, Debug)]
pub struct KeygenCommand {}

impl KeygenCommand {
    pub fn execute(self) -> Result<()> {
        let cipher = AesCipher::generate()?;
        println!("{}", cipher.to_key_string());
        Ok(())
    }
}

/// Encrypt a value for use in a ConfigValues document.
#[derive(Args, Debug)]
pub struct EncryptCommand {
    /// Plaintext to encrypt
    value: String,
}

impl EncryptCommand {
    pub fn execute(self, settings: Settings) -> Result<()> {
        let cipher = settings.require_cipher()?;
        println!("{}", encrypt_value(cipher.as_ref(), &self.value)?);
        Ok(())
    }
}
