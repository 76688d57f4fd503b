//! User settings for the command line tool.
//!
//! # Location
//!
//! The settings file is looked up in this order:
//!
//! 1. the `--settings PATH` flag
//! 2. the `KOTS_RENDER_CONFIG` environment variable
//! 3. `~/.kots-render/config.toml` (`%LOCALAPPDATA%\kots-render\config.toml` on Windows)
//!
//! A missing file at the default location yields default settings. A path
//! given explicitly must exist.
//!
//! # File Format
//!
//! ```toml
//! namespace = "my-app"
//! encryption_key = "base64 key from `kots-render keygen`"
//!
//! [version]
//! sequence = 4
//! versionLabel = "1.2.0"
//! channelName = "Stable"
//!
//! [identity]
//! enabled = true
//! clientID = "kots"
//!
//! [kurl]
//! "Contour.Version" = "1.7.0"
//! ```
//!
//! Installation tables use the same camelCase keys as the YAML documents.
//! `KOTS_RENDER_ENCRYPTION_KEY` overrides `encryption_key`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::parse_config;
use crate::constants::{ENCRYPTION_KEY_ENV, SETTINGS_PATH_ENV};
use crate::core::KotsError;
use crate::crypto::{AesCipher, Cipher};
use crate::models::{IdentityConfig, KurlValues, VersionInfo};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Namespace reported by `Namespace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Cipher key for password items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityConfig>,

    /// Present only on embedded-cluster installs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kurl: Option<KurlValues>,
}

impl Settings {
    /// Load settings following the lookup order, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(SETTINGS_PATH_ENV).map(PathBuf::from);
        let mut settings = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                if !path.exists() {
                    return Err(KotsError::FileNotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                Self::load_from(&path)?
            }
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::load_from(&path)?,
                Ok(path) => {
                    tracing::debug!("No settings at {}, using defaults", path.display());
                    Self::default()
                }
                Err(e) => {
                    tracing::debug!("Using default settings: {}", e);
                    Self::default()
                }
            },
        };

        if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV)
            && !key.trim().is_empty()
        {
            settings.encryption_key = Some(key);
        }
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = parse_config(path)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `~/.kots-render/config.toml` or the platform equivalent.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("kots-render")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".kots-render")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// The configured cipher, if a key is set.
    pub fn cipher(&self) -> Result<Option<Arc<dyn Cipher>>> {
        let Some(key) = &self.encryption_key else {
            return Ok(None);
        };
        let cipher = AesCipher::from_key_string(key)
            .map_err(|e| KotsError::InvalidEncryptionKey {
                reason: e.to_string(),
            })
            .context("Failed to load encryption key from settings")?;
        Ok(Some(Arc::new(cipher)))
    }

    /// Like [`cipher`](Self::cipher) but a key is mandatory.
    pub fn require_cipher(&self) -> Result<Arc<dyn Cipher>> {
        self.cipher()?.ok_or_else(|| KotsError::EncryptionKeyMissing.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_full_settings() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
namespace = "apps"

[version]
sequence = 4
versionLabel = "1.2.0"

[identity]
enabled = true

[kurl]
"Contour.Version" = "1.7.0"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.namespace.as_deref(), Some("apps"));
        assert_eq!(settings.version.unwrap().sequence, 4);
        assert!(settings.identity.unwrap().enabled);
        assert_eq!(settings.kurl.unwrap()["Contour.Version"], "1.7.0");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "namespaces = \"typo\"\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_env_key_overrides_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "encryption_key = \"from-file\"\n").unwrap();

        let key = AesCipher::generate().unwrap().to_key_string();
        unsafe { std::env::set_var(ENCRYPTION_KEY_ENV, &key) };
        let settings = Settings::load(Some(&path));
        unsafe { std::env::remove_var(ENCRYPTION_KEY_ENV) };

        let settings = settings.unwrap();
        assert_eq!(settings.encryption_key.as_deref(), Some(key.as_str()));
        assert!(settings.cipher().unwrap().is_some());
    }

    #[test]
    #[serial]
    fn test_explicit_missing_path_fails() {
        let temp = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&temp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err.downcast_ref::<KotsError>(), Some(KotsError::FileNotFound { .. })));
    }

    #[test]
    fn test_require_cipher_without_key() {
        let err = Settings::default().require_cipher().unwrap_err();
        assert_eq!(err.downcast_ref::<KotsError>(), Some(&KotsError::EncryptionKeyMissing));
    }
}
