//! Inputs shared by the commands that resolve config values.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::config::{Settings, load_config, load_config_values, load_license};
use crate::core::KotsError;
use crate::models::{ConfigGroup, ItemValues, License};
use crate::resolver::ConfigResolver;

/// The documents a resolution reads.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Config document (`kind: Config`)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Previously supplied values (`kind: ConfigValues`)
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// License document (`kind: License`)
    #[arg(long, value_name = "FILE")]
    pub license: Option<PathBuf>,

    /// Do not fail when required items have no value
    #[arg(long)]
    pub skip_required: bool,
}

/// Loaded documents plus the settings they are resolved with.
#[derive(Debug)]
pub struct CommandContext {
    pub settings: Settings,
    pub groups: Vec<ConfigGroup>,
    pub supplied: ItemValues,
    pub license: Option<License>,
    skip_required: bool,
}

impl CommandContext {
    /// Load every document named in `inputs`.
    ///
    /// # Errors
    /// Returns an error if a named file is missing or is not the expected kind.
    pub fn load(inputs: &InputArgs, settings: Settings) -> Result<Self> {
        let groups = load_config(existing(&inputs.config)?)
            .with_context(|| format!("Failed to load config: {}", inputs.config.display()))?;
        let supplied = match &inputs.values {
            Some(path) => load_config_values(existing(path)?)
                .with_context(|| format!("Failed to load values: {}", path.display()))?,
            None => ItemValues::new(),
        };
        let license = match &inputs.license {
            Some(path) => Some(
                load_license(existing(path)?)
                    .with_context(|| format!("Failed to load license: {}", path.display()))?,
            ),
            None => None,
        };

        Ok(Self {
            settings,
            groups,
            supplied,
            license,
            skip_required: inputs.skip_required,
        })
    }

    /// A resolver configured from the settings and license.
    pub fn resolver(&self) -> Result<ConfigResolver> {
        Ok(ConfigResolver::new()
            .with_namespace(self.settings.namespace.clone())
            .with_license(self.license.clone())
            .with_version(self.settings.version.clone())
            .with_identity(self.settings.identity.clone())
            .with_kurl(self.settings.kurl.clone())
            .with_cipher(self.settings.cipher()?))
    }

    /// Resolve all items, failing on missing required items unless skipped.
    pub fn resolve(&self, resolver: &ConfigResolver) -> Result<ItemValues> {
        let values = resolver
            .resolve(&self.groups, &self.supplied)
            .context("Failed to resolve config values")?;

        let missing = resolver.validate_required(&self.groups, &values)?;
        if !missing.is_empty() {
            if !self.skip_required {
                return Err(KotsError::RequiredItemsMissing {
                    items: missing,
                }
                .into());
            }
            tracing::warn!("Required items have no value: {}", missing.join(", "));
        }
        Ok(values)
    }
}

fn existing(path: &Path) -> Result<&Path> {
    if path.exists() {
        Ok(path)
    } else {
        Err(KotsError::FileNotFound {
            path: path.display().to_string(),
        }
        .into())
    }
}
