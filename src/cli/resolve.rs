//! Resolve config values and print them as a ConfigValues document.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::{CommandContext, InputArgs};
use crate::config::{Settings, config_values_document};
use crate::core::file_error::write_file;
use crate::crypto::encrypt_value;
use crate::models::{ConfigGroup, ItemValues};

/// Resolve every config item in dependency order.
///
/// Supplied values win over computed ones for items that are not read-only.
/// When an encryption key is configured, password values are written
/// encrypted, so the output can be fed back in with `--values`.
///
/// # Examples
///
/// ```bash
/// kots-render resolve --config config.yaml
/// kots-render resolve --config config.yaml --values values.yaml --output resolved.yaml
/// ```
#[derive(Args, Debug)]
pub struct ResolveCommand {
    #[command(flatten)]
    inputs: InputArgs,

    /// Write the document here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Document name written to `metadata.name`
    #[arg(long, default_value = "config-values")]
    name: String,
}

impl ResolveCommand {
    pub fn execute(self, settings: Settings) -> Result<()> {
        let ctx = CommandContext::load(&self.inputs, settings)?;
        let resolver = ctx.resolver()?;
        let mut values = ctx.resolve(&resolver)?;

        if let Some(cipher) = ctx.settings.cipher()? {
            encrypt_passwords(&ctx.groups, &mut values, |plain| {
                Ok(encrypt_value(cipher.as_ref(), plain)?)
            })?;
        }

        let document = config_values_document(&self.name, values)?;
        match &self.output {
            Some(path) => {
                write_file(path, &document, "ConfigValues document")?;
                tracing::info!("Wrote config values to {}", path.display());
            }
            None => print!("{document}"),
        }
        Ok(())
    }
}

fn encrypt_passwords(
    groups: &[ConfigGroup],
    values: &mut ItemValues,
    encrypt: impl Fn(&str) -> Result<String>,
) -> Result<()> {
    for item in groups.iter().flat_map(|g| &g.items).filter(|i| i.is_password()) {
        if let Some(value) = values.get_mut(&item.name)
            && value.has_value()
        {
            value.value = encrypt(&value.value)?;
        }
    }
    Ok(())
}
