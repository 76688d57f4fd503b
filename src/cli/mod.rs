//! Command-line interface for kots-render.
//!
//! # Commands
//!
//! - `resolve` - resolve config values and print a ConfigValues document
//! - `render` - render documents with the resolved values
//! - `graph` - show the evaluation order of config items
//! - `keygen` - print a new encryption key
//! - `encrypt` - encrypt a password value with the configured key
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: debug logging
//! - `--quiet` / `-q`: errors only
//! - `--settings PATH`: settings file (see [`Settings`])
//!
//! `RUST_LOG` overrides the level chosen by `--verbose` and `--quiet`.

mod common;
mod graph;
mod keys;
mod render;
mod resolve;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

pub use common::{CommandContext, InputArgs};
pub use graph::GraphFormat;

/// Options that apply to every command.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive when `RUST_LOG` is not set
    pub log_level: String,

    pub settings_path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "kots-render",
    about = "Resolve application config values and render templated documents",
    version,
    long_about = "kots-render evaluates {{repl ... }} and repl{{ ... }} templates in application \
                  config items in dependency order, then renders documents with the results."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve config values in dependency order
    Resolve(resolve::ResolveCommand),

    /// Render documents with resolved config values
    Render(render::RenderCommand),

    /// Show the evaluation order of config items
    Graph(graph::GraphCommand),

    /// Print a new encryption key
    Keygen(keys::KeygenCommand),

    /// Encrypt a value with the configured key
    Encrypt(keys::EncryptCommand),
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            settings_path: self.settings.clone(),
        }
    }

    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let settings = || Settings::load(config.settings_path.as_deref());
        match self.command {
            Commands::Resolve(cmd) => cmd.execute(settings()?),
            Commands::Render(cmd) => cmd.execute(settings()?),
            Commands::Graph(cmd) => cmd.execute(settings()?),
            Commands::Encrypt(cmd) => cmd.execute(settings()?),
            Commands::Keygen(cmd) => cmd.execute(),
        }
    }
}
