//! Configuration loading.
//!
//! Two kinds of input live here:
//!
//! - [`Settings`]: the tool's own TOML settings (namespace, encryption key,
//!   installation metadata)
//! - application documents: YAML `Config`, `ConfigValues` and `License`
//!   objects, see [`load_document`]

mod parser;
mod settings;

pub use parser::{
    CONFIG_KIND, CONFIG_VALUES_KIND, LICENSE_KIND, config_values_document, load_config,
    load_config_values, load_document, load_license, parse_config, parse_document,
};
pub use settings::Settings;
