//! kots-render - application config templating and dependency resolution
//!
//! Application config items carry default and value templates written in a
//! Go-template-like language with two delimiter styles, `{{repl ... }}` and
//! `repl{{ ... }}`. Templates call functions that read other config items,
//! license fields, installation metadata or generate TLS material. This
//! crate evaluates those templates in dependency order and renders arbitrary
//! documents with the results.
//!
//! # Core Modules
//!
//! - [`templating`] - the template engine, function providers and the [`templating::Builder`]
//! - [`resolver`] - dependency graph and dependency-ordered value resolution
//! - [`crypto`] - encryption of password values
//! - [`models`] - config groups, items, values, license and installation data
//!
//! # Command Line Surface
//!
//! - [`cli`] - `resolve`, `render`, `graph`, `keygen` and `encrypt` commands
//! - [`config`] - settings file and YAML document loading
//! - [`core`] - user-facing error types
//!
//! # Example
//!
//! ```
//! use kots_render::models::{ConfigGroup, ConfigItem, ItemValues};
//! use kots_render::resolver::ConfigResolver;
//!
//! let groups = vec![ConfigGroup {
//!     name: "example".into(),
//!     items: vec![
//!         ConfigItem::new("greeting").with_default(r#"repl{{ ToUpper "hello" }}"#),
//!         ConfigItem::new("message").with_default(r#"{{repl ConfigOption "greeting" }}, world"#),
//!     ],
//!     ..Default::default()
//! }];
//!
//! let resolver = ConfigResolver::new();
//! let values = resolver.resolve(&groups, &ItemValues::new())?;
//! assert_eq!(values["message"].default, "HELLO, world");
//!
//! let rendered = resolver
//!     .builder(values)
//!     .render_template("deployment.yaml", r#"greeting: '{{repl ConfigOption "message" }}'"#)?;
//! assert_eq!(rendered, "greeting: 'HELLO, world'");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod crypto;
pub mod models;
pub mod resolver;
pub mod templating;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
