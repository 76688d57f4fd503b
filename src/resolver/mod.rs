//! Config item resolution.
//!
//! Resolution happens in three steps:
//!
//! 1. [`new_config_context`] computes a starting value for every item using
//!    only the static functions. Templates that read other items come out
//!    empty at this stage.
//! 2. [`DepGraph::parse_config_group`] discovers which items read which,
//!    including the implicit links between `TLSKey` and `TLSCert` calls.
//! 3. [`ConfigResolver::resolve`] walks the graph in waves of independent
//!    items, re-rendering each one with every provider and the values
//!    resolved so far.
//!
//! # Example
//!
//! ```
//! use kots_render::models::{ConfigGroup, ConfigItem, ItemValues};
//! use kots_render::resolver::ConfigResolver;
//!
//! let groups = vec![ConfigGroup {
//!     name: "db".into(),
//!     items: vec![
//!         ConfigItem::new("host").with_default("postgres"),
//!         ConfigItem::new("url").with_default(r#"postgres://{{repl ConfigOption "host" }}:5432"#),
//!     ],
//!     ..Default::default()
//! }];
//!
//! let values = ConfigResolver::new().resolve(&groups, &ItemValues::new())?;
//! assert_eq!(values["url"].default, "postgres://postgres:5432");
//! # Ok::<(), kots_render::resolver::ResolveError>(())
//! ```

mod dependency_graph;
mod driver;
mod values;

use thiserror::Error;

use crate::templating::TemplateError;

pub use dependency_graph::{DepGraph, GraphError};
pub use driver::ConfigResolver;
pub use values::new_config_context;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to render config item '{item}'")]
    Render {
        item: String,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
