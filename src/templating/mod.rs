//! Config templating for kots-render documents.
//!
//! This module evaluates the `repl` template syntax found in config item
//! defaults, values and arbitrary application manifests. Functions come
//! from *capability providers* ([`Ctx`] implementations) that a [`Builder`]
//! merges into one lookup table.
//!
//! # Render Passes
//!
//! Every render runs two passes over the text:
//!
//! 1. `{{repl ... }}` actions are evaluated
//! 2. `repl{{ ... }}` actions are evaluated on the output of pass 1
//!
//! A bare `{{ ... }}` is left untouched by both passes, so Helm or other
//! templates embedded in a manifest survive rendering.
//!
//! # Providers
//!
//! - [`StaticCtx`]: string, encoding, arithmetic, random and TLS helpers
//! - [`ConfigCtx`]: `ConfigOption` and friends over resolved item values
//! - [`LicenseCtx`]: license fields and registry credentials
//! - [`VersionCtx`], [`IdentityCtx`], [`KurlCtx`]: installation metadata
//! - [`RecordingCtx`]: dependency-recording stand-ins used by the resolver
//!
//! Providers are merged in the order they were added. When two providers
//! export the same function name the later one wins, and functions added
//! with [`Builder::add_func`] override every provider.
//!
//! # Examples
//!
//! ```
//! use kots_render::models::{ItemValue, ItemValues};
//! use kots_render::templating::{Builder, ConfigCtx, StaticCtx};
//!
//! let mut values = ItemValues::new();
//! values.insert("hostname".into(), ItemValue::new("", "example.com"));
//!
//! let mut builder = Builder::new();
//! builder.add_ctx(StaticCtx::new()).add_ctx(ConfigCtx::new(values));
//!
//! let rendered = builder.render_template(
//!     "ingress",
//!     r#"host: repl{{ ConfigOption "hostname" | ToUpper }}"#,
//! )?;
//! assert_eq!(rendered, "host: EXAMPLE.COM");
//! # Ok::<(), kots_render::templating::TemplateError>(())
//! ```

mod args;
pub mod cache;
mod config_ctx;
pub mod engine;
pub mod error;
mod installation;
mod license_ctx;
mod recording;
mod static_ctx;

use std::sync::Arc;

pub use cache::{CertRequest, TlsCache, TlsPair};
pub use config_ctx::ConfigCtx;
pub use engine::{Delimiters, FuncMap, Template, TemplateFn, Value, func};
pub use error::{FuncError, TemplateError};
pub use installation::{IdentityCtx, KurlCtx, VersionCtx};
pub use license_ctx::LicenseCtx;
pub use recording::{Recording, RecordingCtx};
pub use static_ctx::StaticCtx;

/// Name given to templates rendered through the typed wrappers.
const INLINE_TEMPLATE_NAME: &str = "template";

/// A capability provider: a named bundle of template functions.
pub trait Ctx: Send + Sync {
    /// The functions this provider contributes.
    fn func_map(&self) -> FuncMap;
}

/// Composes providers and custom functions into one evaluator.
#[derive(Clone, Default)]
pub struct Builder {
    ctxs: Vec<Arc<dyn Ctx>>,
    custom: FuncMap,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("ctxs", &self.ctxs.len())
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. It shadows earlier providers on name collisions.
    pub fn add_ctx(&mut self, ctx: impl Ctx + 'static) -> &mut Self {
        self.ctxs.push(Arc::new(ctx));
        self
    }

    /// Chaining form of [`add_ctx`](Self::add_ctx).
    pub fn with_ctx(mut self, ctx: impl Ctx + 'static) -> Self {
        self.add_ctx(ctx);
        self
    }

    /// Register a single function overriding every provider.
    pub fn add_func(&mut self, name: impl Into<String>, f: TemplateFn) -> &mut Self {
        self.custom.insert(name.into(), f);
        self
    }

    /// Merge providers in addition order, then the custom functions.
    pub fn build_func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();
        for ctx in &self.ctxs {
            funcs.extend(ctx.func_map());
        }
        funcs.extend(self.custom.iter().map(|(name, f)| (name.clone(), Arc::clone(f))));
        funcs
    }

    /// Render `text` through both delimiter passes.
    ///
    /// # Errors
    ///
    /// A parse or execution failure in either pass fails the whole render;
    /// no partial output is returned.
    pub fn render_template(&self, name: &str, text: &str) -> Result<String, TemplateError> {
        let funcs = self.build_func_map();
        let mut output = text.to_string();
        for delims in Delimiters::PASSES {
            output = render_with(&funcs, delims, name, &output)?;
        }
        Ok(output)
    }

    /// Render a single pass with the given delimiters.
    pub fn render_pass(
        &self,
        delims: Delimiters,
        name: &str,
        text: &str,
    ) -> Result<String, TemplateError> {
        render_with(&self.build_func_map(), delims, name, text)
    }

    pub fn string(&self, text: &str) -> Result<String, TemplateError> {
        self.render_template(INLINE_TEMPLATE_NAME, text)
    }

    /// Render and parse as a bool, falling back to `default` on empty or
    /// unparseable output.
    pub fn bool(&self, text: &str, default: bool) -> Result<bool, TemplateError> {
        self.typed(text, default, |s| static_ctx::parse_bool(s).ok_or("invalid bool"))
    }

    pub fn int(&self, text: &str, default: i64) -> Result<i64, TemplateError> {
        self.typed(text, default, str::parse::<i64>)
    }

    pub fn uint(&self, text: &str, default: u64) -> Result<u64, TemplateError> {
        self.typed(text, default, str::parse::<u64>)
    }

    pub fn float64(&self, text: &str, default: f64) -> Result<f64, TemplateError> {
        self.typed(text, default, str::parse::<f64>)
    }

    fn typed<T, E>(
        &self,
        text: &str,
        default: T,
        parse: impl Fn(&str) -> Result<T, E>,
    ) -> Result<T, TemplateError>
    where
        E: std::fmt::Display,
    {
        let rendered = self.string(text)?;
        let trimmed = rendered.trim();
        if trimmed.is_empty() {
            return Ok(default);
        }
        match parse(trimmed) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("Using default for rendered value {:?}: {}", trimmed, e);
                Ok(default)
            }
        }
    }
}

fn render_with(
    funcs: &FuncMap,
    delims: Delimiters,
    name: &str,
    text: &str,
) -> Result<String, TemplateError> {
    // Nothing to evaluate; skip the parse.
    if !text.contains(delims.left) {
        return Ok(text.to_string());
    }
    Template::parse(name, text, delims, funcs)?.execute(funcs, &Value::Nil)
}
