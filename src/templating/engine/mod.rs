//! A small template engine for the `repl` action syntax.
//!
//! Templates are plain text interleaved with actions such as
//! `{{repl ConfigOption "hostname" | ToUpper }}`. The engine supports the
//! subset of the classic pipeline template language used by config
//! documents: pipelines, parenthesised sub-pipelines, variables,
//! `if`/`else if`/`else`, `range`, `with`, trim markers and comments.
//!
//! Functions are resolved by name at parse time against a [`FuncMap`], so an
//! unknown function is reported before anything executes.
//!
//! # Example
//!
//! ```
//! use kots_render::templating::engine::{Delimiters, FuncMap, Template, Value, func};
//!
//! let mut funcs = FuncMap::new();
//! funcs.insert("Shout".into(), func(|args| Ok(Value::from(args[0].to_string().to_uppercase()))));
//!
//! let tmpl = Template::parse("greeting", r#"hi {{repl "there" | Shout }}"#, Delimiters::CURLY_REPL, &funcs)?;
//! assert_eq!(tmpl.execute(&funcs, &Value::Nil)?, "hi THERE");
//! # Ok::<(), kots_render::templating::TemplateError>(())
//! ```

mod exec;
pub(crate) mod lexer;
mod parser;
pub mod value;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use value::Value;

use crate::constants::{CURLY_REPL_LEFT, REPL_CURLY_LEFT, RIGHT_DELIM};
use crate::templating::error::{FuncError, TemplateError};

/// A left/right delimiter pair for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub left: &'static str,
    pub right: &'static str,
}

impl Delimiters {
    pub const CURLY_REPL: Delimiters = Delimiters {
        left: CURLY_REPL_LEFT,
        right: RIGHT_DELIM,
    };

    pub const REPL_CURLY: Delimiters = Delimiters {
        left: REPL_CURLY_LEFT,
        right: RIGHT_DELIM,
    };

    /// Render passes in the order they are applied.
    pub const PASSES: [Delimiters; 2] = [Delimiters::CURLY_REPL, Delimiters::REPL_CURLY];
}

/// A template function. Pipeline input arrives as the last argument.
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync>;

/// Name-to-function table consulted at parse and execution time.
pub type FuncMap = BTreeMap<String, TemplateFn>;

/// Wrap a closure as a [`TemplateFn`].
pub fn func<F>(f: F) -> TemplateFn
where
    F: Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A parsed template, ready to execute any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<parser::Node>,
}

impl Template {
    /// Parse `text` with the given delimiters.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] on malformed actions, unbalanced
    /// blocks, or a reference to a function absent from `funcs`.
    pub fn parse(
        name: &str,
        text: &str,
        delims: Delimiters,
        funcs: &FuncMap,
    ) -> Result<Self, TemplateError> {
        let tokens = lexer::lex(text, delims).map_err(|e| TemplateError::Parse {
            name: name.to_string(),
            line: e.line,
            message: e.message,
        })?;
        let nodes = parser::parse(name, tokens, funcs)?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`, which is what `.` and `$` refer to.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Call`] when a function fails and
    /// [`TemplateError::Exec`] for evaluation errors such as an undefined
    /// variable.
    pub fn execute(&self, funcs: &FuncMap, data: &Value) -> Result<String, TemplateError> {
        exec::execute(&self.name, &self.nodes, funcs, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_are_independent() {
        let funcs = FuncMap::new();
        let text = "{{repl \"a\" }} repl{{ \"b\" }}";
        let first = Template::parse("t", text, Delimiters::CURLY_REPL, &funcs)
            .and_then(|t| t.execute(&funcs, &Value::Nil))
            .unwrap();
        assert_eq!(first, "a repl{{ \"b\" }}");
        let second = Template::parse("t", &first, Delimiters::REPL_CURLY, &funcs)
            .and_then(|t| t.execute(&funcs, &Value::Nil))
            .unwrap();
        assert_eq!(second, "a b");
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let funcs = FuncMap::new();
        let tmpl = Template::parse("t", "no actions {{ here }}", Delimiters::CURLY_REPL, &funcs)
            .unwrap();
        assert_eq!(tmpl.name(), "t");
        assert_eq!(tmpl.execute(&funcs, &Value::Nil).unwrap(), "no actions {{ here }}");
    }
}
