//! Config option lookups over the currently resolved item values.
//!
//! A missing item is never an error: lookups render as `""` and the
//! comparisons as `false`, so templates can reference optional items.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::Ctx;
use super::args::{check_arity, string_arg};
use crate::models::{ItemValue, ItemValues};
use crate::templating::engine::{FuncMap, Value, func};
use crate::templating::error::FuncError;

/// The config provider, backed by a snapshot of resolved values.
#[derive(Debug, Clone, Default)]
pub struct ConfigCtx {
    values: Arc<ItemValues>,
}

impl ConfigCtx {
    pub fn new(values: ItemValues) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn values(&self) -> &ItemValues {
        &self.values
    }
}

impl From<Arc<ItemValues>> for ConfigCtx {
    fn from(values: Arc<ItemValues>) -> Self {
        Self {
            values,
        }
    }
}

fn lookup<T>(
    values: &ItemValues,
    function: &str,
    args: &[Value],
    absent: T,
    f: impl FnOnce(&ItemValue) -> T,
) -> Result<T, FuncError> {
    let name = string_arg(function, args, 0)?;
    Ok(values.get(&name).map_or(absent, f))
}

impl Ctx for ConfigCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOption".to_string(),
            func(move |args| {
                check_arity("ConfigOption", args, 1, 1)?;
                lookup(&values, "ConfigOption", args, String::new(), |v| v.effective().to_string())
                    .map(Value::from)
            }),
        );

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOptionIndex".to_string(),
            func(move |args| {
                check_arity("ConfigOptionIndex", args, 1, 1)?;
                lookup(&values, "ConfigOptionIndex", args, String::new(), |v| {
                    v.repeatable_item.clone()
                })
                .map(Value::from)
            }),
        );

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOptionData".to_string(),
            func(move |args| {
                check_arity("ConfigOptionData", args, 1, 1)?;
                lookup(&values, "ConfigOptionData", args, String::new(), |v| {
                    STANDARD
                        .decode(v.effective().trim())
                        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                        .unwrap_or_default()
                })
                .map(Value::from)
            }),
        );

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOptionFilename".to_string(),
            func(move |args| {
                check_arity("ConfigOptionFilename", args, 1, 1)?;
                lookup(&values, "ConfigOptionFilename", args, String::new(), |v| {
                    v.filename.clone()
                })
                .map(Value::from)
            }),
        );

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOptionEquals".to_string(),
            func(move |args| {
                check_arity("ConfigOptionEquals", args, 2, 2)?;
                let expected = string_arg("ConfigOptionEquals", args, 1)?;
                lookup(&values, "ConfigOptionEquals", args, false, |v| v.effective() == expected)
                    .map(Value::Bool)
            }),
        );

        let values = Arc::clone(&self.values);
        funcs.insert(
            "ConfigOptionNotEquals".to_string(),
            func(move |args| {
                check_arity("ConfigOptionNotEquals", args, 2, 2)?;
                let expected = string_arg("ConfigOptionNotEquals", args, 1)?;
                lookup(&values, "ConfigOptionNotEquals", args, false, |v| {
                    v.effective() != expected
                })
                .map(Value::Bool)
            }),
        );

        funcs
    }
}
