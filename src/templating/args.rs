//! Argument coercion helpers shared by the template providers.
//!
//! Functions receive positional [`Value`]s. String parameters accept any
//! scalar (`ToUpper 5` is `"5"`); integer parameters accept numbers and
//! numeric strings.

use crate::templating::engine::Value;
use crate::templating::error::FuncError;

/// Fail unless `min <= args.len() <= max`.
pub(crate) fn check_arity(
    function: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), FuncError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min}..{max}")
        };
        return Err(FuncError::arity(function, &expected, args.len()));
    }
    Ok(())
}

pub(crate) fn string_arg(function: &str, args: &[Value], index: usize) -> Result<String, FuncError> {
    match args.get(index) {
        Some(value) if value.is_scalar() => Ok(value.to_string()),
        Some(value) => Err(FuncError::new(format!(
            "{function}: argument {} must be a string, got {}",
            index + 1,
            value.type_name()
        ))),
        None => Ok(String::new()),
    }
}

pub(crate) fn optional_string_arg(args: &[Value], index: usize) -> Option<String> {
    args.get(index).filter(|v| v.is_scalar()).map(ToString::to_string).filter(|s| !s.is_empty())
}

pub(crate) fn int_arg(function: &str, args: &[Value], index: usize) -> Result<i64, FuncError> {
    let invalid = |value: &Value| {
        FuncError::new(format!(
            "{function}: argument {} must be an integer, got {value:?}",
            index + 1
        ))
    };
    match args.get(index) {
        None | Some(Value::Nil) => Ok(0),
        Some(Value::Int(i)) => Ok(*i),
        Some(value @ Value::Uint(u)) => i64::try_from(*u).map_err(|_| invalid(value)),
        Some(Value::Float(f)) => Ok(f.trunc() as i64),
        Some(value @ Value::String(s)) => s.trim().parse().map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

/// A list argument given either as a list value or a comma-separated string.
pub(crate) fn string_list_arg(args: &[Value], index: usize) -> Vec<String> {
    match args.get(index) {
        Some(Value::List(items)) => {
            items.iter().map(ToString::to_string).filter(|s| !s.is_empty()).collect()
        }
        Some(Value::String(s)) => {
            s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_arg_accepts_scalars() {
        let args = vec![Value::Int(5), Value::List(vec![])];
        assert_eq!(string_arg("F", &args, 0).unwrap(), "5");
        assert!(string_arg("F", &args, 1).is_err());
        assert_eq!(string_arg("F", &args, 2).unwrap(), "");
    }

    #[test]
    fn test_int_arg_parses_strings() {
        let args = vec![Value::from("42"), Value::from("x"), Value::Float(3.9)];
        assert_eq!(int_arg("F", &args, 0).unwrap(), 42);
        assert!(int_arg("F", &args, 1).is_err());
        assert_eq!(int_arg("F", &args, 2).unwrap(), 3);
    }

    #[test]
    fn test_string_list_arg_forms() {
        let list = vec![Value::from(vec!["a".to_string(), "b".to_string()])];
        assert_eq!(string_list_arg(&list, 0), vec!["a", "b"]);
        let csv = vec![Value::from("10.0.0.1, host.local,")];
        assert_eq!(string_list_arg(&csv, 0), vec!["10.0.0.1", "host.local"]);
        assert!(string_list_arg(&[], 0).is_empty());
    }

    #[test]
    fn test_arity() {
        assert!(check_arity("F", &[Value::Nil], 1, 2).is_ok());
        let err = check_arity("F", &[], 1, 1).unwrap_err();
        assert!(err.to_string().contains("want 1 got 0"));
    }
}
