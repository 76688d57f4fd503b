//! Template error types.
//!
//! [`TemplateError`] covers everything that can go wrong while parsing or
//! executing a template. Messages use the `template: <name>:<line>:` prefix
//! so a failure can be traced back to the config item or document that
//! produced it. [`FuncError`] is what individual template functions return.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Malformed action, unbalanced block or unknown function.
    #[error("template: {name}:{line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },

    /// A template function returned an error.
    #[error("template: {name}:{line}: error calling {function}: {message}")]
    Call {
        name: String,
        line: usize,
        function: String,
        message: String,
    },

    /// Evaluation failed outside of a function, for example an undefined variable.
    #[error("template: {name}:{line}: {message}")]
    Exec {
        name: String,
        line: usize,
        message: String,
    },
}

impl TemplateError {
    /// Name of the template that failed.
    pub fn template_name(&self) -> &str {
        match self {
            TemplateError::Parse {
                name,
                ..
            }
            | TemplateError::Call {
                name,
                ..
            }
            | TemplateError::Exec {
                name,
                ..
            } => name,
        }
    }

    /// Multi-line description with a hint for the common causes.
    pub fn format_with_context(&self) -> String {
        let mut msg = String::new();
        match self {
            TemplateError::Parse {
                message,
                ..
            } => {
                msg.push_str("ERROR: Template Syntax Error\n\n");
                msg.push_str(&format!("{self}\n"));
                if message.contains("not defined") {
                    msg.push_str("\nSUGGESTION: Check the function name. Names are case sensitive.\n");
                } else {
                    msg.push_str("\nSUGGESTION: Check for unclosed {{repl }} actions or a missing {{repl end }}.\n");
                }
            }
            TemplateError::Call {
                function,
                ..
            } => {
                msg.push_str("ERROR: Template Function Failed\n\n");
                msg.push_str(&format!("{self}\n"));
                msg.push_str(&format!("\nSUGGESTION: Check the arguments passed to {function}.\n"));
            }
            TemplateError::Exec {
                ..
            } => {
                msg.push_str("ERROR: Template Execution Failed\n\n");
                msg.push_str(&format!("{self}\n"));
            }
        }
        msg
    }
}

/// Error returned by a template function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FuncError(pub String);

impl FuncError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Wrong number of arguments for `function`.
    pub fn arity(function: &str, expected: &str, got: usize) -> Self {
        Self(format!("wrong number of args for {function}: want {expected} got {got}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = TemplateError::Parse {
            name: "hostname".into(),
            line: 3,
            message: "unclosed action".into(),
        };
        assert_eq!(err.to_string(), "template: hostname:3: unclosed action");
        assert_eq!(err.template_name(), "hostname");
        assert!(err.format_with_context().contains("Template Syntax Error"));
    }

    #[test]
    fn test_arity_message() {
        let err = FuncError::arity("ToUpper", "1", 0);
        assert_eq!(err.to_string(), "wrong number of args for ToUpper: want 1 got 0");
    }
}
