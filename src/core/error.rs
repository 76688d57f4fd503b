//! Error handling for kots-render
//!
//! Library modules return their own `thiserror` enums ([`TemplateError`],
//! [`GraphError`], [`CryptoError`], [`ResolveError`]). The command line layer
//! works with [`anyhow::Error`] and converts failures into an [`ErrorContext`]
//! through [`user_friendly_error`] before printing them.
//!
//! [`KotsError`] covers the failures that only exist at that outer layer:
//! settings and document loading, encryption keys and required items.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kots_render::core::{KotsError, user_friendly_error};
//!
//! let error = anyhow::Error::from(KotsError::EncryptionKeyMissing);
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::resolver::{GraphError, ResolveError};
use crate::templating::TemplateError;

/// Failures reported by the command line surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KotsError {
    /// A file named on the command line does not exist
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path as given by the user
        path: String,
    },

    /// The settings file is not valid TOML or has unexpected fields
    #[error("Invalid settings file {file}: {reason}")]
    SettingsParseError {
        file: String,
        reason: String,
    },

    /// A YAML document could not be deserialized
    #[error("Failed to parse {file}: {reason}")]
    DocumentParseError {
        /// Path of the document
        file: String,
        /// Parser message
        reason: String,
    },

    /// The document's `apiVersion` is not a kots.io version
    #[error("Unsupported apiVersion '{api_version}' in {file}")]
    UnsupportedApiVersion {
        file: String,
        api_version: String,
    },

    /// The document has the wrong `kind`
    #[error("Expected kind '{expected}' in {file}, found '{found}'")]
    UnexpectedKind {
        file: String,
        expected: String,
        found: String,
    },

    /// A command needs the cipher but no key is configured
    #[error("No encryption key configured")]
    EncryptionKeyMissing,

    /// The configured key string cannot be used
    #[error("Invalid encryption key: {reason}")]
    InvalidEncryptionKey {
        reason: String,
    },

    /// Required items have neither a value nor a default
    #[error("Required config items have no value: {}", .items.join(", "))]
    RequiredItemsMissing {
        items: Vec<String>,
    },

    /// A config item or document failed to render
    #[error("Failed to render '{name}': {reason}")]
    RenderFailed {
        /// Item name or document path
        name: String,
        reason: String,
    },

    /// Config items depend on each other in a loop
    #[error("{message}")]
    DependencyLoop {
        message: String,
    },

    /// File system operation failed
    #[error("File system error: {operation} for path: {path}")]
    FileSystemError {
        operation: String,
        path: String,
    },

    /// Permission denied for an operation
    #[error("Permission denied: {operation} for path: {path}")]
    PermissionDenied {
        operation: String,
        path: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        message: String,
    },
}

/// A [`KotsError`] with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: KotsError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: KotsError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add background on the failure, shown in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Recognizes [`KotsError`], the library error enums, IO errors and TOML
/// errors anywhere in the chain. Anything else is reported with its full
/// cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(kots_error) = cause.downcast_ref::<KotsError>() {
            return create_error_context(kots_error.clone());
        }

        if let Some(resolve_error) = cause.downcast_ref::<ResolveError>() {
            return match resolve_error {
                ResolveError::Render {
                    item,
                    source,
                } => template_error_context(item, source),
                ResolveError::Graph(graph_error) => graph_error_context(graph_error),
            };
        }

        if let Some(graph_error) = cause.downcast_ref::<GraphError>() {
            return graph_error_context(graph_error);
        }

        if let Some(template_error) = cause.downcast_ref::<TemplateError>() {
            return template_error_context(template_error.template_name(), template_error);
        }

        if let Some(crypto_error) = cause.downcast_ref::<CryptoError>() {
            return ErrorContext::new(KotsError::InvalidEncryptionKey {
                reason: crypto_error.to_string(),
            })
            .with_suggestion(
                "Check that the encryption key matches the one used to encrypt the stored values",
            );
        }

        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            match io_error.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    return ErrorContext::new(KotsError::PermissionDenied {
                        operation: "file access".to_string(),
                        path: "unknown".to_string(),
                    })
                    .with_suggestion("Check file ownership and permissions")
                    .with_details(error_chain_message(&error));
                }
                std::io::ErrorKind::NotFound => {
                    return ErrorContext::new(KotsError::FileSystemError {
                        operation: "file access".to_string(),
                        path: "unknown".to_string(),
                    })
                    .with_suggestion(
                        "Check that the file or directory exists and the path is correct",
                    )
                    .with_details(error_chain_message(&error));
                }
                _ => {}
            }
        }

        if let Some(toml_error) = cause.downcast_ref::<toml::de::Error>() {
            return ErrorContext::new(KotsError::SettingsParseError {
                file: "settings".to_string(),
                reason: toml_error.to_string(),
            })
            .with_suggestion("Check the TOML syntax: quotes, brackets and table headers");
        }
    }

    ErrorContext::new(KotsError::Other {
        message: error_chain_message(&error),
    })
}

fn error_chain_message(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

fn template_error_context(name: &str, error: &TemplateError) -> ErrorContext {
    ErrorContext::new(KotsError::RenderFailed {
        name: name.to_string(),
        reason: error.to_string(),
    })
    .with_suggestion(
        "Check the template syntax: actions use {{repl ... }} or repl{{ ... }}, \
         functions are called as `Name arg1 arg2` and names are case-sensitive",
    )
}

fn graph_error_context(error: &GraphError) -> ErrorContext {
    ErrorContext::new(KotsError::DependencyLoop {
        message: error.to_string(),
    })
    .with_suggestion("Remove the ConfigOption reference that closes the loop")
    .with_details("An item cannot read itself, directly or through other items")
}

fn create_error_context(error: KotsError) -> ErrorContext {
    match &error {
        KotsError::FileNotFound {
            path,
        } => {
            let suggestion = format!("Check that '{path}' exists and the path is correct");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        KotsError::SettingsParseError {
            file, ..
        } => {
            let suggestion = format!(
                "Check the TOML syntax in {file}. Known keys: namespace, encryption_key, [version], [identity], [kurl]"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        KotsError::DocumentParseError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the YAML indentation and that every field has the expected type"),

        KotsError::UnsupportedApiVersion {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use an apiVersion starting with kots.io/, for example kots.io/v1beta1"),

        KotsError::UnexpectedKind {
            expected, ..
        } => {
            let suggestion = format!("Pass a document with `kind: {expected}`");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        KotsError::EncryptionKeyMissing => ErrorContext::new(error)
            .with_suggestion(
                "Set KOTS_RENDER_ENCRYPTION_KEY or add encryption_key to the settings file. \
                 Run 'kots-render keygen' to create one",
            )
            .with_details("Password items are stored encrypted and need the key to be read"),

        KotsError::InvalidEncryptionKey {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("The key must be the base64 string printed by 'kots-render keygen'"),

        KotsError::RequiredItemsMissing {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Supply values for these items in the ConfigValues file, or pass --skip-required",
        ),

        KotsError::DependencyLoop {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove the ConfigOption reference that closes the loop"),

        KotsError::PermissionDenied {
            ..
        } => ErrorContext::new(error).with_suggestion("Check file ownership and permissions"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = KotsError::RequiredItemsMissing {
            items: vec!["hostname".into(), "port".into()],
        };
        assert_eq!(error.to_string(), "Required config items have no value: hostname, port");

        let error = KotsError::UnexpectedKind {
            file: "config.yaml".into(),
            expected: "Config".into(),
            found: "License".into(),
        };
        assert_eq!(error.to_string(), "Expected kind 'Config' in config.yaml, found 'License'");
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(KotsError::EncryptionKeyMissing)
            .with_suggestion("run keygen")
            .with_details("needed for passwords");
        let text = ctx.to_string();
        assert!(text.contains("No encryption key configured"));
        assert!(text.contains("Details: needed for passwords"));
        assert!(text.contains("Suggestion: run keygen"));
    }

    #[test]
    fn test_user_friendly_kots_error() {
        let ctx = user_friendly_error(KotsError::EncryptionKeyMissing.into());
        assert_eq!(ctx.error, KotsError::EncryptionKeyMissing);
        assert!(ctx.suggestion.unwrap().contains("keygen"));
    }

    #[test]
    fn test_user_friendly_graph_error_through_context() {
        let graph_error = GraphError::DependencyLoop {
            waiting: vec![("a".into(), vec!["b".into()])],
        };
        let error = anyhow::Error::from(ResolveError::from(graph_error)).context("resolving");
        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, KotsError::DependencyLoop { .. }));
        assert!(ctx.error.to_string().contains(r#""a" depends on "b""#));
    }

    #[test]
    fn test_user_friendly_generic_keeps_chain() {
        let error = anyhow::anyhow!("inner").context("outer");
        let ctx = user_friendly_error(error);
        let KotsError::Other {
            message,
        } = ctx.error
        else {
            panic!("expected Other");
        };
        assert!(message.contains("outer"));
        assert!(message.contains("1: inner"));
    }
}
