//! Core error types shared by the command line surface.
//!
//! - [`KotsError`] enumerates failures a user can act on
//! - [`ErrorContext`] adds details and a suggestion for display
//! - [`user_friendly_error`] turns any [`anyhow::Error`] into an [`ErrorContext`]
//! - [`FileOperationError`] records which file an IO failure happened on

pub mod error;
pub mod file_error;

pub use error::{ErrorContext, KotsError, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
