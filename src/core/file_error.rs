//! File operation errors that carry the path and purpose of the access.
//!
//! The context is captured where the file is touched, so the message can
//! say which document failed to load instead of a bare "No such file".

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

/// An IO failure with the file it happened on.
#[derive(Error, Debug)]
#[error("Failed {operation} '{}' ({purpose})", file_path.display())]
pub struct FileOperationError {
    pub operation: FileOperation,
    pub file_path: PathBuf,
    /// Why the file was being accessed, e.g. "config document"
    pub purpose: String,
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// Message with a hint derived from the IO error kind.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        match self.source.kind() {
            std::io::ErrorKind::NotFound => {
                message.push_str("\n\nThe file does not exist at the specified path.");
            }
            std::io::ErrorKind::PermissionDenied => {
                message.push_str(&format!(
                    "\n\nPermission denied. Check file/directory permissions for: {}",
                    self.file_path.display()
                ));
            }
            std::io::ErrorKind::InvalidData => {
                message.push_str("\n\nThe file is not valid UTF-8 text.");
            }
            _ => {
                message.push_str(&format!("\n\nError details: {}", self.source));
            }
        }
        message
    }
}

/// Attach file context to an IO result.
pub trait FileResultExt<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            source,
        })
    }
}

pub fn read_to_string(path: &Path, purpose: &str) -> Result<String, FileOperationError> {
    std::fs::read_to_string(path).with_file_context(FileOperation::Read, path, purpose)
}

/// Write `contents`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &str, purpose: &str) -> Result<(), FileOperationError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_file_context(
            FileOperation::CreateDir,
            parent,
            purpose,
        )?;
    }
    std::fs::write(path, contents).with_file_context(FileOperation::Write, path, purpose)
}
