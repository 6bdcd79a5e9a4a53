//! Error types for manifest documents and extension descriptors.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result type for descriptor operations.
pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;

/// Failures raised by the structured-document layer.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input is not a well-formed document.
    #[error("malformed document at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// Serializing the tree failed.
    #[error("failed to serialize document: {message}")]
    Write { message: String },
}

/// Failures raised by [`crate::descriptor::ExtensionDescriptor`].
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A field that downstream code generation depends on is absent.
    #[error("failed to lookup {field} in info.xml")]
    MissingField { field: &'static str },

    /// A typeInfo key that cannot be written as an element name.
    #[error("typeInfo key `{0}` is not a valid XML element name")]
    InvalidTypeInfoKey(String),

    /// A compatibility query mode other than MIN or MAX.
    #[error("unrecognized compatibility mode `{0}` (expected MIN or MAX)")]
    InvalidMode(String),
}
