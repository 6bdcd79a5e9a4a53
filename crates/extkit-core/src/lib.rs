pub mod config;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod registry;
pub mod version;

pub use descriptor::{ExtensionDescriptor, InitContext, LoadedContext, Manifest, VersionBound};
pub use error::{DescriptorError, DocumentError};

/// Returns the crate version baked in at compile time.
pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
