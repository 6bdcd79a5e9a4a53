pub mod license;

pub use license::License;

/// License metadata service queried while scaffolding a manifest.
pub trait LicenseLookup {
    /// Returns the license registered under `id`, or `None` when unknown.
    fn get(&self, id: &str) -> Option<License>;
}

/// Registry of civix-format identifiers known to the tooling.
pub trait FormatRegistry {
    /// The newest format identifier, used when a caller does not pin one.
    fn head_version(&self) -> String;
}
