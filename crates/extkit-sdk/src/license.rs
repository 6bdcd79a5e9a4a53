use serde::{Deserialize, Serialize};

/// A license as reported by a [`crate::LicenseLookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl License {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// Canonical URL written into the manifest's Licensing link.
    pub fn url(&self) -> &str {
        &self.url
    }
}
