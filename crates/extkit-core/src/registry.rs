//! Bundled implementations of the SDK collaborator traits.

use extkit_sdk::{FormatRegistry, License, LicenseLookup};

use crate::version::max_version;

/// Baseline civix-format for manifests written before mixins existed.
pub const FORMAT_PRE_MIXIN: &str = "13.10.0";
/// Baseline civix-format for manifests that declare a `<mixins>` section.
pub const FORMAT_MIXIN: &str = "22.05.0";

const KNOWN_LICENSES: &[(&str, &str, &str)] = &[
    (
        "AGPL-3.0",
        "GNU Affero General Public License v3.0",
        "https://www.gnu.org/licenses/agpl-3.0.html",
    ),
    (
        "GPL-2.0",
        "GNU General Public License v2.0",
        "https://www.gnu.org/licenses/old-licenses/gpl-2.0.html",
    ),
    (
        "GPL-3.0",
        "GNU General Public License v3.0",
        "https://www.gnu.org/licenses/gpl-3.0.html",
    ),
    (
        "LGPL-2.1",
        "GNU Lesser General Public License v2.1",
        "https://www.gnu.org/licenses/old-licenses/lgpl-2.1.html",
    ),
    (
        "LGPL-3.0",
        "GNU Lesser General Public License v3.0",
        "https://www.gnu.org/licenses/lgpl-3.0.html",
    ),
    ("MIT", "MIT License", "https://opensource.org/licenses/MIT"),
    (
        "Apache-2.0",
        "Apache License 2.0",
        "https://www.apache.org/licenses/LICENSE-2.0",
    ),
    (
        "BSD-2-Clause",
        "BSD 2-Clause \"Simplified\" License",
        "https://opensource.org/licenses/BSD-2-Clause",
    ),
    (
        "BSD-3-Clause",
        "BSD 3-Clause \"New\" or \"Revised\" License",
        "https://opensource.org/licenses/BSD-3-Clause",
    ),
    (
        "MPL-2.0",
        "Mozilla Public License 2.0",
        "https://www.mozilla.org/en-US/MPL/2.0/",
    ),
    (
        "EPL-2.0",
        "Eclipse Public License 2.0",
        "https://www.eclipse.org/legal/epl-2.0/",
    ),
    (
        "CC0-1.0",
        "Creative Commons Zero v1.0 Universal",
        "https://creativecommons.org/publicdomain/zero/1.0/",
    ),
    ("Unlicense", "The Unlicense", "https://unlicense.org/"),
];

const KNOWN_FORMATS: &[&str] = &[
    "13.10.0", "16.10.0", "17.10.0", "19.06.2", "20.06.0", "22.05.0", "22.05.2", "22.10.0",
    "23.01.0", "23.02.0", "23.02.1", "24.09.0", "24.09.1", "25.01.0",
];

/// In-memory table of common SPDX license identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseRepository;

impl LicenseRepository {
    pub fn new() -> Self {
        Self
    }
}

impl LicenseLookup for LicenseRepository {
    fn get(&self, id: &str) -> Option<License> {
        let base = base_license_id(id);
        KNOWN_LICENSES
            .iter()
            .find(|(known, _, _)| known.eq_ignore_ascii_case(base))
            .map(|(id, name, url)| License::new(*id, *name, *url))
    }
}

// `GPL-3.0-or-later`, `GPL-3.0-only` and `GPL-3.0+` share the base license URL.
fn base_license_id(id: &str) -> &str {
    let id = id.trim();
    ["-or-later", "-only", "+"]
        .iter()
        .find_map(|suffix| {
            let cut = id.len().checked_sub(suffix.len())?;
            let tail = id.get(cut..)?;
            tail.eq_ignore_ascii_case(suffix).then(|| &id[..cut])
        })
        .unwrap_or(id)
}

/// Known civix-format identifiers, in any order.
#[derive(Debug, Clone)]
pub struct UpgradeList {
    versions: Vec<String>,
}

impl Default for UpgradeList {
    fn default() -> Self {
        Self::with_versions(KNOWN_FORMATS.iter().copied())
    }
}

impl UpgradeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }
}

impl FormatRegistry for UpgradeList {
    /// Greatest known identifier; an empty list falls back to the oldest baseline.
    fn head_version(&self) -> String {
        max_version(self.versions.iter().map(String::as_str))
            .unwrap_or(FORMAT_PRE_MIXIN)
            .to_string()
    }
}
