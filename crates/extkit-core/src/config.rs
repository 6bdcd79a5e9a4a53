use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{descriptor::InitContext, version::has_numeric_component};

/// Scaffold defaults deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldConfig {
    pub extension_type: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub license: Option<String>,
    pub compatibility_ver_min: Option<String>,
    /// Pins the civix-format instead of using the registry head.
    pub civix_format: Option<String>,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            extension_type: "module".into(),
            author: None,
            email: None,
            license: None,
            compatibility_ver_min: None,
            civix_format: None,
        }
    }
}

impl ScaffoldConfig {
    /// Validates structural invariants and provides actionable error messages.
    pub fn validate(&self) -> Result<()> {
        if self.extension_type.trim().is_empty() {
            bail!("extension_type must not be empty");
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                bail!("email `{email}` is not an email address");
            }
        }
        if let Some(ver) = &self.compatibility_ver_min {
            if !has_numeric_component(ver) {
                bail!("compatibility_ver_min `{ver}` is not a version number");
            }
        }
        if let Some(format) = &self.civix_format {
            if !has_numeric_component(format) {
                bail!("civix_format `{format}` is not a version number");
            }
        }
        Ok(())
    }

    /// Fills fields the caller left unset; explicit values win.
    pub fn apply_defaults(&self, ctx: &mut InitContext) {
        if ctx.ext_type.is_empty() {
            ctx.ext_type = self.extension_type.clone();
        }
        fill(&mut ctx.author, &self.author);
        fill(&mut ctx.email, &self.email);
        fill(&mut ctx.license, &self.license);
        fill(&mut ctx.compatibility_ver_min, &self.compatibility_ver_min);
        fill(&mut ctx.civix_format, &self.civix_format);
    }
}

fn fill(slot: &mut Option<String>, default: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(default);
    }
}
