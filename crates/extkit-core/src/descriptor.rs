//! The `info.xml` extension descriptor.
//!
//! [`ExtensionDescriptor`] owns the persisted [`Document`] together with a
//! typed [`Manifest`] parsed from it. Nodes the manifest does not model are
//! left untouched in the document and survive a save.

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use chrono::{Local, NaiveDate};
use extkit_sdk::{FormatRegistry, LicenseLookup};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    document::{is_valid_name, Document, Element},
    error::{DescriptorError, Result},
    registry::{FORMAT_MIXIN, FORMAT_PRE_MIXIN},
    version::sort_versions,
};

/// Placeholder written for human-facing fields nobody has filled in yet.
pub const PLACEHOLDER: &str = "FIXME";
pub const PLACEHOLDER_EMAIL: &str = "FIXME@example.com";
pub const PLACEHOLDER_URL: &str = "http://FIXME";
pub const DEFAULT_COMPATIBILITY_MIN: &str = "5.0";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_DEVEL_STAGE: &str = "alpha";
pub const DEFAULT_COMMENTS: &str = "This is a new, undeveloped module";
pub const CLASSLOADER_PREFIX: &str = "Civi\\";
pub const CLASSLOADER_PATH: &str = "Civi";

pub const URL_MAIN: &str = "Main Extension Page";
pub const URL_DOCUMENTATION: &str = "Documentation";
pub const URL_SUPPORT: &str = "Support";
pub const URL_LICENSING: &str = "Licensing";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Maintainer {
    pub author: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionUrl {
    pub href: String,
    pub desc: String,
}

/// A namespace-prefix to directory mapping, e.g. `<psr4 prefix="Civi\" path="Civi"/>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassloaderRule {
    pub kind: String,
    pub prefix: String,
    pub path: String,
}

/// Tooling metadata kept under `<civix>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CivixMeta {
    pub namespace: Option<String>,
    pub format: Option<String>,
    pub angular_module: Option<String>,
}

/// Typed view of an `info.xml` manifest.
///
/// Text fields that are absent on disk read as empty strings; `Option`
/// fields distinguish a missing node from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub key: String,
    #[serde(rename = "type")]
    pub ext_type: String,
    pub main_file: String,
    pub name: String,
    pub description: String,
    pub license: Option<String>,
    pub maintainer: Maintainer,
    pub urls: Vec<ExtensionUrl>,
    pub release_date: String,
    pub version: String,
    pub devel_stage: String,
    pub compatibility: Vec<String>,
    pub comments: String,
    pub classloader: Vec<ClassloaderRule>,
    pub civix: CivixMeta,
    pub mixins: Option<Vec<String>>,
    pub type_info: Option<Vec<(String, String)>>,
}

impl Manifest {
    pub fn from_document(document: &Document) -> Self {
        let root = document.root();
        let text = |path: &str| root.find(path).map(value);

        Self {
            key: root.attr("key").unwrap_or_default().to_string(),
            ext_type: root.attr("type").unwrap_or_default().to_string(),
            main_file: text("file").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            license: text("license"),
            maintainer: Maintainer {
                author: text("maintainer/author").unwrap_or_default(),
                email: text("maintainer/email").unwrap_or_default(),
            },
            urls: root
                .find_all("urls/url")
                .into_iter()
                .map(|url| ExtensionUrl {
                    href: value(url),
                    desc: url.attr("desc").unwrap_or_default().to_string(),
                })
                .collect(),
            release_date: text("releaseDate").unwrap_or_default(),
            version: text("version").unwrap_or_default(),
            devel_stage: text("develStage").unwrap_or_default(),
            compatibility: root
                .find_all("compatibility/ver")
                .into_iter()
                .map(value)
                .collect(),
            comments: text("comments").unwrap_or_default(),
            classloader: root
                .find_all("classloader")
                .into_iter()
                .flat_map(|classloader| classloader.children())
                .map(|rule| ClassloaderRule {
                    kind: rule.name().to_string(),
                    prefix: rule.attr("prefix").unwrap_or_default().to_string(),
                    path: rule.attr("path").unwrap_or_default().to_string(),
                })
                .collect(),
            civix: CivixMeta {
                namespace: text("civix/namespace"),
                format: text("civix/format"),
                angular_module: text("civix/angularModule"),
            },
            mixins: root.child("mixins").map(|mixins| {
                mixins
                    .children_named("mixin")
                    .map(value)
                    .collect()
            }),
            type_info: root.child("typeInfo").map(|info| {
                info.children()
                    .map(|entry| (entry.name().to_string(), value(entry)))
                    .collect()
            }),
        }
    }

    /// Renders the manifest as an `<extension>` tree in canonical element order.
    pub fn to_document(&self) -> Document {
        let mut root = Element::new("extension")
            .with_attr("key", &self.key)
            .with_attr("type", &self.ext_type);
        root.push_child(Element::new("file").with_text(&self.main_file));
        root.push_child(Element::new("name").with_text(&self.name));
        root.push_child(Element::new("description").with_text(&self.description));
        if let Some(license) = &self.license {
            root.push_child(Element::new("license").with_text(license));
        }

        let maintainer = root.push_child(Element::new("maintainer"));
        maintainer.push_child(Element::new("author").with_text(&self.maintainer.author));
        maintainer.push_child(Element::new("email").with_text(&self.maintainer.email));

        let urls = root.push_child(Element::new("urls"));
        for url in &self.urls {
            urls.push_child(
                Element::new("url")
                    .with_attr("desc", &url.desc)
                    .with_text(&url.href),
            );
        }

        root.push_child(Element::new("releaseDate").with_text(&self.release_date));
        root.push_child(Element::new("version").with_text(&self.version));
        root.push_child(Element::new("develStage").with_text(&self.devel_stage));
        let compatibility = root.push_child(Element::new("compatibility"));
        for ver in &self.compatibility {
            compatibility.push_child(Element::new("ver").with_text(ver));
        }
        root.push_child(Element::new("comments").with_text(&self.comments));

        let classloader = root.push_child(Element::new("classloader"));
        for rule in &self.classloader {
            classloader.push_child(
                Element::new(&rule.kind)
                    .with_attr("prefix", &rule.prefix)
                    .with_attr("path", &rule.path),
            );
        }

        let civix = root.push_child(Element::new("civix"));
        if let Some(namespace) = &self.civix.namespace {
            civix.push_child(Element::new("namespace").with_text(namespace));
        }
        if let Some(format) = &self.civix.format {
            civix.push_child(Element::new("format").with_text(format));
        }
        if let Some(module) = &self.civix.angular_module {
            civix.push_child(Element::new("angularModule").with_text(module));
        }

        if let Some(mixins) = &self.mixins {
            let node = root.push_child(Element::new("mixins"));
            for mixin in mixins {
                node.push_child(Element::new("mixin").with_text(mixin));
            }
        }

        if let Some(type_info) = &self.type_info {
            let node = root.push_child(Element::new("typeInfo"));
            for (key, value) in type_info {
                node.push_child(Element::new(key).with_text(value));
            }
        }

        Document::new(root)
    }
}

// Leaf values are trimmed; hand-edited manifests often wrap them in whitespace.
fn value(element: &Element) -> String {
    element.text().trim().to_string()
}

/// Inputs for scaffolding a new manifest.
#[derive(Debug, Clone, Default)]
pub struct InitContext {
    pub full_name: String,
    pub ext_type: String,
    pub main_file: String,
    pub license: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub compatibility_ver_min: Option<String>,
    pub namespace: Option<String>,
    pub civix_format: Option<String>,
    pub angular_module_name: Option<String>,
    pub type_info: Option<BTreeMap<String, String>>,
    /// Defaults to today in local time.
    pub release_date: Option<NaiveDate>,
}

impl InitContext {
    pub fn new(
        full_name: impl Into<String>,
        ext_type: impl Into<String>,
        main_file: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            ext_type: ext_type.into(),
            main_file: main_file.into(),
            ..Self::default()
        }
    }
}

/// Working fields extracted from an existing manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadedContext {
    pub full_name: String,
    #[serde(rename = "type")]
    pub ext_type: String,
    pub main_file: String,
    pub namespace: String,
    pub angular_module_name: String,
    pub civix_format: String,
    pub compatibility_ver_min: Option<String>,
    pub compatibility_ver_max: Option<String>,
}

/// Which end of the compatibility range to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBound {
    Min,
    Max,
}

impl FromStr for VersionBound {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("min") {
            Ok(Self::Min)
        } else if s.eq_ignore_ascii_case("max") {
            Ok(Self::Max)
        } else {
            Err(DescriptorError::InvalidMode(s.to_string()))
        }
    }
}

impl fmt::Display for VersionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    document: Document,
    manifest: Manifest,
}

impl ExtensionDescriptor {
    /// Builds a fresh in-memory manifest. Nothing is written to disk.
    ///
    /// Fails only when a `type_info` key cannot be used as an element name.
    pub fn initialize(
        ctx: &InitContext,
        licenses: &dyn LicenseLookup,
        formats: &dyn FormatRegistry,
    ) -> Result<Self> {
        if let Some(key) = ctx
            .type_info
            .iter()
            .flat_map(|info| info.keys())
            .find(|key| !is_valid_name(key))
        {
            return Err(DescriptorError::InvalidTypeInfoKey(key.clone()));
        }

        let licensing_url = match ctx.license.as_deref() {
            Some(id) => match licenses.get(id) {
                Some(license) => license.url().to_string(),
                None => {
                    warn!(license = %id, "unknown license; Licensing url left as placeholder");
                    PLACEHOLDER_URL.to_string()
                }
            },
            None => PLACEHOLDER_URL.to_string(),
        };

        let mut urls: Vec<ExtensionUrl> = [URL_MAIN, URL_DOCUMENTATION, URL_SUPPORT]
            .into_iter()
            .map(|desc| ExtensionUrl {
                href: PLACEHOLDER_URL.to_string(),
                desc: desc.to_string(),
            })
            .collect();
        urls.push(ExtensionUrl {
            href: licensing_url,
            desc: URL_LICENSING.to_string(),
        });

        let format = ctx
            .civix_format
            .clone()
            .unwrap_or_else(|| formats.head_version());
        let release_date = ctx.release_date.unwrap_or_else(|| Local::now().date_naive());

        let manifest = Manifest {
            key: ctx.full_name.clone(),
            ext_type: ctx.ext_type.clone(),
            main_file: ctx.main_file.clone(),
            name: PLACEHOLDER.to_string(),
            description: PLACEHOLDER.to_string(),
            license: Some(ctx.license.clone().unwrap_or_else(|| PLACEHOLDER.to_string())),
            maintainer: Maintainer {
                author: ctx.author.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
                email: ctx
                    .email
                    .clone()
                    .unwrap_or_else(|| PLACEHOLDER_EMAIL.to_string()),
            },
            urls,
            release_date: release_date.format("%Y-%m-%d").to_string(),
            version: DEFAULT_VERSION.to_string(),
            devel_stage: DEFAULT_DEVEL_STAGE.to_string(),
            compatibility: vec![ctx
                .compatibility_ver_min
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPATIBILITY_MIN.to_string())],
            comments: DEFAULT_COMMENTS.to_string(),
            classloader: vec![ClassloaderRule {
                kind: "psr4".to_string(),
                prefix: CLASSLOADER_PREFIX.to_string(),
                path: CLASSLOADER_PATH.to_string(),
            }],
            civix: CivixMeta {
                namespace: ctx.namespace.clone(),
                format: Some(format),
                angular_module: ctx.angular_module_name.clone(),
            },
            mixins: None,
            type_info: ctx
                .type_info
                .as_ref()
                .map(|info| info.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        };

        debug!(
            key = %manifest.key,
            ext_type = %manifest.ext_type,
            format = manifest.civix.format.as_deref().unwrap_or_default(),
            "initialized extension manifest"
        );
        Ok(Self {
            document: manifest.to_document(),
            manifest,
        })
    }

    /// Reads and parses a persisted manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::load(path)?;
        debug!(path = %path.display(), "loaded extension manifest");
        Ok(Self::from_document(document))
    }

    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self::from_document(Document::parse(input)?))
    }

    pub fn from_document(document: Document) -> Self {
        let manifest = Manifest::from_document(&document);
        Self { document, manifest }
    }

    /// Extracts the working fields a scaffolding run needs from this manifest.
    ///
    /// Missing optional nodes resolve to empty strings. An empty or missing
    /// `civix/angularModule` falls back to the main file name.
    pub fn context(&self) -> LoadedContext {
        let civix = &self.manifest.civix;
        let angular_module_name = civix
            .angular_module
            .clone()
            .filter(|module| !module.is_empty())
            .unwrap_or_else(|| self.manifest.main_file.clone());

        LoadedContext {
            full_name: self.manifest.key.clone(),
            ext_type: self.manifest.ext_type.clone(),
            main_file: self.manifest.main_file.clone(),
            namespace: civix.namespace.clone().unwrap_or_default(),
            angular_module_name,
            civix_format: civix.format.clone().unwrap_or_default(),
            compatibility_ver_min: self.compatibility_version(VersionBound::Min).map(String::from),
            compatibility_ver_max: self.compatibility_version(VersionBound::Max).map(String::from),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.document.save(path)?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        Ok(self.document.to_xml_string()?)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Edits the underlying tree in place and re-derives the typed manifest.
    pub fn edit<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Element),
    {
        f(self.document.root_mut());
        self.manifest = Manifest::from_document(&self.document);
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The extension's full name, e.g. `org.example.myextension`.
    pub fn key(&self) -> &str {
        &self.manifest.key
    }

    /// Short name of the main file.
    pub fn file(&self) -> &str {
        &self.manifest.main_file
    }

    /// Extension type, e.g. `module` or `report`.
    pub fn ext_type(&self) -> &str {
        &self.manifest.ext_type
    }

    pub fn extension_name(&self) -> &str {
        if self.manifest.name.is_empty() {
            PLACEHOLDER
        } else {
            &self.manifest.name
        }
    }

    /// Namespace into which generated code is placed.
    ///
    /// Unlike [`Self::context`], a missing or empty `civix/namespace` is an error.
    pub fn namespace(&self) -> Result<&str> {
        self.manifest
            .civix
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .ok_or(DescriptorError::MissingField {
                field: "civix/namespace",
            })
    }

    /// Lowest or highest declared `<ver>`, or `None` when there are none.
    pub fn compatibility_version(&self, bound: VersionBound) -> Option<&str> {
        let mut versions: Vec<&str> = self
            .manifest
            .compatibility
            .iter()
            .map(String::as_str)
            .collect();
        sort_versions(&mut versions);
        match bound {
            VersionBound::Min => versions.first().copied(),
            VersionBound::Max => versions.last().copied(),
        }
    }

    /// Explicit `civix/format`, or a guess based on whether `<mixins>` exists.
    pub fn detect_format(&self) -> &str {
        if let Some(format) = self.manifest.civix.format.as_deref() {
            if !format.is_empty() {
                return format;
            }
        }
        let guess = if self.manifest.mixins.is_some() {
            FORMAT_MIXIN
        } else {
            FORMAT_PRE_MIXIN
        };
        warn!(
            key = %self.manifest.key,
            format = guess,
            "no civix/format declared; guessed from mixins"
        );
        guess
    }
}

#[cfg(test)]
mod tests {
    use extkit_sdk::License;

    use super::*;
    use crate::registry::{LicenseRepository, UpgradeList};

    struct FixedFormat(&'static str);

    impl FormatRegistry for FixedFormat {
        fn head_version(&self) -> String {
            self.0.to_string()
        }
    }

    struct NoLicenses;

    impl LicenseLookup for NoLicenses {
        fn get(&self, _id: &str) -> Option<License> {
            None
        }
    }

    fn context() -> InitContext {
        let mut ctx = InitContext::new("org.example.myext", "module", "myext");
        ctx.release_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        ctx
    }

    fn init(ctx: &InitContext) -> ExtensionDescriptor {
        ExtensionDescriptor::initialize(ctx, &LicenseRepository::new(), &FixedFormat("24.09.1"))
            .unwrap()
    }

    fn manifest_with(body: &str) -> ExtensionDescriptor {
        ExtensionDescriptor::parse(&format!(
            r#"<extension key="org.example.myext" type="module"><file>myext</file>{body}</extension>"#
        ))
        .unwrap()
    }

    fn licensing_url(descriptor: &ExtensionDescriptor) -> &str {
        descriptor
            .manifest()
            .urls
            .iter()
            .find(|url| url.desc == URL_LICENSING)
            .map(|url| url.href.as_str())
            .unwrap()
    }

    #[test]
    fn initialize_exposes_identity_fields() {
        let descriptor = init(&context());
        assert_eq!(descriptor.key(), "org.example.myext");
        assert_eq!(descriptor.file(), "myext");
        assert_eq!(descriptor.ext_type(), "module");
    }

    #[test]
    fn initialize_fills_placeholders() {
        let descriptor = init(&context());
        let manifest = descriptor.manifest();
        assert_eq!(descriptor.extension_name(), PLACEHOLDER);
        assert_eq!(manifest.description, PLACEHOLDER);
        assert_eq!(manifest.license.as_deref(), Some(PLACEHOLDER));
        assert_eq!(manifest.maintainer.author, PLACEHOLDER);
        assert_eq!(manifest.maintainer.email, PLACEHOLDER_EMAIL);
        assert_eq!(manifest.release_date, "2024-03-01");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.devel_stage, "alpha");
        assert_eq!(manifest.compatibility, ["5.0"]);
        assert_eq!(manifest.civix.format.as_deref(), Some("24.09.1"));
        assert!(manifest.civix.namespace.is_none());
        assert!(manifest.type_info.is_none());
        assert_eq!(
            manifest.classloader,
            [ClassloaderRule {
                kind: "psr4".into(),
                prefix: "Civi\\".into(),
                path: "Civi".into(),
            }]
        );
        let descs: Vec<_> = manifest.urls.iter().map(|u| u.desc.as_str()).collect();
        assert_eq!(descs, [URL_MAIN, URL_DOCUMENTATION, URL_SUPPORT, URL_LICENSING]);
        assert_eq!(licensing_url(&descriptor), PLACEHOLDER_URL);
    }

    #[test]
    fn initialize_honours_optional_fields() {
        let mut ctx = context();
        ctx.author = Some("Jane Doe".into());
        ctx.email = Some("jane@example.org".into());
        ctx.compatibility_ver_min = Some("5.75".into());
        ctx.namespace = Some("CRM/Myext".into());
        ctx.civix_format = Some("23.02.0".into());
        ctx.angular_module_name = Some("myextUi".into());
        ctx.type_info = Some(BTreeMap::from([
            ("reportUrl".to_string(), "civicrm/report/myext".to_string()),
            ("component".to_string(), "CiviContribute".to_string()),
        ]));

        let descriptor = init(&ctx);
        let manifest = descriptor.manifest();
        assert_eq!(manifest.maintainer.author, "Jane Doe");
        assert_eq!(manifest.maintainer.email, "jane@example.org");
        assert_eq!(manifest.compatibility, ["5.75"]);
        assert_eq!(descriptor.namespace().unwrap(), "CRM/Myext");
        assert_eq!(descriptor.detect_format(), "23.02.0");
        assert_eq!(manifest.civix.angular_module.as_deref(), Some("myextUi"));
        assert_eq!(
            manifest.type_info.as_deref(),
            Some(
                &[
                    ("component".to_string(), "CiviContribute".to_string()),
                    ("reportUrl".to_string(), "civicrm/report/myext".to_string()),
                ][..]
            )
        );
    }

    #[test]
    fn known_license_resolves_licensing_url() {
        let mut ctx = context();
        ctx.license = Some("AGPL-3.0".into());
        let descriptor = init(&ctx);
        assert_eq!(descriptor.manifest().license.as_deref(), Some("AGPL-3.0"));
        assert_eq!(
            licensing_url(&descriptor),
            "https://www.gnu.org/licenses/agpl-3.0.html"
        );
    }

    #[test]
    fn unknown_license_keeps_placeholder_url() {
        let mut ctx = context();
        ctx.license = Some("AGPL-3.0".into());
        let descriptor =
            ExtensionDescriptor::initialize(&ctx, &NoLicenses, &UpgradeList::new()).unwrap();
        assert_eq!(descriptor.manifest().license.as_deref(), Some("AGPL-3.0"));
        assert_eq!(licensing_url(&descriptor), PLACEHOLDER_URL);
    }

    #[test]
    fn format_defaults_to_registry_head() {
        let descriptor =
            ExtensionDescriptor::initialize(&context(), &NoLicenses, &UpgradeList::new()).unwrap();
        assert_eq!(descriptor.detect_format(), UpgradeList::new().head_version());
    }

    #[test]
    fn initialized_document_matches_manifest() {
        let descriptor = init(&context());
        let reparsed = ExtensionDescriptor::parse(&descriptor.to_xml_string().unwrap()).unwrap();
        assert_eq!(reparsed.manifest(), descriptor.manifest());
    }

    #[test]
    fn compatibility_range_uses_numeric_ordering() {
        let descriptor = manifest_with(
            "<compatibility><ver>5.2</ver><ver>5.10</ver><ver>5.9</ver></compatibility>",
        );
        assert_eq!(descriptor.compatibility_version(VersionBound::Min), Some("5.2"));
        assert_eq!(descriptor.compatibility_version(VersionBound::Max), Some("5.10"));
    }

    #[test]
    fn compatibility_range_ranks_words_below_numbers() {
        let descriptor =
            manifest_with("<compatibility><ver>5.x</ver><ver>5.1</ver></compatibility>");
        assert_eq!(descriptor.compatibility_version(VersionBound::Min), Some("5.x"));
        assert_eq!(descriptor.compatibility_version(VersionBound::Max), Some("5.1"));
    }

    #[test]
    fn compatibility_range_is_absent_without_versions() {
        for body in ["", "<compatibility/>"] {
            let descriptor = manifest_with(body);
            assert_eq!(descriptor.compatibility_version(VersionBound::Min), None);
            assert_eq!(descriptor.compatibility_version(VersionBound::Max), None);
        }
    }

    #[test]
    fn version_bound_parses_known_modes_only() {
        assert_eq!("MIN".parse::<VersionBound>().unwrap(), VersionBound::Min);
        assert_eq!("max".parse::<VersionBound>().unwrap(), VersionBound::Max);
        let err = "MEDIAN".parse::<VersionBound>().unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidMode(mode) if mode == "MEDIAN"));
    }

    #[test]
    fn context_falls_back_to_main_file_for_angular_module() {
        for body in [
            "<civix><angularModule></angularModule></civix>",
            "<civix><angularModule/></civix>",
            "",
        ] {
            let ctx = manifest_with(body).context();
            assert_eq!(ctx.angular_module_name, "myext");
        }
        let ctx = manifest_with("<civix><angularModule>crmMyext</angularModule></civix>").context();
        assert_eq!(ctx.angular_module_name, "crmMyext");
    }

    #[test]
    fn context_extracts_working_fields() {
        let ctx = manifest_with(
            "<compatibility><ver>5.45</ver><ver>5.38</ver></compatibility>\
             <civix><namespace>CRM/Myext</namespace><format>23.02.1</format></civix>",
        )
        .context();
        assert_eq!(
            ctx,
            LoadedContext {
                full_name: "org.example.myext".into(),
                ext_type: "module".into(),
                main_file: "myext".into(),
                namespace: "CRM/Myext".into(),
                angular_module_name: "myext".into(),
                civix_format: "23.02.1".into(),
                compatibility_ver_min: Some("5.38".into()),
                compatibility_ver_max: Some("5.45".into()),
            }
        );
    }

    #[test]
    fn missing_namespace_is_an_error_only_for_the_accessor() {
        let descriptor = manifest_with("<civix><format>22.05.0</format></civix>");
        let err = descriptor.namespace().unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingField { field: "civix/namespace" }
        ));
        assert_eq!(err.to_string(), "failed to lookup civix/namespace in info.xml");
        assert_eq!(descriptor.context().namespace, "");

        let empty = manifest_with("<civix><namespace/></civix>");
        assert!(empty.namespace().is_err());
    }

    #[test]
    fn detect_format_prefers_explicit_value() {
        let descriptor = manifest_with("<civix><format>24.01.0</format></civix><mixins/>");
        assert_eq!(descriptor.detect_format(), "24.01.0");
        let descriptor = manifest_with("<civix><format>24.01.0</format></civix>");
        assert_eq!(descriptor.detect_format(), "24.01.0");
    }

    #[test]
    fn detect_format_guesses_from_mixins() {
        assert_eq!(manifest_with("").detect_format(), FORMAT_PRE_MIXIN);
        assert_eq!(
            manifest_with("<civix><format></format></civix>").detect_format(),
            FORMAT_PRE_MIXIN
        );
        assert_eq!(manifest_with("<mixins/>").detect_format(), FORMAT_MIXIN);
        assert_eq!(
            manifest_with("<mixins><mixin>menu-xml@1.0.0</mixin></mixins>").detect_format(),
            FORMAT_MIXIN
        );
    }

    #[test]
    fn extension_name_placeholder_when_empty() {
        assert_eq!(manifest_with("<name></name>").extension_name(), PLACEHOLDER);
        assert_eq!(manifest_with("<name>My Ext</name>").extension_name(), "My Ext");
    }

    #[test]
    fn invalid_type_info_key_is_rejected() {
        let mut ctx = context();
        ctx.type_info = Some(BTreeMap::from([("report url".to_string(), "a".to_string())]));
        let err = ExtensionDescriptor::initialize(&ctx, &NoLicenses, &FixedFormat("24.09.1"))
            .unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidTypeInfoKey(key) if key == "report url"));
    }

    #[test]
    fn mixed_content_description_keeps_its_words() {
        let descriptor = manifest_with(
            "<description>Provides <b>bold</b> features</description><!-- keep me -->",
        );
        assert_eq!(descriptor.manifest().description, "Provides  features");
        let xml = descriptor.to_xml_string().unwrap();
        assert!(xml.contains("<description>Provides <b>bold</b> features</description>"));
        assert!(xml.contains("<!-- keep me -->"));
    }

    #[test]
    fn leaf_values_are_trimmed() {
        let descriptor = manifest_with("<compatibility><ver>\n  5.45\n</ver></compatibility>");
        assert_eq!(descriptor.compatibility_version(VersionBound::Min), Some("5.45"));
    }

    #[test]
    fn edit_refreshes_manifest_and_persists() {
        let mut descriptor = manifest_with("<civix><namespace>CRM/Myext</namespace></civix>");
        assert_eq!(descriptor.detect_format(), FORMAT_PRE_MIXIN);

        descriptor.edit(|root| {
            root.push_child(Element::new("mixins"))
                .push_child(Element::new("mixin").with_text("menu-xml@1.0.0"));
            if let Some(civix) = root.child_mut("civix") {
                civix.push_child(Element::new("format").with_text("23.02.1"));
            }
        });

        let manifest = descriptor.manifest();
        assert_eq!(manifest.mixins.as_deref(), Some(&["menu-xml@1.0.0".to_string()][..]));
        assert_eq!(descriptor.detect_format(), "23.02.1");
        assert!(descriptor.document().root().find("mixins/mixin").is_some());

        let reparsed = ExtensionDescriptor::parse(&descriptor.to_xml_string().unwrap()).unwrap();
        assert_eq!(reparsed.manifest(), descriptor.manifest());
    }

    #[test]
    fn load_keeps_unmodelled_nodes() {
        let descriptor = manifest_with("<requires><ext>org.civicrm.api4</ext></requires>");
        assert!(descriptor.manifest().mixins.is_none());
        let xml = descriptor.to_xml_string().unwrap();
        assert!(xml.contains("<ext>org.civicrm.api4</ext>"));
    }
}
