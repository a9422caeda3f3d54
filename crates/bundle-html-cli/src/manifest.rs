/*
 * manifest.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * YAML description of the bundle graph.
 */

//! Bundle manifest.
//!
//! The manifest names every bundle, its layout, the bundles it requires and
//! its entries:
//!
//! ```yaml
//! build_root: build
//! default_language: en
//! bundles:
//!   - name: app
//!     layout: apps/app/layout.rhtml
//!     requires: [desktop]
//!     entries:
//!       - source: apps/app/english.lproj/index.rhtml
//!       - name: main
//!         composite: [index.rhtml]
//!   - name: desktop
//!     layout: frameworks/desktop/layout.rhtml
//!     entries:
//!       - source: frameworks/desktop/english.lproj/panel.haml
//! ```
//!
//! Paths are relative to the manifest's directory. Loading turns the
//! manifest into [`MemoryBundle`]s and [`MemoryEntry`]s.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use bundle_html::{
    BundleRef, EntryKind, EntryRef, MemoryBundle, MemoryEntry, TEMPLATE_SUFFIXES, TemplateKind,
};
use serde::Deserialize;
use tracing::debug;

fn default_build_root() -> PathBuf {
    PathBuf::from("build")
}

fn default_language() -> String {
    "en".to_string()
}

/// Top-level manifest document.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Directory build outputs are written under.
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Language for entries that do not name one.
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default)]
    pub bundles: Vec<BundleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleSpec {
    pub name: String,

    pub layout: PathBuf,

    /// Names of the bundles this one directly requires, in order.
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub entries: Vec<EntrySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntrySpec {
    /// Template source. Required unless the entry is a composite.
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Entry filename. Defaults to the source's file name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    /// Defaults to true when the source sits in a `*.lproj` directory.
    #[serde(default)]
    pub localized: Option<bool>,

    #[serde(default)]
    pub hidden: bool,

    /// Defaults to a kind inferred from the source's extension.
    #[serde(default)]
    pub kind: Option<String>,

    /// Member entry names; marks the entry as a composite.
    #[serde(default)]
    pub composite: Option<Vec<String>>,
}

impl Manifest {
    /// Parse a manifest from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse bundle manifest")
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In manifest {}", path.display()))
    }
}

/// The bundle graph a manifest describes.
#[derive(Debug)]
pub struct Project {
    default_language: String,
    bundles: BTreeMap<String, Arc<MemoryBundle>>,
}

impl Project {
    /// Load the manifest at `path`, resolving paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest = Manifest::load(path)?;
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_manifest(&manifest, root)
    }

    /// Build the bundle graph, resolving relative paths against `root`.
    pub fn from_manifest(manifest: &Manifest, root: &Path) -> Result<Self> {
        let specs: BTreeMap<&str, &BundleSpec> = manifest
            .bundles
            .iter()
            .map(|spec| (spec.name.as_str(), spec))
            .collect();
        if specs.len() != manifest.bundles.len() {
            bail!("Bundle names in the manifest must be unique");
        }

        let mut builder = GraphBuilder {
            manifest,
            root,
            specs: &specs,
            built: BTreeMap::new(),
            visiting: Vec::new(),
        };
        for spec in &manifest.bundles {
            builder.bundle(&spec.name)?;
        }

        Ok(Self {
            default_language: manifest.default_language.clone(),
            bundles: builder.built,
        })
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn bundle_names(&self) -> Vec<&str> {
        self.bundles.keys().map(String::as_str).collect()
    }

    pub fn bundle(&self, name: &str) -> Result<BundleRef> {
        self.bundles
            .get(name)
            .map(|bundle| bundle.clone() as BundleRef)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown bundle: {} (known: {})",
                    name,
                    self.bundle_names().join(", ")
                )
            })
    }

    /// The entry of `bundle` named `name` for `language`.
    ///
    /// Entries that are not localized serve every language.
    pub fn entry(&self, bundle: &str, name: &str, language: Option<&str>) -> Result<EntryRef> {
        let language = language.unwrap_or(&self.default_language);
        let memory = self
            .bundles
            .get(bundle)
            .ok_or_else(|| anyhow!("Unknown bundle: {}", bundle))?;
        find_entry(memory.entries(), name, language).ok_or_else(|| {
            anyhow!(
                "No entry named {} for language {} in bundle {}",
                name,
                language,
                bundle
            )
        })
    }
}

fn find_entry(entries: &[EntryRef], name: &str, language: &str) -> Option<EntryRef> {
    entries
        .iter()
        .find(|e| e.filename() == name && e.language() == language)
        .or_else(|| {
            entries
                .iter()
                .find(|e| e.filename() == name && !e.is_localized())
        })
        .cloned()
}

/// Builds bundles depth-first so requirements exist before their dependents.
struct GraphBuilder<'m> {
    manifest: &'m Manifest,
    root: &'m Path,
    specs: &'m BTreeMap<&'m str, &'m BundleSpec>,
    built: BTreeMap<String, Arc<MemoryBundle>>,
    visiting: Vec<String>,
}

impl GraphBuilder<'_> {
    fn bundle(&mut self, name: &str) -> Result<Arc<MemoryBundle>> {
        if let Some(bundle) = self.built.get(name) {
            return Ok(bundle.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            let mut cycle = self.visiting.clone();
            cycle.push(name.to_string());
            bail!("Bundle requirement cycle: {}", cycle.join(" -> "));
        }
        let spec = *self
            .specs
            .get(name)
            .ok_or_else(|| anyhow!("Unknown bundle: {}", name))?;

        self.visiting.push(name.to_string());
        let mut requires: Vec<BundleRef> = Vec::with_capacity(spec.requires.len());
        for required in &spec.requires {
            let bundle = self
                .bundle(required)
                .with_context(|| format!("Required by bundle {}", name))?;
            requires.push(bundle);
        }
        self.visiting.pop();

        let entries = self
            .entries(spec)
            .with_context(|| format!("In bundle {}", name))?;
        debug!(
            bundle = name,
            requires = requires.len(),
            entries = entries.len(),
            "Loaded bundle"
        );
        let bundle = MemoryBundle::new(name, self.root.join(&spec.layout), requires, entries);
        self.built.insert(name.to_string(), bundle.clone());
        Ok(bundle)
    }

    /// Plain entries first, so composites can refer to entries declared
    /// after them. Declaration order is kept in the result.
    fn entries(&self, bundle: &BundleSpec) -> Result<Vec<EntryRef>> {
        let mut slots: Vec<Option<EntryRef>> = Vec::with_capacity(bundle.entries.len());
        for spec in &bundle.entries {
            slots.push(match spec.composite {
                Some(_) => None,
                None => Some(self.plain_entry(bundle, spec)?),
            });
        }

        let plain: Vec<EntryRef> = slots.iter().flatten().cloned().collect();
        for (slot, spec) in slots.iter_mut().zip(&bundle.entries) {
            if let Some(members) = &spec.composite {
                *slot = Some(self.composite_entry(bundle, spec, members, &plain)?);
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    fn plain_entry(&self, bundle: &BundleSpec, spec: &EntrySpec) -> Result<EntryRef> {
        let source = spec
            .source
            .as_deref()
            .ok_or_else(|| anyhow!("Entry {} has no source", spec.name.as_deref().unwrap_or("?")))?;
        let filename = match &spec.name {
            Some(name) => name.clone(),
            None => source
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Cannot name entry for {}", source.display()))?,
        };
        let kind = match &spec.kind {
            Some(kind) => EntryKind::try_from(kind.as_str()).map_err(|e| anyhow!(e))?,
            None => infer_kind(&filename),
        };
        let language = self.language(spec);
        let localized = spec.localized.unwrap_or_else(|| in_lproj(source));

        Ok(MemoryEntry::new(filename.as_str(), self.root.join(source))
            .with_build_path(self.build_path(bundle, &language, &filename))
            .with_language(language)
            .with_kind(kind)
            .localized(localized)
            .hidden(spec.hidden)
            .into_ref())
    }

    fn composite_entry(
        &self,
        bundle: &BundleSpec,
        spec: &EntrySpec,
        members: &[String],
        plain: &[EntryRef],
    ) -> Result<EntryRef> {
        let filename = spec
            .name
            .clone()
            .ok_or_else(|| anyhow!("Composite entries need a name"))?;
        let language = self.language(spec);
        let members = members
            .iter()
            .map(|member| {
                find_entry(plain, member, &language).ok_or_else(|| {
                    anyhow!("Composite {} names unknown entry {}", filename, member)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MemoryEntry::new_composite(filename.as_str(), members)
            .with_build_path(self.build_path(bundle, &language, &filename))
            .with_language(language)
            .localized(spec.localized.unwrap_or(true))
            .hidden(spec.hidden)
            .into_ref())
    }

    fn language(&self, spec: &EntrySpec) -> String {
        spec.language
            .clone()
            .unwrap_or_else(|| self.manifest.default_language.clone())
    }

    /// `<root>/<build_root>/<bundle>/<language>/<page>.html`
    fn build_path(&self, bundle: &BundleSpec, language: &str, filename: &str) -> PathBuf {
        self.root
            .join(&self.manifest.build_root)
            .join(&bundle.name)
            .join(language)
            .join(output_name(filename))
    }
}

/// Swap the longest matching template suffix for `.html`. Names without
/// any extension (composites) also get `.html`.
fn output_name(filename: &str) -> String {
    let stem = TEMPLATE_SUFFIXES
        .iter()
        .filter_map(|(suffix, _)| filename.strip_suffix(suffix))
        .min_by_key(|stem| stem.len());
    match stem {
        Some(stem) => format!("{}.html", stem),
        None if Path::new(filename).extension().is_none() => format!("{}.html", filename),
        None => filename.to_string(),
    }
}

fn infer_kind(filename: &str) -> EntryKind {
    if TemplateKind::detect(Path::new(filename)).is_some() {
        return EntryKind::Html;
    }
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("js") => EntryKind::Javascript,
        Some("css") => EntryKind::Stylesheet,
        _ => EntryKind::Resource,
    }
}

fn in_lproj(source: &Path) -> bool {
    source.components().any(|c| match c {
        Component::Normal(part) => part.to_str().is_some_and(|p| p.ends_with(".lproj")),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
build_root: out
bundles:
  - name: app
    layout: apps/app/layout.rhtml
    requires: [desktop, foundation]
    entries:
      - source: apps/app/english.lproj/index.rhtml
      - source: apps/app/french.lproj/index.rhtml
        language: fr
      - name: main
        composite: [index.rhtml, late.haml]
      - source: apps/app/late.haml
        localized: true
      - source: apps/app/core.js
  - name: desktop
    layout: frameworks/desktop/layout.rhtml
    requires: [foundation]
  - name: foundation
    layout: frameworks/foundation/layout.rhtml
"#;

    fn project() -> Project {
        Project::from_manifest(&Manifest::parse(MANIFEST).unwrap(), Path::new("/work")).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let manifest = Manifest::parse("bundles: []").unwrap();
        assert_eq!(manifest.build_root, PathBuf::from("build"));
        assert_eq!(manifest.default_language, "en");
        assert!(manifest.bundles.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        assert!(Manifest::parse("bundles: 3").is_err());
    }

    #[test]
    fn test_bundles_resolve_requirements_in_order() {
        let project = project();
        assert_eq!(project.bundle_names(), vec!["app", "desktop", "foundation"]);

        let app = project.bundle("app").unwrap();
        let names: Vec<String> = app
            .all_required_bundles()
            .iter()
            .map(|b| b.bundle_name().to_string())
            .collect();
        assert_eq!(names, vec!["app", "desktop", "foundation"]);
        assert_eq!(app.layout_path(), Path::new("/work/apps/app/layout.rhtml"));
    }

    #[test]
    fn test_entries_get_paths_kind_and_localization() {
        let project = project();
        let index = project.entry("app", "index.rhtml", None).unwrap();
        assert_eq!(
            index.source_path(),
            Path::new("/work/apps/app/english.lproj/index.rhtml")
        );
        assert_eq!(index.build_path(), Path::new("/work/out/app/en/index.html"));
        assert_eq!(index.kind(), EntryKind::Html);
        assert!(index.is_localized());

        let french = project.entry("app", "index.rhtml", Some("fr")).unwrap();
        assert_eq!(french.build_path(), Path::new("/work/out/app/fr/index.html"));

        let js = project.entry("app", "core.js", Some("fr")).unwrap();
        assert_eq!(js.kind(), EntryKind::Javascript);
        assert!(!js.is_localized());
    }

    #[test]
    fn test_composite_members_resolve_by_name() {
        let project = project();
        let main = project.entry("app", "main", None).unwrap();
        let members: Vec<String> = main
            .composite()
            .unwrap()
            .iter()
            .map(|e| e.filename().to_string())
            .collect();
        assert_eq!(members, vec!["index.rhtml", "late.haml"]);
        assert_eq!(main.build_path(), Path::new("/work/out/app/en/main.html"));
    }

    #[test]
    fn test_unknown_entry_and_bundle() {
        let project = project();
        assert!(project.bundle("nope").is_err());
        let Err(err) = project.entry("app", "missing.rhtml", None) else {
            panic!("missing.rhtml should not resolve");
        };
        assert!(err.to_string().contains("missing.rhtml"));
    }

    #[test]
    fn test_requirement_cycle_is_reported() {
        let manifest = Manifest::parse(
            r#"
bundles:
  - name: a
    layout: a.rhtml
    requires: [b]
  - name: b
    layout: b.rhtml
    requires: [a]
"#,
        )
        .unwrap();
        let err = Project::from_manifest(&manifest, Path::new("")).unwrap_err();
        assert!(format!("{:#}", err).contains("a -> b -> a"));
    }

    #[test]
    fn test_unknown_composite_member() {
        let manifest = Manifest::parse(
            r#"
bundles:
  - name: a
    layout: a.rhtml
    entries:
      - name: group
        composite: [ghost.rhtml]
"#,
        )
        .unwrap();
        let err = Project::from_manifest(&manifest, Path::new("")).unwrap_err();
        assert!(format!("{:#}", err).contains("ghost.rhtml"));
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("index.rhtml"), "index.html");
        assert_eq!(output_name("page.html.erb"), "page.html");
        assert_eq!(output_name("panel.haml"), "panel.html");
        assert_eq!(output_name("panel.html.haml"), "panel.html");
        assert_eq!(output_name("main"), "main.html");
        assert_eq!(output_name("core.js"), "core.js");
    }
}
