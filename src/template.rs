//! Template bundles: typed layout schema and the fallback resolver.
//!
//! A bundle is a directory named after the template identifier:
//!
//! ```text
//! plantillas/                  # external, user-editable (searched first)
//! └── marketing/
//!     ├── config.json          # layout, optional
//!     └── fondo.png            # background, optional (.png > .jpg > .jpeg)
//! templates/                   # bundled with the tool
//! └── default/
//!     └── config.json
//! ```
//!
//! ## Resolution order
//!
//! 1. `<external_dir>/<id>/`
//! 2. `<bundled_dir>/<id>/` (skipped for the default id, which is tier 3)
//! 3. `<bundled_dir>/<default_id>/`
//! 4. built-in layout: [`STOCK_TEMPLATE_JSON`], compiled into the binary
//!
//! The first directory that exists wins; tiers are never merged. Resolution
//! never fails: a missing bundle falls through, and a `config.json` that
//! cannot be read or parsed yields an empty landscape layout (logged at
//! `warn`) while the bundle's background is still used.
//!
//! ## config.json
//!
//! ```json
//! {
//!   "orientacion": "landscape",
//!   "elementos": {
//!     "nombre_alumno": { "x_mm": 0, "y_mm": 118, "tamano": 28, "fuente": "Helvetica-Bold" },
//!     "detalles":      { "x_mm": 0, "y_mm": 78, "interlineado": 6 },
//!     "firma":         { "x_mm": 230, "y_mm": 35, "alineacion": "center" }
//!   }
//! }
//! ```
//!
//! Unknown keys are ignored. An element that is not listed is not drawn.

use crate::config::TemplatesConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// The stock `config.json` of the bundled default template.
pub const STOCK_TEMPLATE_JSON: &str = include_str!("../templates/default/config.json");

/// Background extensions in priority order.
pub const BACKGROUND_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl From<String> for Orientation {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("portrait") {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Landscape => f.write_str("landscape"),
            Orientation::Portrait => f.write_str("portrait"),
        }
    }
}

/// Horizontal anchor. Anything other than `center` or `right` is `left`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl From<String> for Alignment {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Left => f.write_str("left"),
            Alignment::Center => f.write_str("center"),
            Alignment::Right => f.write_str("right"),
        }
    }
}

/// Where and how one field is drawn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementSpec {
    pub x_mm: f32,
    pub y_mm: f32,
    #[serde(rename = "tamano", alias = "font_size")]
    pub font_size: f32,
    #[serde(rename = "alineacion", alias = "alignment")]
    pub alignment: Alignment,
    /// Font name; unknown names fall back to the default font at draw time.
    #[serde(rename = "fuente", alias = "font_name")]
    pub font_name: Option<String>,
    /// Hex color; invalid values fall back to the default color at draw time.
    pub color: Option<String>,
}

impl Default for PlacementSpec {
    fn default() -> Self {
        Self {
            x_mm: 0.0,
            y_mm: 0.0,
            font_size: 12.0,
            alignment: Alignment::Center,
            font_name: None,
            color: None,
        }
    }
}

/// Placement of the stacked detail lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetailsSpec {
    #[serde(flatten)]
    pub placement: PlacementSpec,
    /// Vertical distance between consecutive lines.
    #[serde(rename = "interlineado", alias = "line_spacing_mm")]
    pub line_spacing_mm: f32,
}

impl Default for DetailsSpec {
    fn default() -> Self {
        Self {
            placement: PlacementSpec::default(),
            line_spacing_mm: 5.0,
        }
    }
}

/// The logical fields a template can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StudentName,
    CourseName,
    Date,
    Signature,
    Details,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::StudentName,
        Field::CourseName,
        Field::Date,
        Field::Signature,
        Field::Details,
    ];

    /// Key under `elementos`.
    pub fn key(self) -> &'static str {
        match self {
            Field::StudentName => "nombre_alumno",
            Field::CourseName => "nombre_curso",
            Field::Date => "fecha",
            Field::Signature => "firma",
            Field::Details => "detalles",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Elements {
    #[serde(rename = "nombre_alumno")]
    pub student_name: Option<PlacementSpec>,
    #[serde(rename = "nombre_curso")]
    pub course_name: Option<PlacementSpec>,
    #[serde(rename = "fecha")]
    pub date: Option<PlacementSpec>,
    #[serde(rename = "firma")]
    pub signature: Option<PlacementSpec>,
    #[serde(rename = "detalles")]
    pub details: Option<DetailsSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    #[serde(rename = "orientacion", alias = "orientation")]
    pub orientation: Orientation,
    #[serde(rename = "elementos", alias = "elements")]
    pub elements: Elements,
}

impl TemplateConfig {
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The layout compiled into the binary.
    pub fn stock() -> Self {
        Self::from_json(STOCK_TEMPLATE_JSON).unwrap_or_default()
    }

    /// Placement of a field, `None` if the template does not draw it.
    pub fn placement(&self, field: Field) -> Option<&PlacementSpec> {
        let e = &self.elements;
        match field {
            Field::StudentName => e.student_name.as_ref(),
            Field::CourseName => e.course_name.as_ref(),
            Field::Date => e.date.as_ref(),
            Field::Signature => e.signature.as_ref(),
            Field::Details => e.details.as_ref().map(|d| &d.placement),
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// The file-existence and read operations resolution needs.
pub trait BundleStore: Sync {
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl BundleStore for FsStore {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        fs::read_to_string(path)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Which tier a template was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    External(PathBuf),
    Bundled(PathBuf),
    BundledDefault(PathBuf),
    BuiltIn,
}

impl TemplateSource {
    pub fn dir(&self) -> Option<&Path> {
        match self {
            TemplateSource::External(p)
            | TemplateSource::Bundled(p)
            | TemplateSource::BundledDefault(p) => Some(p),
            TemplateSource::BuiltIn => None,
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::External(p) => write!(f, "external {}", p.display()),
            TemplateSource::Bundled(p) => write!(f, "bundled {}", p.display()),
            TemplateSource::BundledDefault(p) => write!(f, "default {}", p.display()),
            TemplateSource::BuiltIn => f.write_str("built-in"),
        }
    }
}

/// A usable template: layout plus optional background.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    /// The identifier after normalization (not necessarily the one found).
    pub requested: String,
    pub source: TemplateSource,
    pub config: TemplateConfig,
    pub background: Option<PathBuf>,
}

impl ResolvedTemplate {
    pub fn built_in(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            source: TemplateSource::BuiltIn,
            config: TemplateConfig::stock(),
            background: None,
        }
    }
}

pub struct TemplateResolver<S: BundleStore = FsStore> {
    store: S,
    external_dir: PathBuf,
    bundled_dir: PathBuf,
    default_id: String,
    background_stem: String,
    config_file: String,
}

impl TemplateResolver<FsStore> {
    pub fn from_config(config: &TemplatesConfig) -> Self {
        Self::with_store(config, FsStore)
    }
}

impl<S: BundleStore> TemplateResolver<S> {
    pub fn with_store(config: &TemplatesConfig, store: S) -> Self {
        Self {
            store,
            external_dir: config.external_dir.clone(),
            bundled_dir: config.bundled_dir.clone(),
            default_id: config.default_id.trim().to_string(),
            background_stem: config.background_stem.clone(),
            config_file: config.config_file.clone(),
        }
    }

    /// Normalize a raw identifier: trimmed, empty means the default, and
    /// anything that could escape the template roots is refused.
    pub fn normalize_id(&self, id: Option<&str>) -> String {
        let id = id.map(str::trim).unwrap_or_default();
        if id.is_empty() {
            return self.default_id.clone();
        }
        if id.contains(['/', '\\']) || id.contains("..") {
            log::warn!("template id '{id}' is not a plain name, using default");
            return self.default_id.clone();
        }
        id.to_string()
    }

    /// Resolve an identifier to a template. Never fails.
    pub fn resolve(&self, id: Option<&str>) -> ResolvedTemplate {
        let requested = self.normalize_id(id);

        let is_default = requested == self.default_id;
        let candidates = [
            Some(TemplateSource::External(self.external_dir.join(&requested))),
            (!is_default).then(|| TemplateSource::Bundled(self.bundled_dir.join(&requested))),
            Some(TemplateSource::BundledDefault(
                self.bundled_dir.join(&self.default_id),
            )),
        ];
        let Some(source) = candidates
            .into_iter()
            .flatten()
            .find(|c| c.dir().is_some_and(|d| self.store.is_dir(d)))
        else {
            log::warn!("no template bundle found for '{requested}', using built-in layout");
            return ResolvedTemplate::built_in(requested);
        };

        if matches!(source, TemplateSource::BundledDefault(_)) && !is_default {
            log::warn!("template '{requested}' not found, using default");
        }

        let Some(dir) = source.dir() else {
            return ResolvedTemplate::built_in(requested);
        };
        let config = self.load_layout(dir);
        let background = self.find_background(dir);
        log::debug!(
            "template '{requested}' -> {source} (background: {})",
            background.is_some()
        );

        ResolvedTemplate {
            requested,
            config,
            background,
            source,
        }
    }

    fn load_layout(&self, dir: &Path) -> TemplateConfig {
        let path = dir.join(&self.config_file);
        if !self.store.is_file(&path) {
            return TemplateConfig::default();
        }
        match self.read_layout(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}: {e}; using empty layout", path.display());
                TemplateConfig::default()
            }
        }
    }

    fn read_layout(&self, path: &Path) -> Result<TemplateConfig, TemplateError> {
        let json = self.store.read_to_string(path)?;
        TemplateConfig::from_json(&json)
    }

    fn find_background(&self, dir: &Path) -> Option<PathBuf> {
        BACKGROUND_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{ext}", self.background_stem)))
            .find(|p| self.store.is_file(p))
    }
}

/// Resolves each identifier once per batch and shares the result.
pub struct TemplateCache<'r, S: BundleStore = FsStore> {
    resolver: &'r TemplateResolver<S>,
    entries: Mutex<HashMap<String, Arc<ResolvedTemplate>>>,
}

impl<'r, S: BundleStore> TemplateCache<'r, S> {
    pub fn new(resolver: &'r TemplateResolver<S>) -> Self {
        Self {
            resolver,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: Option<&str>) -> Arc<ResolvedTemplate> {
        let key = self.resolver.normalize_id(id);
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(hit);
        }

        let resolved = Arc::new(self.resolver.resolve(Some(&key)));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert(resolved))
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
