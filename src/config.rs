//! Application configuration.
//!
//! Loaded from an optional `diploma-gen.toml`. The file is sparse: stock
//! defaults are serialized to a TOML table, the user file is merged on top
//! key by key, and the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [templates]
//! external_dir = "plantillas"   # user-editable bundles, searched first
//! bundled_dir = "templates"     # bundles shipped with the tool
//! default_id = "default"
//! background_stem = "fondo"     # fondo.png, fondo.jpg, fondo.jpeg
//! config_file = "config.json"
//!
//! [render]
//! font = "Helvetica"
//! color = "#000000"
//! signature_font = "Helvetica-Bold"
//! annotation_font = "Helvetica"
//! annotation_color = "#555555"
//! annotation_size_delta = 3.0
//! annotation_offset_mm = 4.0
//! autofit_step = 0.5
//! autofit_floor = 6.0
//! signature_max_width_mm = 90.0
//! border_inset_mm = 10.0
//! border_line_width = 1.0
//!
//! [labels]
//! date = "Fecha: {value}"
//! duration = "Duración: {value} horas"
//! grade = "Calificación: {value}"
//! grade_text = "Resultado: {value}"
//! signature_placeholder = "Firma Responsable"
//! signed_annotation = "(Firmado Digitalmente)"
//!
//! [input]
//! delimiter = ","
//!
//! [delivery]
//! subject = "Tu diploma del curso: {course}"
//! body = "Hola {name},\n\nAdjunto te enviamos tu diploma ..."
//! attachment_prefix = "Diploma_"
//!
//! [processing]
//! max_processes = 4             # omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early. Template bundles
//! (`config.json`) are a different format and are handled by
//! [`template`](crate::template), where unknown keys are ignored.

use crate::layout::{Color, FontFace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "diploma-gen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub templates: TemplatesConfig,
    pub render: RenderConfig,
    pub labels: LabelsConfig,
    pub input: InputConfig,
    pub delivery: DeliveryConfig,
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.render;
        for (key, name) in [
            ("render.font", &r.font),
            ("render.signature_font", &r.signature_font),
            ("render.annotation_font", &r.annotation_font),
        ] {
            if FontFace::from_name(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{key}: unknown font '{name}'"
                )));
            }
        }
        for (key, value) in [
            ("render.color", &r.color),
            ("render.annotation_color", &r.annotation_color),
        ] {
            if Color::from_hex(value).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{key}: '{value}' is not a hex color"
                )));
            }
        }
        if !(r.autofit_step > 0.0 && r.autofit_step.is_finite()) {
            return Err(ConfigError::Validation(
                "render.autofit_step must be positive".into(),
            ));
        }
        if !(r.autofit_floor > 0.0 && r.autofit_floor.is_finite()) {
            return Err(ConfigError::Validation(
                "render.autofit_floor must be positive".into(),
            ));
        }
        if !(r.signature_max_width_mm > 0.0 && r.signature_max_width_mm.is_finite()) {
            return Err(ConfigError::Validation(
                "render.signature_max_width_mm must be positive".into(),
            ));
        }
        if [r.annotation_size_delta, r.border_inset_mm, r.border_line_width]
            .iter()
            .any(|v| !(v.is_finite() && *v >= 0.0))
        {
            return Err(ConfigError::Validation(
                "render sizes and offsets must not be negative".into(),
            ));
        }
        if self.templates.default_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "templates.default_id must not be empty".into(),
            ));
        }
        if !self.input.delimiter.is_ascii() || self.input.delimiter.len() != 1 {
            return Err(ConfigError::Validation(
                "input.delimiter must be a single ASCII character".into(),
            ));
        }
        Ok(())
    }
}

/// Where template bundles live and how they are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// User-editable bundles, searched first.
    pub external_dir: PathBuf,
    /// Bundles shipped with the tool, searched second.
    pub bundled_dir: PathBuf,
    /// Identifier used when a record names no template or an unknown one.
    pub default_id: String,
    /// Background image file stem inside a bundle.
    pub background_stem: String,
    /// Layout file name inside a bundle.
    pub config_file: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            external_dir: PathBuf::from("plantillas"),
            bundled_dir: PathBuf::from("templates"),
            default_id: "default".to_string(),
            background_stem: "fondo".to_string(),
            config_file: "config.json".to_string(),
        }
    }
}

/// Fallback styling and signature-block geometry, injected into the layout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub font: String,
    pub color: String,
    pub signature_font: String,
    pub annotation_font: String,
    pub annotation_color: String,
    /// The signed annotation is this many points smaller than the signature.
    pub annotation_size_delta: f32,
    /// Distance from the signature baseline down to the annotation baseline.
    pub annotation_offset_mm: f32,
    pub autofit_step: f32,
    pub autofit_floor: f32,
    pub signature_max_width_mm: f32,
    /// Inset of the safety border drawn when a template has no background.
    pub border_inset_mm: f32,
    pub border_line_width: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font: "Helvetica".to_string(),
            color: "#000000".to_string(),
            signature_font: "Helvetica-Bold".to_string(),
            annotation_font: "Helvetica".to_string(),
            annotation_color: "#555555".to_string(),
            annotation_size_delta: 3.0,
            annotation_offset_mm: 4.0,
            autofit_step: 0.5,
            autofit_floor: 6.0,
            signature_max_width_mm: 90.0,
            border_inset_mm: 10.0,
            border_line_width: 1.0,
        }
    }
}

/// Text printed on the documents. `{value}` is replaced by the field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelsConfig {
    pub date: String,
    pub duration: String,
    pub grade: String,
    pub grade_text: String,
    pub signature_placeholder: String,
    pub signed_annotation: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            date: "Fecha: {value}".to_string(),
            duration: "Duración: {value} horas".to_string(),
            grade: "Calificación: {value}".to_string(),
            grade_text: "Resultado: {value}".to_string(),
            signature_placeholder: "Firma Responsable".to_string(),
            signed_annotation: "(Firmado Digitalmente)".to_string(),
        }
    }
}

impl LabelsConfig {
    /// Substitute `{value}` in a label template.
    pub fn fill(template: &str, value: &str) -> String {
        template.replace("{value}", value)
    }
}

/// Tabular input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// CSV field delimiter (single ASCII character).
    pub delimiter: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
        }
    }
}

impl InputConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.bytes().next().unwrap_or(b',')
    }
}

/// What the delivery collaborators put around each document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Mail subject; `{course}` is replaced by the course name.
    pub subject: String,
    /// Plain-text message body; `{name}` and `{course}` are replaced.
    pub body: String,
    /// Attachment file name prefix, followed by the course slug.
    pub attachment_prefix: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            subject: "Tu diploma del curso: {course}".to_string(),
            body: DEFAULT_BODY.to_string(),
            attachment_prefix: "Diploma_".to_string(),
        }
    }
}

const DEFAULT_BODY: &str = "Hola {name},\n\nAdjunto te enviamos tu diploma firmado correspondiente al curso {course}.\n\nUn saludo.";

impl DeliveryConfig {
    pub fn subject_for(&self, course: &str) -> String {
        self.subject.replace("{course}", course)
    }

    pub fn body_for(&self, name: &str, course: &str) -> String {
        self.body.replace("{name}", name).replace("{course}", course)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel composition workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(AppConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, deserialize, validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the application config.
///
/// An explicitly requested file must exist; the implicit
/// [`DEFAULT_CONFIG_FILE`] is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(
            load_raw_config(path)?.ok_or_else(|| {
                ConfigError::Validation(format!("config file not found: {}", path.display()))
            })?,
        ),
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config file. Used by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# diploma-gen configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Template bundles
# ---------------------------------------------------------------------------
[templates]
# A bundle is a directory <dir>/<id>/ holding config.json and an optional
# background image. The external directory is searched first, then the
# bundled one, then the bundled default.
external_dir = "plantillas"
bundled_dir = "templates"
default_id = "default"
background_stem = "fondo"      # fondo.png, then fondo.jpg, then fondo.jpeg
config_file = "config.json"

# ---------------------------------------------------------------------------
# Rendering fallbacks
# ---------------------------------------------------------------------------
[render]
# Used when a template names an unknown font or an invalid color.
font = "Helvetica"
color = "#000000"

# Signature block. Long signer names shrink in autofit_step decrements down
# to autofit_floor to stay within signature_max_width_mm.
signature_font = "Helvetica-Bold"
autofit_step = 0.5
autofit_floor = 6.0
signature_max_width_mm = 90.0

# "(Firmado Digitalmente)" line under a personalized signer name.
annotation_font = "Helvetica"
annotation_color = "#555555"
annotation_size_delta = 3.0
annotation_offset_mm = 4.0

# Frame drawn when a template has no background image.
border_inset_mm = 10.0
border_line_width = 1.0

# ---------------------------------------------------------------------------
# Printed text ({value} is replaced by the field value)
# ---------------------------------------------------------------------------
[labels]
date = "Fecha: {value}"
duration = "Duración: {value} horas"
grade = "Calificación: {value}"
grade_text = "Resultado: {value}"
signature_placeholder = "Firma Responsable"
signed_annotation = "(Firmado Digitalmente)"

# ---------------------------------------------------------------------------
# Input
# ---------------------------------------------------------------------------
[input]
# CSV delimiter. Spreadsheets exported with a Spanish locale often use ";".
delimiter = ","

# ---------------------------------------------------------------------------
# Delivery
# ---------------------------------------------------------------------------
[delivery]
# {course} is the course name, {name} the recipient's given name.
subject = "Tu diploma del curso: {course}"
body = """
Hola {name},

Adjunto te enviamos tu diploma firmado correspondiente al curso {course}.

Un saludo."""
attachment_prefix = "Diploma_"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel composition workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
