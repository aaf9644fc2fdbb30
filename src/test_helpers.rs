//! Shared test utilities for the diploma-gen test suite.
//!
//! Provides record builders, ready-made templates, on-disk bundle
//! fixtures and a capturing logger.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_bundle(tmp.path(), "plantillas", "gala", Some(STOCK_TEMPLATE_JSON), true);
//! let resolver = TemplateResolver::from_config(&templates_config(tmp.path()));
//!
//! let record = student(1, "ana@ubu.es");
//! let template = stock_template();
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, PoisonError};

use image::{Rgb, RgbImage};

use crate::config::TemplatesConfig;
use crate::record::{Record, columns};
use crate::template::{ResolvedTemplate, STOCK_TEMPLATE_JSON, TemplateConfig, TemplateSource};

// =========================================================================
// Records
// =========================================================================

/// A complete record: every column the composer reads is filled.
pub fn student(position: usize, email: &str) -> Record {
    Record::new(position)
        .with(columns::NAME, "Ana")
        .with(columns::SURNAME_1, "García")
        .with(columns::SURNAME_2, "López")
        .with(columns::COURSE, "Introducción a Python")
        .with(columns::DURATION, 20.0)
        .with(columns::GRADE, "9,5")
        .with(columns::GRADE_TEXT, "APTO")
        .with(columns::EXTRA, "Modalidad online")
        .with(columns::DATE, "15/03/2025")
        .with(columns::EMAIL, email)
}

/// `count` complete records numbered from 1, with distinct emails.
pub fn students(count: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| student(i, &format!("alumno{i}@ubu.es")))
        .collect()
}

// =========================================================================
// Templates
// =========================================================================

/// A resolved template built from JSON, without background.
pub fn template_from_json(json: &str) -> ResolvedTemplate {
    ResolvedTemplate {
        requested: "default".to_string(),
        source: TemplateSource::BuiltIn,
        config: TemplateConfig::from_json(json).unwrap(),
        background: None,
    }
}

/// The stock default layout (every field placed).
pub fn stock_template() -> ResolvedTemplate {
    template_from_json(STOCK_TEMPLATE_JSON)
}

/// Template config whose external and bundled roots live under `root`.
pub fn templates_config(root: &Path) -> TemplatesConfig {
    TemplatesConfig {
        external_dir: root.join("plantillas"),
        bundled_dir: root.join("templates"),
        ..TemplatesConfig::default()
    }
}

/// Create `<root>/<tier>/<id>/` with an optional `config.json` and an
/// optional small PNG background. Returns the bundle directory.
pub fn write_bundle(
    root: &Path,
    tier: &str,
    id: &str,
    config_json: Option<&str>,
    background: bool,
) -> PathBuf {
    let dir = root.join(tier).join(id);
    fs::create_dir_all(&dir).unwrap();
    if let Some(json) = config_json {
        fs::write(dir.join("config.json"), json).unwrap();
    }
    if background {
        write_png(&dir.join("fondo.png"), 16, 11);
    }
    dir
}

/// Write a small opaque PNG.
pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([240, 235, 220]))
        .save(path)
        .unwrap();
}

// =========================================================================
// Logging
// =========================================================================

static CAPTURED: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Route every log line of the test binary into memory. Idempotent.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&CaptureLogger).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// Captured lines at `level` or more severe that contain `needle`.
///
/// Tests run in parallel and share the logger, so pick a needle unique to
/// the test (a temp path, an unusual value).
pub fn logged(level: log::Level, needle: &str) -> Vec<String> {
    CAPTURED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|(l, msg)| *l <= level && msg.contains(needle))
        .map(|(_, msg)| msg.clone())
        .collect()
}
