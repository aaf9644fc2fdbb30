//! Input records and per-run display options.
//!
//! A [`Record`] is one row of the input table. Column names are normalized
//! (trimmed, lower-cased) on insertion so lookups never depend on how the
//! spreadsheet author capitalized a header.
//!
//! The column names the composer reads are fixed by the input format the
//! certificates have always used:
//!
//! | Column | Meaning |
//! |---|---|
//! | `nombre` | given name |
//! | `apellido1`, `apellido2` | surname parts (`apellidos` accepted as a single column) |
//! | `curso_nombre` | course name |
//! | `horas` | duration in hours |
//! | `calificacion_num` | numeric grade, 0–10 |
//! | `calificacion_texto` | free-text grade |
//! | `extra_1` | optional extra line |
//! | `fecha` | issuance date |
//! | `email` | recipient address, also the document identity |
//! | `id_plantilla` | template identifier (optional) |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod columns {
    pub const NAME: &str = "nombre";
    pub const SURNAME_1: &str = "apellido1";
    pub const SURNAME_2: &str = "apellido2";
    pub const SURNAMES: &str = "apellidos";
    pub const COURSE: &str = "curso_nombre";
    pub const DURATION: &str = "horas";
    pub const GRADE: &str = "calificacion_num";
    pub const GRADE_TEXT: &str = "calificacion_texto";
    pub const EXTRA: &str = "extra_1";
    pub const DATE: &str = "fecha";
    pub const EMAIL: &str = "email";
    pub const TEMPLATE: &str = "id_plantilla";
}

/// A raw cell value as delivered by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One input row. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// 1-based position in the input, used in every log line about the row.
    pub position: usize,
    fields: BTreeMap<String, CellValue>,
}

impl Record {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style insert; the column name is normalized.
    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<CellValue>) {
        self.fields
            .insert(normalize_column(column), value.into());
    }

    /// Raw value for a column. `None` when the column is missing entirely.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(&normalize_column(column))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Trim and lower-case a column header.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Which optional detail lines appear on the documents of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub include_duration: bool,
    pub include_grade: bool,
    pub include_extra: bool,
}

impl DisplayOptions {
    pub fn all() -> Self {
        Self {
            include_duration: true,
            include_grade: true,
            include_extra: true,
        }
    }
}
