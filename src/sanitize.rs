//! Value sanitization: raw cells to display strings and grades.
//!
//! Input tables are messy. Cells can be missing, empty, padded with spaces,
//! numeric where text was expected, or use a comma as decimal separator.
//! Everything the composer draws passes through here first, so nothing
//! downstream ever sees a raw [`CellValue`].
//!
//! ## Grades
//!
//! A grade can arrive in two columns: a numeric one (`calificacion_num`) and
//! a free-text one (`calificacion_texto`, e.g. "APTO"). [`parse_grade`]
//! only accepts values in the closed interval `[0, 10]`; anything else is
//! "no numeric grade", which is a normal state and not an error. Presence is
//! what counts: a grade of exactly `0` is a present grade.

use crate::record::CellValue;

/// Display string for a cell. Missing and null cells become `""`.
pub fn safe_text(value: Option<&CellValue>) -> String {
    match value {
        None | Some(CellValue::Null) => String::new(),
        Some(CellValue::Text(s)) => s.trim().to_string(),
        Some(CellValue::Number(n)) => format_number(*n),
    }
}

/// Numeric grade in `[0, 10]`, accepting `,` as decimal separator.
pub fn parse_grade(value: Option<&CellValue>) -> Option<f64> {
    let grade = match value {
        None | Some(CellValue::Null) => return None,
        Some(CellValue::Number(n)) => *n,
        Some(CellValue::Text(s)) => s.trim().replace(',', ".").parse::<f64>().ok()?,
    };
    (0.0..=10.0).contains(&grade).then_some(grade)
}

/// Render a grade for display: whole grades without decimals, others as-is.
///
/// - `10.0` → `"10"`
/// - `8.5` → `"8.5"`
/// - `0.0` → `"0"`
pub fn format_grade(grade: f64) -> String {
    format_number(grade)
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// First non-empty value among candidates, trimmed.
///
/// ```text
/// surnames: first_present(&[apellido1 + apellido2, apellidos])
/// ```
pub fn first_present(sources: &[&str]) -> Option<String> {
    sources
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(String::from)
}
