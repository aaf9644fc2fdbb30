//! CLI output formatting for every command.
//!
//! # Record Display Contract
//!
//! Every line about a record leads with its 1-based input position, padded
//! to three digits, so a run's output can be read side by side with the
//! spreadsheet it came from. Files and reasons follow as secondary context.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! 001 generated → ana_ubu_es__Introduccion_a_Python.pdf
//! 002 skipped: invalid email 'luis-ubu.es'
//! 003 failed → marta_ubu_es__Excel.pdf
//!     Error: cannot write document: ...
//!
//! Generated: 2 | Failed: 1
//! ```
//!
//! ## Plan
//!
//! ```text
//! 001 ana@ubu.es → ana_ubu_es__Introduccion_a_Python.pdf
//!     Subject: Tu diploma del curso: Introducción a Python
//!     Attachment: Diploma_Introduccion_a_Python.pdf
//! 004 unmatched: no document for luis@ubu.es in course 'Excel'
//!
//! Planned: 1 | Unmatched: 1
//! ```
//!
//! ## Resolve
//!
//! ```text
//! Template gala → external plantillas/gala
//!     Orientation: landscape
//!     Background: plantillas/gala/fondo.png
//! Elements
//!     nombre_alumno: x 0 mm, y 118 mm, 28 pt, center, Helvetica-Bold, #1A1A1A
//!     detalles: x 0 mm, y 78 mm, 12 pt, center, line spacing 6 mm
//!     firma: not drawn
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use std::path::Path;

use crate::batch::{BatchEvent, BatchSummary};
use crate::delivery::DispatchEntry;
use crate::template::{Field, PlacementSpec, ResolvedTemplate};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Generate
// ============================================================================

/// Format a single batch event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Generated { position, file } => vec![format!(
            "{} generated \u{2192} {}",
            format_index(*position),
            file_name(file)
        )],
        BatchEvent::Skipped { position, reason } => {
            vec![format!("{} skipped: {}", format_index(*position), reason)]
        }
        BatchEvent::Failed {
            position,
            file,
            error,
        } => vec![
            format!("{} failed \u{2192} {}", format_index(*position), file_name(file)),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Generated: {} | Failed: {}",
            summary.generated, summary.failed
        ),
    ]
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

pub fn format_preview(position: Option<usize>, path: &Path) -> Vec<String> {
    match position {
        Some(pos) => vec![format!(
            "{} preview \u{2192} {}",
            format_index(pos),
            path.display()
        )],
        None => vec!["No record has both an email and a name; nothing to preview".to_string()],
    }
}

pub fn print_preview(position: Option<usize>, path: &Path) {
    for line in format_preview(position, path) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_dispatch_plan(plan: &[DispatchEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut planned = 0;

    for entry in plan {
        match entry {
            DispatchEntry::Planned(dispatch) => {
                planned += 1;
                lines.push(format!(
                    "{} {} \u{2192} {}",
                    format_index(dispatch.position),
                    dispatch.to,
                    file_name(&dispatch.document)
                ));
                lines.push(format!("{}Subject: {}", indent(1), dispatch.subject));
                lines.push(format!(
                    "{}Attachment: {}",
                    indent(1),
                    dispatch.attachment_name
                ));
            }
            DispatchEntry::Unmatched {
                position, reason, ..
            } => {
                lines.push(format!("{} unmatched: {}", format_index(*position), reason));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Planned: {} | Unmatched: {}",
        planned,
        plan.len() - planned
    ));
    lines
}

pub fn print_dispatch_plan(plan: &[DispatchEntry]) {
    for line in format_dispatch_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Resolve
// ============================================================================

fn placement_line(spec: &PlacementSpec) -> String {
    let mut parts = vec![
        format!("x {} mm", spec.x_mm),
        format!("y {} mm", spec.y_mm),
        format!("{} pt", spec.font_size),
        spec.alignment.to_string(),
    ];
    parts.extend(spec.font_name.clone());
    parts.extend(spec.color.clone());
    parts.join(", ")
}

/// Format where an identifier resolved to and what the layout draws.
pub fn format_resolved_template(template: &ResolvedTemplate) -> Vec<String> {
    let config = &template.config;
    let mut lines = vec![
        format!("Template {} \u{2192} {}", template.requested, template.source),
        format!("{}Orientation: {}", indent(1), config.orientation),
        format!(
            "{}Background: {}",
            indent(1),
            template
                .background
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string())
        ),
        "Elements".to_string(),
    ];

    for field in Field::ALL {
        let detail = match (field, config.placement(field)) {
            (_, None) => "not drawn".to_string(),
            (Field::Details, Some(spec)) => {
                let spacing = config
                    .elements
                    .details
                    .as_ref()
                    .map_or(0.0, |d| d.line_spacing_mm);
                format!("{}, line spacing {} mm", placement_line(spec), spacing)
            }
            (_, Some(spec)) => placement_line(spec),
        };
        lines.push(format!("{}{}: {}", indent(1), field.key(), detail));
    }
    lines
}

pub fn print_resolved_template(template: &ResolvedTemplate) {
    for line in format_resolved_template(template) {
        println!("{}", line);
    }
}
