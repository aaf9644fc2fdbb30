//! Document composition: one record, one page.
//!
//! Drawing order:
//!
//! 1. page size from the template orientation
//! 2. background stretched over the full page, or a thin safety border
//! 3. student full name (`nombre_alumno`)
//! 4. course name (`nombre_curso`)
//! 5. `Fecha: …` when the record has a date (`fecha`)
//! 6. detail lines (`detalles`): duration, grade, extra
//! 7. signature block (`firma`)
//!
//! Composition degrades instead of failing: a background that cannot be
//! decoded leaves the page blank behind the text, and every placement
//! follows the layout engine's fallback rules. The only error is failing to
//! serialize the finished document.

use crate::config::{AppConfig, LabelsConfig};
use crate::layout::{
    ImageCache, LayoutEngine, PdfSurface, Rect, RenderDefaults, SignatureText, Surface,
    SurfaceError, mm_to_pt, page_size,
};
use crate::record::{DisplayOptions, Record, columns};
use crate::sanitize::{first_present, format_grade, parse_grade, safe_text};
use crate::template::{Field, ResolvedTemplate};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("cannot write document: {0}")]
    Surface(#[from] SurfaceError),
}

/// Composes records onto pages. Backgrounds are encoded once per composer,
/// so one composer should serve a whole batch.
pub struct Composer {
    engine: LayoutEngine,
    labels: LabelsConfig,
    backgrounds: ImageCache,
}

impl Composer {
    pub fn new(engine: LayoutEngine, labels: LabelsConfig) -> Self {
        Self {
            engine,
            labels,
            backgrounds: ImageCache::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            LayoutEngine::new(RenderDefaults::from_config(&config.render)),
            config.labels.clone(),
        )
    }

    /// Compose a record into a single-page PDF.
    pub fn compose(
        &self,
        record: &Record,
        options: DisplayOptions,
        template: &ResolvedTemplate,
        signer: Option<&str>,
    ) -> Result<Vec<u8>, ComposeError> {
        let mut surface =
            PdfSurface::with_cache(page_size(template.config.orientation), &self.backgrounds);
        self.compose_onto(&mut surface, record, options, template, signer);
        Ok(surface.finish()?)
    }

    /// Draw a record onto any surface.
    pub fn compose_onto(
        &self,
        surface: &mut dyn Surface,
        record: &Record,
        options: DisplayOptions,
        template: &ResolvedTemplate,
        signer: Option<&str>,
    ) {
        let config = &template.config;
        let defaults = self.engine.defaults();
        let page = surface.page();

        match &template.background {
            Some(background) => {
                if let Err(e) = surface.draw_image(background, Rect::full_page(page)) {
                    log::warn!("record {}: background skipped: {e}", record.position);
                }
            }
            None => {
                let frame = Rect::inset(page, mm_to_pt(defaults.border_inset_mm));
                if let Err(e) = surface.stroke_rect(frame, defaults.border_line_width) {
                    log::warn!("record {}: border skipped: {e}", record.position);
                }
            }
        }

        self.engine
            .place_text(surface, config.placement(Field::StudentName), &full_name(record));
        self.engine.place_text(
            surface,
            config.placement(Field::CourseName),
            &safe_text(record.get(columns::COURSE)),
        );

        let date = safe_text(record.get(columns::DATE));
        if !date.is_empty() {
            self.engine.place_text(
                surface,
                config.placement(Field::Date),
                &LabelsConfig::fill(&self.labels.date, &date),
            );
        }

        let lines = detail_lines(record, options, &self.labels);
        self.engine
            .place_dynamic_block(surface, config.elements.details.as_ref(), &lines);

        let signature = match signer.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => SignatureText::signed(name, &self.labels.signed_annotation),
            None => SignatureText::Placeholder(self.labels.signature_placeholder.clone()),
        };
        self.engine.place_autofit_signature(
            surface,
            config.placement(Field::Signature),
            &signature,
            defaults.signature_max_width_mm,
        );
    }
}

/// Given name and surnames, upper-cased. `apellido1`/`apellido2` take
/// precedence over a single `apellidos` column.
pub fn full_name(record: &Record) -> String {
    let split_surnames = [columns::SURNAME_1, columns::SURNAME_2]
        .iter()
        .map(|c| safe_text(record.get(c)))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let single_surnames = safe_text(record.get(columns::SURNAMES));
    let surnames = first_present(&[split_surnames.as_str(), single_surnames.as_str()])
        .unwrap_or_default();

    [safe_text(record.get(columns::NAME)), surnames]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// The optional detail lines, in fixed order: duration, grade, extra.
///
/// The grade line shows the numeric grade when one is present (including
/// `0`), otherwise the free-text grade; never both.
pub fn detail_lines(record: &Record, options: DisplayOptions, labels: &LabelsConfig) -> Vec<String> {
    let mut lines = Vec::new();

    if options.include_duration {
        let hours = safe_text(record.get(columns::DURATION));
        if !hours.is_empty() {
            lines.push(LabelsConfig::fill(&labels.duration, &hours));
        }
    }

    if options.include_grade {
        if let Some(grade) = parse_grade(record.get(columns::GRADE)) {
            lines.push(LabelsConfig::fill(&labels.grade, &format_grade(grade)));
        } else {
            let text = safe_text(record.get(columns::GRADE_TEXT));
            if !text.is_empty() {
                lines.push(LabelsConfig::fill(&labels.grade_text, &text));
            }
        }
    }

    if options.include_extra {
        let extra = safe_text(record.get(columns::EXTRA));
        if !extra.is_empty() {
            lines.push(extra);
        }
    }

    lines
}
