//! Placement of template fields onto a [`Surface`].
//!
//! Every `place_*` call is infallible from the caller's point of view. A
//! name that is not in the font registry or a color that does not parse is
//! replaced by the [`RenderDefaults`] value before drawing; if the surface
//! still refuses a run, it is retried once in the default font and color and
//! then skipped with a warning. The page is always produced.

use super::calculations::{AutoFit, anchor_left_edge, fit_font_size, mm_to_pt, stacked_line_y};
use super::color::{Color, resolve_color};
use super::fonts::{FontFace, resolve_font};
use super::surface::{Surface, SurfaceError, TextRun};
use crate::config::RenderConfig;
use crate::template::{DetailsSpec, PlacementSpec};

/// Fallback styling and signature geometry, resolved from [`RenderConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDefaults {
    pub font: FontFace,
    pub color: Color,
    pub signature_font: FontFace,
    pub annotation_font: FontFace,
    pub annotation_color: Color,
    pub annotation_size_delta: f32,
    pub annotation_offset_mm: f32,
    pub autofit_step: f32,
    pub autofit_floor: f32,
    pub signature_max_width_mm: f32,
    pub border_inset_mm: f32,
    pub border_line_width: f32,
}

impl RenderDefaults {
    pub fn from_config(config: &RenderConfig) -> Self {
        let font = resolve_font(Some(&config.font), FontFace::Helvetica);
        let color = resolve_color(Some(&config.color), Color::BLACK);
        Self {
            font,
            color,
            signature_font: resolve_font(Some(&config.signature_font), FontFace::HelveticaBold),
            annotation_font: resolve_font(Some(&config.annotation_font), font),
            annotation_color: resolve_color(Some(&config.annotation_color), color),
            annotation_size_delta: config.annotation_size_delta,
            annotation_offset_mm: config.annotation_offset_mm,
            autofit_step: config.autofit_step,
            autofit_floor: config.autofit_floor,
            signature_max_width_mm: config.signature_max_width_mm,
            border_inset_mm: config.border_inset_mm,
            border_line_width: config.border_line_width,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// What goes in the signature slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureText {
    /// Generic text such as "Firma Responsable"; no annotation.
    Placeholder(String),
    /// A personalized signer name with the annotation drawn below it.
    Signed { name: String, annotation: String },
}

impl SignatureText {
    /// A personalized signature. Signer names are printed upper-cased.
    pub fn signed(name: &str, annotation: &str) -> Self {
        SignatureText::Signed {
            name: name.trim().to_uppercase(),
            annotation: annotation.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SignatureText::Placeholder(text) => text,
            SignatureText::Signed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Style {
    font: FontFace,
    size: f32,
    color: Color,
    horizontal_scale: f32,
}

impl Style {
    fn new(font: FontFace, size: f32, color: Color) -> Self {
        Self {
            font,
            size,
            color,
            horizontal_scale: 1.0,
        }
    }

    fn fitted(font: FontFace, fit: AutoFit, color: Color) -> Self {
        Self {
            font,
            size: fit.size,
            color,
            horizontal_scale: fit.horizontal_scale,
        }
    }
}

pub struct LayoutEngine {
    defaults: RenderDefaults,
}

impl LayoutEngine {
    pub fn new(defaults: RenderDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RenderDefaults {
        &self.defaults
    }

    /// Draw `text` at the placement. No-op without a placement or text.
    pub fn place_text(&self, surface: &mut dyn Surface, spec: Option<&PlacementSpec>, text: &str) {
        let Some(spec) = spec else { return };
        self.place_line(surface, spec, spec.y_mm, text);
    }

    /// Draw `lines` top to bottom, line `i` at `y_mm - i * line_spacing_mm`.
    pub fn place_dynamic_block(
        &self,
        surface: &mut dyn Surface,
        spec: Option<&DetailsSpec>,
        lines: &[String],
    ) {
        let Some(spec) = spec else { return };
        for (i, line) in lines.iter().enumerate() {
            let y_mm = stacked_line_y(spec.placement.y_mm, i, spec.line_spacing_mm);
            self.place_line(surface, &spec.placement, y_mm, line);
        }
    }

    /// Draw the signature at the largest size that keeps it within
    /// `max_width_mm`, plus the annotation line for a personalized signer.
    pub fn place_autofit_signature(
        &self,
        surface: &mut dyn Surface,
        spec: Option<&PlacementSpec>,
        signature: &SignatureText,
        max_width_mm: f32,
    ) {
        let Some(spec) = spec else { return };
        let text = signature.text();
        if text.is_empty() {
            return;
        }

        let d = &self.defaults;
        let max_width = mm_to_pt(max_width_mm);
        let fit_in = |font: FontFace| {
            fit_font_size(
                |size| font.text_width(text, size),
                spec.font_size,
                d.autofit_step,
                d.autofit_floor,
                max_width,
            )
        };

        let font = resolve_font(spec.font_name.as_deref(), d.signature_font);
        let color = resolve_color(spec.color.as_deref(), d.color);
        let style = Style::fitted(font, fit_in(font), color);
        let fallback = Style::fitted(d.font, fit_in(d.font), d.color);
        let drawn = self.draw_or_fall_back(surface, spec, spec.y_mm, text, style, fallback);

        if let (SignatureText::Signed { annotation, .. }, Some(size)) = (signature, drawn) {
            if annotation.is_empty() {
                return;
            }
            let size = (size - d.annotation_size_delta).max(1.0);
            let y_mm = spec.y_mm - d.annotation_offset_mm;
            let style = Style::new(d.annotation_font, size, d.annotation_color);
            let fallback = Style::new(d.font, size, d.color);
            self.draw_or_fall_back(surface, spec, y_mm, annotation, style, fallback);
        }
    }

    fn place_line(&self, surface: &mut dyn Surface, spec: &PlacementSpec, y_mm: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        let d = &self.defaults;
        let font = resolve_font(spec.font_name.as_deref(), d.font);
        let color = resolve_color(spec.color.as_deref(), d.color);
        let style = Style::new(font, spec.font_size, color);
        let fallback = Style::new(d.font, spec.font_size, d.color);
        self.draw_or_fall_back(surface, spec, y_mm, text, style, fallback);
    }

    /// Draw with `style`, retry once with `fallback`. Returns the size
    /// actually drawn, `None` if both attempts failed.
    fn draw_or_fall_back(
        &self,
        surface: &mut dyn Surface,
        spec: &PlacementSpec,
        y_mm: f32,
        text: &str,
        style: Style,
        fallback: Style,
    ) -> Option<f32> {
        let err = match draw(surface, spec, y_mm, text, style) {
            Ok(()) => return Some(style.size),
            Err(e) => e,
        };
        if fallback == style {
            log::warn!("skipping \"{text}\": {err}");
            return None;
        }
        log::warn!(
            "cannot draw \"{text}\" in {}: {err}; retrying in {}",
            style.font.base_font(),
            fallback.font.base_font()
        );
        match draw(surface, spec, y_mm, text, fallback) {
            Ok(()) => Some(fallback.size),
            Err(e) => {
                log::warn!("skipping \"{text}\": {e}");
                None
            }
        }
    }
}

fn draw(
    surface: &mut dyn Surface,
    spec: &PlacementSpec,
    y_mm: f32,
    text: &str,
    style: Style,
) -> Result<(), SurfaceError> {
    let width = style.font.text_width(text, style.size) * style.horizontal_scale;
    let x = anchor_left_edge(spec.alignment, spec.x_mm, width, surface.page().width);
    surface.draw_text(&TextRun {
        text: text.to_string(),
        font: style.font,
        size: style.size,
        color: style.color,
        x,
        y: mm_to_pt(y_mm),
        horizontal_scale: style.horizontal_scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::calculations::page_size;
    use crate::layout::surface::tests::MockSurface;
    use crate::template::{Alignment, Orientation};

    fn surface() -> MockSurface {
        MockSurface::new(page_size(Orientation::Landscape))
    }

    fn engine() -> LayoutEngine {
        LayoutEngine::new(RenderDefaults::default())
    }

    fn spec(x_mm: f32, y_mm: f32, alignment: Alignment) -> PlacementSpec {
        PlacementSpec {
            x_mm,
            y_mm,
            alignment,
            ..PlacementSpec::default()
        }
    }

    fn rendered_width(run: &TextRun) -> f32 {
        run.font.text_width(&run.text, run.size) * run.horizontal_scale
    }

    // =========================================================================
    // place_text
    // =========================================================================

    #[test]
    fn place_text_without_spec_or_text_draws_nothing() {
        let mut s = surface();
        engine().place_text(&mut s, None, "Hola");
        engine().place_text(&mut s, Some(&PlacementSpec::default()), "");
        assert!(s.operations.is_empty());
    }

    #[test]
    fn center_at_zero_uses_page_center() {
        let mut s = surface();
        engine().place_text(&mut s, Some(&spec(0.0, 100.0, Alignment::Center)), "ANA PÉREZ");
        let run = s.texts()[0].clone();
        let mid = run.x + rendered_width(&run) / 2.0;
        assert!((mid - s.page.width / 2.0).abs() < 1e-3);
        assert!((run.y - mm_to_pt(100.0)).abs() < 1e-4);
    }

    #[test]
    fn center_at_x_uses_x() {
        let mut s = surface();
        engine().place_text(&mut s, Some(&spec(50.0, 10.0, Alignment::Center)), "abc");
        let run = s.texts()[0].clone();
        let mid = run.x + rendered_width(&run) / 2.0;
        assert!((mid - mm_to_pt(50.0)).abs() < 1e-3);
    }

    #[test]
    fn right_alignment_ends_at_x() {
        let mut s = surface();
        engine().place_text(&mut s, Some(&spec(200.0, 10.0, Alignment::Right)), "Fecha: 1/1/2025");
        let run = s.texts()[0].clone();
        assert!((run.x + rendered_width(&run) - mm_to_pt(200.0)).abs() < 1e-3);
    }

    #[test]
    fn left_alignment_starts_at_x() {
        let mut s = surface();
        engine().place_text(&mut s, Some(&spec(40.0, 10.0, Alignment::Left)), "x");
        assert!((s.texts()[0].x - mm_to_pt(40.0)).abs() < 1e-4);
    }

    #[test]
    fn template_font_and_color_are_used() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_name: Some("Times-Bold".into()),
            color: Some("#ff0000".into()),
            font_size: 20.0,
            ..PlacementSpec::default()
        };
        engine().place_text(&mut s, Some(&placement), "x");
        let run = s.texts()[0].clone();
        assert_eq!(run.font, FontFace::TimesBold);
        assert_eq!(run.color.r, 1.0);
        assert_eq!(run.size, 20.0);
    }

    #[test]
    fn unknown_font_and_bad_color_fall_back_to_defaults() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_name: Some("Comic Sans".into()),
            color: Some("verde".into()),
            ..PlacementSpec::default()
        };
        engine().place_text(&mut s, Some(&placement), "x");
        let run = s.texts()[0].clone();
        assert_eq!(run.font, FontFace::Helvetica);
        assert_eq!(run.color, Color::BLACK);
    }

    #[test]
    fn injected_defaults_are_honored() {
        let defaults = RenderDefaults {
            font: FontFace::Courier,
            ..RenderDefaults::default()
        };
        let mut s = surface();
        let placement = PlacementSpec {
            font_name: Some("nope".into()),
            ..PlacementSpec::default()
        };
        LayoutEngine::new(defaults).place_text(&mut s, Some(&placement), "x");
        assert_eq!(s.texts()[0].font, FontFace::Courier);
    }

    #[test]
    fn rejected_font_is_retried_with_default() {
        let mut s = surface();
        s.rejected_fonts.push(FontFace::TimesRoman);
        let placement = PlacementSpec {
            font_name: Some("Times-Roman".into()),
            ..PlacementSpec::default()
        };
        engine().place_text(&mut s, Some(&placement), "x");
        assert_eq!(s.texts().len(), 1);
        assert_eq!(s.texts()[0].font, FontFace::Helvetica);
    }

    #[test]
    fn unrenderable_text_is_skipped_without_panicking() {
        let mut s = surface();
        s.rejected_fonts.push(FontFace::Helvetica);
        engine().place_text(&mut s, Some(&PlacementSpec::default()), "x");
        engine().place_text(&mut s, Some(&spec(10.0, 10.0, Alignment::Left)), "y");
        assert!(s.operations.is_empty());
    }

    // =========================================================================
    // place_dynamic_block
    // =========================================================================

    fn details(y_mm: f32, spacing: f32) -> DetailsSpec {
        DetailsSpec {
            placement: spec(0.0, y_mm, Alignment::Center),
            line_spacing_mm: spacing,
        }
    }

    #[test]
    fn block_stacks_lines_downwards() {
        let mut s = surface();
        let lines = vec!["uno".to_string(), "dos".to_string(), "tres".to_string()];
        engine().place_dynamic_block(&mut s, Some(&details(80.0, 6.0)), &lines);
        assert_eq!(s.text_strings(), vec!["uno", "dos", "tres"]);
        let ys: Vec<f32> = s.texts().iter().map(|r| r.y).collect();
        for (i, y) in ys.iter().enumerate() {
            assert!((y - mm_to_pt(80.0 - 6.0 * i as f32)).abs() < 1e-3);
        }
    }

    #[test]
    fn block_without_spec_or_lines_draws_nothing() {
        let mut s = surface();
        engine().place_dynamic_block(&mut s, None, &["a".to_string()]);
        engine().place_dynamic_block(&mut s, Some(&details(80.0, 6.0)), &[]);
        assert!(s.operations.is_empty());
    }

    // =========================================================================
    // place_autofit_signature
    // =========================================================================

    #[test]
    fn short_signature_keeps_template_size() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_size: 12.0,
            ..spec(230.0, 35.0, Alignment::Center)
        };
        let sig = SignatureText::Placeholder("Firma Responsable".into());
        engine().place_autofit_signature(&mut s, Some(&placement), &sig, 90.0);
        let runs = s.texts();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].size, 12.0);
        assert_eq!(runs[0].font, FontFace::HelveticaBold);
        assert_eq!(runs[0].horizontal_scale, 1.0);
    }

    #[test]
    fn long_signature_shrinks() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_size: 24.0,
            ..spec(150.0, 35.0, Alignment::Center)
        };
        let sig = SignatureText::signed(
            "María de los Ángeles Fernández-Villaverde y Martínez",
            "(Firmado Digitalmente)",
        );
        engine().place_autofit_signature(&mut s, Some(&placement), &sig, 90.0);
        let run = s.texts()[0].clone();
        assert!(run.size < 24.0);
        assert!(run.size >= 6.0);
        assert!(rendered_width(&run) <= mm_to_pt(90.0) + 1e-3);
    }

    #[test]
    fn signature_width_never_exceeds_bound() {
        for len in [1usize, 10, 40, 80, 120, 160, 200] {
            for ch in ['W', 'i', 'M', 'Ñ'] {
                let name: String = std::iter::repeat_n(ch, len).collect();
                let mut s = surface();
                let placement = PlacementSpec {
                    font_size: 18.0,
                    ..spec(150.0, 35.0, Alignment::Right)
                };
                let sig = SignatureText::signed(&name, "(Firmado Digitalmente)");
                engine().place_autofit_signature(&mut s, Some(&placement), &sig, 90.0);
                let run = s.texts()[0].clone();
                assert!(
                    rendered_width(&run) <= mm_to_pt(90.0) + 1e-3,
                    "len {len} '{ch}': {} pt",
                    rendered_width(&run)
                );
            }
        }
    }

    #[test]
    fn signed_name_is_uppercased_and_annotated() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_size: 12.0,
            ..spec(230.0, 35.0, Alignment::Center)
        };
        let sig = SignatureText::signed("  Ana Gómez ", "(Firmado Digitalmente)");
        engine().place_autofit_signature(&mut s, Some(&placement), &sig, 90.0);

        let runs = s.texts();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "ANA GÓMEZ");
        assert_eq!(runs[1].text, "(Firmado Digitalmente)");
        assert_eq!(runs[1].size, 9.0);
        assert_eq!(runs[1].font, FontFace::Helvetica);
        assert!((runs[1].y - mm_to_pt(31.0)).abs() < 1e-3);
        assert!((runs[1].color.r - 85.0 / 255.0).abs() < 1e-6);

        // same center anchor
        let mid = |r: &TextRun| r.x + rendered_width(r) / 2.0;
        assert!((mid(runs[0]) - mid(runs[1])).abs() < 1e-3);
    }

    #[test]
    fn placeholder_has_no_annotation() {
        let mut s = surface();
        let sig = SignatureText::Placeholder("Firma Responsable".into());
        engine().place_autofit_signature(&mut s, Some(&spec(230.0, 35.0, Alignment::Center)), &sig, 90.0);
        assert_eq!(s.text_strings(), vec!["Firma Responsable"]);
    }

    #[test]
    fn annotation_size_never_below_one_point() {
        let mut s = surface();
        let placement = PlacementSpec {
            font_size: 2.0,
            ..spec(230.0, 35.0, Alignment::Left)
        };
        let sig = SignatureText::signed("A", "(Firmado Digitalmente)");
        engine().place_autofit_signature(&mut s, Some(&placement), &sig, 90.0);
        assert_eq!(s.texts()[1].size, 1.0);
    }

    #[test]
    fn absent_signature_slot_draws_nothing() {
        let mut s = surface();
        let sig = SignatureText::signed("Ana", "(Firmado Digitalmente)");
        engine().place_autofit_signature(&mut s, None, &sig, 90.0);
        assert!(s.operations.is_empty());
    }
}
