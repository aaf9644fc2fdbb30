//! Page layout: placing template fields on a drawing surface.
//!
//! | Concern | Where |
//! |---|---|
//! | Font registry, advance widths, WinAnsi encoding | [`fonts`] |
//! | Hex colors | [`color`] |
//! | Page sizes, mm → pt, anchoring, autofit | [`calculations`] |
//! | Drawing abstraction | [`Surface`] |
//! | Field placement with fallbacks | [`LayoutEngine`] |
//! | PDF output, background encoding | [`PdfSurface`], [`ImageCache`] |
//!
//! The module is split the same way throughout:
//! - **Calculations**: pure functions (unit testable without a surface)
//! - **Surface**: [`Surface`] trait + [`PdfSurface`]
//! - **Engine**: combines calculations, font metrics and a surface

mod calculations;
mod color;
mod engine;
mod fonts;
mod pdf_surface;
pub mod surface;

pub use calculations::{
    AutoFit, PT_PER_MM, anchor_left_edge, fit_font_size, mm_to_pt, page_size, pt_to_mm,
    stacked_line_y,
};
pub use color::Color;
pub use engine::{LayoutEngine, RenderDefaults, SignatureText};
pub use fonts::FontFace;
pub use pdf_surface::{EncodedImage, ImageCache, PdfSurface};
pub use surface::{PageSize, Rect, Surface, SurfaceError, TextRun};
