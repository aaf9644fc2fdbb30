//! Drawing surface trait and shared types.
//!
//! The [`Surface`] trait is the only thing the layout engine draws on. It
//! takes fully resolved runs: the engine has already picked the face,
//! measured the text and computed the left edge, so a surface never makes
//! placement decisions.
//!
//! The production implementation is
//! [`PdfSurface`](super::pdf_surface::PdfSurface). All coordinates are PDF
//! points from the bottom-left corner of the page.

use super::color::Color;
use super::fonts::FontFace;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("cannot draw: {0}")]
    Rejected(String),
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned rectangle in points, origin at its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn full_page(page: PageSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: page.height,
        }
    }

    /// The page shrunk by `inset` on every side.
    pub fn inset(page: PageSize, inset: f32) -> Self {
        Self {
            x: inset,
            y: inset,
            width: (page.width - 2.0 * inset).max(0.0),
            height: (page.height - 2.0 * inset).max(0.0),
        }
    }
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontFace,
    pub size: f32,
    pub color: Color,
    /// Left edge of the run.
    pub x: f32,
    /// Baseline.
    pub y: f32,
    /// Horizontal compression, `1.0` = none.
    pub horizontal_scale: f32,
}

pub trait Surface {
    fn page(&self) -> PageSize;

    fn draw_text(&mut self, run: &TextRun) -> Result<(), SurfaceError>;

    /// Draw the image at `path` stretched to fill `area`.
    fn draw_image(&mut self, path: &Path, area: Rect) -> Result<(), SurfaceError>;

    fn stroke_rect(&mut self, area: Rect, line_width: f32) -> Result<(), SurfaceError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Surface that records what it is asked to draw.
    ///
    /// Faces listed in `rejected_fonts` fail to draw, which lets tests drive
    /// the engine's fallback path.
    pub struct MockSurface {
        pub page: PageSize,
        pub operations: Vec<RecordedOp>,
        pub rejected_fonts: Vec<FontFace>,
        pub fail_images: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Text(TextRun),
        Image { path: String, area: Rect },
        Border { area: Rect, line_width: f32 },
    }

    impl MockSurface {
        pub fn new(page: PageSize) -> Self {
            Self {
                page,
                operations: Vec::new(),
                rejected_fonts: Vec::new(),
                fail_images: false,
            }
        }

        pub fn texts(&self) -> Vec<&TextRun> {
            self.operations
                .iter()
                .filter_map(|op| match op {
                    RecordedOp::Text(run) => Some(run),
                    _ => None,
                })
                .collect()
        }

        pub fn text_strings(&self) -> Vec<&str> {
            self.texts().into_iter().map(|r| r.text.as_str()).collect()
        }
    }

    impl Surface for MockSurface {
        fn page(&self) -> PageSize {
            self.page
        }

        fn draw_text(&mut self, run: &TextRun) -> Result<(), SurfaceError> {
            if self.rejected_fonts.contains(&run.font) {
                return Err(SurfaceError::Rejected(run.font.base_font().to_string()));
            }
            self.operations.push(RecordedOp::Text(run.clone()));
            Ok(())
        }

        fn draw_image(&mut self, path: &Path, area: Rect) -> Result<(), SurfaceError> {
            if self.fail_images {
                return Err(SurfaceError::Image(format!("{}: unreadable", path.display())));
            }
            self.operations.push(RecordedOp::Image {
                path: path.to_string_lossy().to_string(),
                area,
            });
            Ok(())
        }

        fn stroke_rect(&mut self, area: Rect, line_width: f32) -> Result<(), SurfaceError> {
            self.operations.push(RecordedOp::Border { area, line_width });
            Ok(())
        }
    }

    fn page() -> PageSize {
        PageSize {
            width: 100.0,
            height: 50.0,
        }
    }

    #[test]
    fn mock_records_text() {
        let mut surface = MockSurface::new(page());
        let run = TextRun {
            text: "Hola".into(),
            font: FontFace::Helvetica,
            size: 12.0,
            color: Color::BLACK,
            x: 1.0,
            y: 2.0,
            horizontal_scale: 1.0,
        };
        surface.draw_text(&run).unwrap();
        assert_eq!(surface.text_strings(), vec!["Hola"]);
    }

    #[test]
    fn mock_rejects_listed_fonts() {
        let mut surface = MockSurface::new(page());
        surface.rejected_fonts.push(FontFace::TimesBold);
        let run = TextRun {
            text: "x".into(),
            font: FontFace::TimesBold,
            size: 12.0,
            color: Color::BLACK,
            x: 0.0,
            y: 0.0,
            horizontal_scale: 1.0,
        };
        assert!(matches!(surface.draw_text(&run), Err(SurfaceError::Rejected(_))));
        assert!(surface.operations.is_empty());
    }

    #[test]
    fn inset_rect_shrinks_each_side() {
        let r = Rect::inset(page(), 10.0);
        assert_eq!(
            r,
            Rect {
                x: 10.0,
                y: 10.0,
                width: 80.0,
                height: 30.0
            }
        );
        assert_eq!(Rect::inset(page(), 60.0).width, 0.0);
    }
}
