//! PDF surface built with `lopdf`.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Page, resources, content stream | `lopdf` (`Document`, `Content`, `Operation`) |
//! | Text | base-14 Type1 fonts, `WinAnsiEncoding`, `Tj` |
//! | Background decode (PNG, JPEG) | `image::ImageReader` |
//! | Background embed | source JPEG bytes, or `image::codecs::jpeg::JpegEncoder`, as a `DCTDecode` XObject |
//!
//! One surface produces one single-page document. Nothing time-dependent is
//! written, so the same drawing calls always give the same bytes.
//!
//! Backgrounds are encoded once per [`ImageCache`]. RGB and grayscale JPEG
//! files are embedded as they are; anything else is flattened over white and
//! encoded to JPEG.

use super::fonts::{FontFace, encode_win_ansi};
use super::surface::{PageSize, Rect, Surface, SurfaceError, TextRun};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const PDF_VERSION: &str = "1.5";
const JPEG_QUALITY: u8 = 90;

/// A background ready to embed as a `DCTDecode` image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub jpeg: Vec<u8>,
}

impl EncodedImage {
    pub fn from_path(path: &Path) -> Result<Self, SurfaceError> {
        let bytes = std::fs::read(path)?;
        let reader = ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
        let format = reader.format();
        let decoded = reader
            .decode()
            .map_err(|e| SurfaceError::Image(format!("{}: {e}", path.display())))?;
        let (width, height) = (decoded.width(), decoded.height());

        let passthrough = match (format, decoded.color()) {
            (Some(ImageFormat::Jpeg), ColorType::Rgb8) => Some("DeviceRGB"),
            (Some(ImageFormat::Jpeg), ColorType::L8) => Some("DeviceGray"),
            _ => None,
        };
        if let Some(color_space) = passthrough {
            return Ok(Self {
                width,
                height,
                color_space,
                jpeg: bytes,
            });
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&flatten(decoded))
            .map_err(|e| SurfaceError::Image(format!("{}: {e}", path.display())))?;
        Ok(Self {
            width,
            height,
            color_space: "DeviceRGB",
            jpeg,
        })
    }
}

/// Encoded backgrounds shared by every surface of a batch, keyed by path.
/// Failures are not cached.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: Mutex<HashMap<PathBuf, Arc<EncodedImage>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Result<Arc<EncodedImage>, SurfaceError> {
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(Arc::clone(hit));
        }

        let encoded = Arc::new(EncodedImage::from_path(path)?);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            entries.entry(path.to_path_buf()).or_insert(encoded),
        ))
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

pub struct PdfSurface<'c> {
    page: PageSize,
    doc: Document,
    operations: Vec<Operation>,
    /// Font resource names, assigned in first-use order.
    fonts: BTreeMap<FontFace, String>,
    images: Vec<(String, ObjectId)>,
    cache: Option<&'c ImageCache>,
}

impl PdfSurface<'static> {
    pub fn new(page: PageSize) -> Self {
        Self::build(page, None)
    }
}

impl<'c> PdfSurface<'c> {
    /// A surface that takes backgrounds from `cache`.
    pub fn with_cache(page: PageSize, cache: &'c ImageCache) -> Self {
        Self::build(page, Some(cache))
    }

    fn build(page: PageSize, cache: Option<&'c ImageCache>) -> Self {
        Self {
            page,
            doc: Document::with_version(PDF_VERSION),
            operations: Vec::new(),
            fonts: BTreeMap::new(),
            images: Vec::new(),
            cache,
        }
    }

    fn font_resource(&mut self, face: FontFace) -> String {
        let next = self.fonts.len() + 1;
        self.fonts
            .entry(face)
            .or_insert_with(|| format!("F{next}"))
            .clone()
    }

    /// Assemble the page and serialize the document.
    pub fn finish(self) -> Result<Vec<u8>, SurfaceError> {
        let PdfSurface {
            page,
            mut doc,
            operations,
            fonts,
            images,
            ..
        } = self;

        let mut font_dict = Dictionary::new();
        for (face, name) in fonts {
            font_dict.set(
                name,
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => face.base_font(),
                    "Encoding" => "WinAnsiEncoding",
                },
            );
        }
        let mut resources = dictionary! { "Font" => font_dict };
        if !images.is_empty() {
            let mut xobjects = Dictionary::new();
            for (name, id) in images {
                xobjects.set(name, id);
            }
            resources.set("XObject", xobjects);
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| SurfaceError::Pdf(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| SurfaceError::Pdf(format!("serialize: {e}")))?;
        Ok(bytes)
    }
}

impl Surface for PdfSurface<'_> {
    fn page(&self) -> PageSize {
        self.page
    }

    fn draw_text(&mut self, run: &TextRun) -> Result<(), SurfaceError> {
        if !run.size.is_finite() || run.size <= 0.0 {
            return Err(SurfaceError::Rejected(format!("font size {}", run.size)));
        }
        let font = self.font_resource(run.font);
        let c = run.color;
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new("BT", vec![]));
        self.operations
            .push(Operation::new("Tf", vec![font.as_str().into(), run.size.into()]));
        self.operations
            .push(Operation::new("rg", vec![c.r.into(), c.g.into(), c.b.into()]));
        if run.horizontal_scale != 1.0 {
            self.operations.push(Operation::new(
                "Tz",
                vec![(run.horizontal_scale * 100.0).into()],
            ));
        }
        self.operations
            .push(Operation::new("Td", vec![run.x.into(), run.y.into()]));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&run.text), StringFormat::Literal)],
        ));
        self.operations.push(Operation::new("ET", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn draw_image(&mut self, path: &Path, area: Rect) -> Result<(), SurfaceError> {
        let image = match self.cache {
            Some(cache) => cache.get(path)?,
            None => Arc::new(EncodedImage::from_path(path)?),
        };

        let id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => image.color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        ));
        let name = format!("Im{}", self.images.len());
        self.images.push((name.clone(), id));

        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                area.width.into(),
                0.into(),
                0.into(),
                area.height.into(),
                area.x.into(),
                area.y.into(),
            ],
        ));
        self.operations
            .push(Operation::new("Do", vec![name.as_str().into()]));
        self.operations.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn stroke_rect(&mut self, area: Rect, line_width: f32) -> Result<(), SurfaceError> {
        self.operations.push(Operation::new("q", vec![]));
        self.operations
            .push(Operation::new("w", vec![line_width.into()]));
        self.operations
            .push(Operation::new("RG", vec![0.into(), 0.into(), 0.into()]));
        self.operations.push(Operation::new(
            "re",
            vec![
                area.x.into(),
                area.y.into(),
                area.width.into(),
                area.height.into(),
            ],
        ));
        self.operations.push(Operation::new("S", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
        Ok(())
    }
}

/// Composite any transparency over white.
fn flatten(decoded: DynamicImage) -> RgbImage {
    if !decoded.color().has_alpha() {
        return decoded.to_rgb8();
    }
    let rgba = decoded.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = f32::from(a) / 255.0;
        let over_white = |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        image::Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::calculations::page_size;
    use crate::layout::color::Color;
    use crate::template::Orientation;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn run(text: &str, font: FontFace) -> TextRun {
        TextRun {
            text: text.to_string(),
            font,
            size: 12.0,
            color: Color::BLACK,
            x: 72.0,
            y: 100.0,
            horizontal_scale: 1.0,
        }
    }

    fn page_fonts(doc: &Document) -> Vec<String> {
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        resources
            .get(b"Font")
            .unwrap()
            .as_dict()
            .unwrap()
            .iter()
            .map(|(_, font)| {
                let base = font.as_dict().unwrap().get(b"BaseFont").unwrap();
                String::from_utf8_lossy(base.as_name().unwrap()).to_string()
            })
            .collect()
    }

    #[test]
    fn empty_page_is_a_valid_single_page_pdf() {
        let bytes = PdfSurface::new(page_size(Orientation::Landscape))
            .finish()
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn text_runs_register_fonts_once() {
        let mut surface = PdfSurface::new(page_size(Orientation::Portrait));
        surface.draw_text(&run("uno", FontFace::Helvetica)).unwrap();
        surface.draw_text(&run("dos", FontFace::Helvetica)).unwrap();
        surface.draw_text(&run("tres", FontFace::TimesBold)).unwrap();
        let doc = Document::load_mem(&surface.finish().unwrap()).unwrap();

        let mut fonts = page_fonts(&doc);
        fonts.sort();
        assert_eq!(fonts, vec!["Helvetica", "Times-Bold"]);
    }

    #[test]
    fn text_is_written_win_ansi() {
        let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
        surface.draw_text(&run("Introducción", FontFace::Helvetica)).unwrap();
        let doc = Document::load_mem(&surface.finish().unwrap()).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        let tj = content
            .operations
            .iter()
            .find(|op| op.operator == "Tj")
            .unwrap();
        assert_eq!(tj.operands[0].as_str().unwrap(), b"Introducci\xF3n");
    }

    #[test]
    fn compressed_runs_emit_tz() {
        let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
        let mut squeezed = run("x", FontFace::Helvetica);
        squeezed.horizontal_scale = 0.5;
        surface.draw_text(&squeezed).unwrap();
        assert!(surface.operations.iter().any(|op| op.operator == "Tz"));
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
        let mut bad = run("x", FontFace::Helvetica);
        bad.size = 0.0;
        assert!(matches!(surface.draw_text(&bad), Err(SurfaceError::Rejected(_))));
    }

    #[test]
    fn output_is_deterministic() {
        let render = || {
            let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
            surface.draw_text(&run("Ana", FontFace::HelveticaBold)).unwrap();
            surface
                .stroke_rect(Rect::inset(surface.page(), 28.0), 1.0)
                .unwrap();
            surface.finish().unwrap()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn transparent_png_background_is_embedded_as_jpeg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.png");
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 0]))
            .save(&path)
            .unwrap();

        let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
        let full = Rect::full_page(surface.page());
        surface.draw_image(&path, full).unwrap();
        let doc = Document::load_mem(&surface.finish().unwrap()).unwrap();

        let image = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()))
            .unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 8);
        assert_eq!(
            image.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
    }

    #[test]
    fn fully_transparent_pixels_become_white() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten(transparent);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn jpeg_background_is_embedded_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.jpg");
        RgbImage::from_pixel(6, 3, image::Rgb([200, 120, 40]))
            .save(&path)
            .unwrap();
        let original = std::fs::read(&path).unwrap();

        let encoded = EncodedImage::from_path(&path).unwrap();
        assert_eq!(encoded.jpeg, original);
        assert_eq!((encoded.width, encoded.height), (6, 3));
        assert_eq!(encoded.color_space, "DeviceRGB");
    }

    #[test]
    fn grayscale_jpeg_keeps_its_color_space() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.jpg");
        image::GrayImage::from_pixel(4, 4, image::Luma([90]))
            .save(&path)
            .unwrap();
        assert_eq!(EncodedImage::from_path(&path).unwrap().color_space, "DeviceGray");
    }

    #[test]
    fn cache_encodes_each_background_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.png");
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let cache = ImageCache::new();
        let first = cache.get(&path).unwrap();
        let second = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let page = page_size(Orientation::Landscape);
        let render = || {
            let mut surface = PdfSurface::with_cache(page, &cache);
            surface.draw_image(&path, Rect::full_page(page)).unwrap();
            surface.finish().unwrap()
        };
        assert_eq!(render(), render());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_does_not_keep_failures() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.png");
        let cache = ImageCache::new();
        assert!(cache.get(&path).is_err());
        assert!(cache.is_empty());

        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();
        assert!(cache.get(&path).is_ok());
    }

    #[test]
    fn unreadable_background_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fondo.png");
        std::fs::write(&path, b"not an image").unwrap();
        let mut surface = PdfSurface::new(page_size(Orientation::Landscape));
        let full = Rect::full_page(surface.page());
        assert!(surface.draw_image(&path, full).is_err());
        assert!(surface.draw_image(&tmp.path().join("missing.png"), full).is_err());
    }
}
