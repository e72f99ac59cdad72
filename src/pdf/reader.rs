//! Page text extraction and rendering backed by PDFium

use crate::error::{Error, Result};
use crate::pdf::document::{check_page_bounds, validate_pdf_header, Document};
use base64::Engine;
use pdfium_render::prelude::*;
use std::path::PathBuf;

/// Smallest zoom factor accepted by the renderer
pub const MIN_SCALE: f32 = 0.5;
/// Largest zoom factor accepted by the renderer
pub const MAX_SCALE: f32 = 3.0;
/// Zoom factor used when none is given
pub const DEFAULT_SCALE: f32 = 1.5;
/// Increment applied by zoom in / zoom out
pub const SCALE_STEP: f32 = 0.25;

/// Operations a PDF engine must provide for page-by-page reading.
///
/// Every call receives the raw document bytes and must release whatever
/// parsing state it created before returning. Pages are 1-indexed.
pub trait PdfBackend: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self, data: &[u8]) -> Result<u32>;

    /// Ordered text fragments of a page, joined by single spaces and trimmed
    fn extract_text(&self, data: &[u8], page: u32) -> Result<String>;

    /// Rasterize a page at the given zoom factor
    fn render(&self, data: &[u8], page: u32, scale: f32) -> Result<RenderedPage>;
}

/// Rendered page bitmap (RGBA, 8 bits per channel)
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Zoom factor used for rendering
    pub scale: f32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Row-major RGBA pixels
    pub pixels: Vec<u8>,
}

impl RenderedPage {
    /// White page of the given size
    pub fn blank(page: u32, scale: f32, width: u32, height: u32) -> Self {
        Self {
            page,
            scale,
            width,
            height,
            pixels: vec![0xFF; (width as usize) * (height as usize) * 4],
        }
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Encode the bitmap as PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| Error::Render {
                page: self.page,
                reason: "Pixel buffer does not match dimensions".to_string(),
            })?;

        let mut png_bytes = Vec::new();
        image::DynamicImage::ImageRgba8(buffer)
            .write_to(
                &mut std::io::Cursor::new(&mut png_bytes),
                image::ImageFormat::Png,
            )
            .map_err(|e| Error::Render {
                page: self.page,
                reason: format!("Failed to encode PNG: {}", e),
            })?;

        Ok(png_bytes)
    }

    /// Encode the bitmap as base64 PNG
    pub fn to_base64_png(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }
}

/// Clamp a requested zoom factor to the supported range
pub fn clamp_scale(scale: f32) -> f32 {
    if !scale.is_finite() {
        return DEFAULT_SCALE;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

pub fn zoom_in(scale: f32) -> f32 {
    clamp_scale(scale + SCALE_STEP)
}

pub fn zoom_out(scale: f32) -> f32 {
    clamp_scale(scale - SCALE_STEP)
}

/// Join text runs with single spaces and trim the result
pub fn join_text_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    fragments
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Extract the text of one page of a document (1-indexed)
pub fn extract(backend: &dyn PdfBackend, document: &Document, page: u32) -> Result<String> {
    document.check_page(page, backend)?;
    backend.extract_text(document.data(), page)
}

/// Render one page of a document (1-indexed)
pub fn render(
    backend: &dyn PdfBackend,
    document: &Document,
    page: u32,
    scale: f32,
) -> Result<RenderedPage> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::InvalidRequest {
            reason: format!("Scale must be a positive number, got {}", scale),
        });
    }
    document.check_page(page, backend)?;
    backend.render(document.data(), page, scale)
}

/// PDFium-backed implementation of [`PdfBackend`].
///
/// A fresh PDFium binding is created per call; PDFium is not thread-safe and
/// the document handles it returns must not outlive the call.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library_dirs: Vec<PathBuf>,
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self {
            library_dirs: vec![PathBuf::from("./"), PathBuf::from("/opt/pdfium/lib")],
        }
    }
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `dir` for the PDFium shared library before the defaults
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        let mut backend = Self::default();
        backend.library_dirs.insert(0, dir.into());
        backend
    }

    /// Whether a PDFium library can be bound in this environment
    pub fn is_available(&self) -> bool {
        self.bind().is_ok()
    }

    fn bind(&self) -> Result<Pdfium> {
        let mut last_error = None;
        for dir in &self.library_dirs {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => last_error = Some(e),
            }
        }

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| Error::Pdfium {
                reason: format!(
                    "Failed to initialize PDFium: {} (last search error: {:?})",
                    e, last_error
                ),
            })
    }

    fn load<'a>(
        pdfium: &'a Pdfium,
        data: &'a [u8],
    ) -> std::result::Result<PdfDocument<'a>, PdfiumError> {
        pdfium.load_pdf_from_byte_slice(data, None)
    }

    fn describe(err: PdfiumError) -> String {
        match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                "PDF is password protected".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_count(&self, data: &[u8]) -> Result<u32> {
        validate_pdf_header(data)?;
        let pdfium = self.bind()?;
        let document = Self::load(&pdfium, data).map_err(|e| Error::InvalidPdf {
            reason: Self::describe(e),
        })?;

        Ok(document.pages().len() as u32)
    }

    fn extract_text(&self, data: &[u8], page: u32) -> Result<String> {
        let extraction_error = |reason: String| Error::Extraction { page, reason };

        validate_pdf_header(data).map_err(|e| extraction_error(e.to_string()))?;
        let pdfium = self.bind()?;
        let document =
            Self::load(&pdfium, data).map_err(|e| extraction_error(Self::describe(e)))?;

        let pages = document.pages();
        check_page_bounds(page, pages.len() as u32)?;

        let pdf_page = pages
            .get((page - 1) as u16)
            .map_err(|e| extraction_error(Self::describe(e)))?;
        let text = pdf_page
            .text()
            .map_err(|e| extraction_error(Self::describe(e)))?;

        let fragments: Vec<String> = text
            .segments()
            .iter()
            .map(|segment| segment.text())
            .collect();

        Ok(join_text_fragments(fragments.iter().map(String::as_str)))
    }

    fn render(&self, data: &[u8], page: u32, scale: f32) -> Result<RenderedPage> {
        let render_error = |reason: String| Error::Render { page, reason };

        validate_pdf_header(data).map_err(|e| render_error(e.to_string()))?;
        let pdfium = self.bind()?;
        let document = Self::load(&pdfium, data).map_err(|e| render_error(Self::describe(e)))?;

        let pages = document.pages();
        check_page_bounds(page, pages.len() as u32)?;

        let pdf_page = pages
            .get((page - 1) as u16)
            .map_err(|e| render_error(Self::describe(e)))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| render_error(Self::describe(e)))?;

        let rgba = bitmap.as_image().to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(RenderedPage {
            page,
            scale,
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}
