//! PDF processing layer
//!
//! Documents, page text extraction and page rendering. PDFium is the
//! production engine; anything implementing [`PdfBackend`] can stand in.

mod cache;
mod document;
mod reader;

pub use cache::{FrameCache, FrameKey};
pub use document::{check_page_bounds, validate_pdf_header, Document};
pub use reader::{
    clamp_scale, extract, join_text_fragments, render, zoom_in, zoom_out, PdfBackend,
    PdfiumBackend, RenderedPage, DEFAULT_SCALE, MAX_SCALE, MIN_SCALE, SCALE_STEP,
};
