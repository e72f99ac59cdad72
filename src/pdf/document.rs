//! In-memory PDF document held by a reading session

use crate::error::{Error, Result};
use crate::pdf::PdfBackend;
use std::sync::{Arc, OnceLock};

/// Uploaded PDF bytes plus a lazily resolved page count.
///
/// Cloning is cheap: the byte buffer is shared and never mutated. A new
/// upload produces a new `Document` with a new id.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    name: String,
    data: Arc<[u8]>,
    page_count: OnceLock<u32>,
}

impl Document {
    /// Wrap uploaded bytes, rejecting anything without a PDF header
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        validate_pdf_header(&data)?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            data: Arc::from(data),
            page_count: OnceLock::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the document in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Page count, resolved through the backend on first use
    pub fn page_count(&self, backend: &dyn PdfBackend) -> Result<u32> {
        if let Some(count) = self.page_count.get() {
            return Ok(*count);
        }

        let count = backend.page_count(&self.data)?;
        Ok(*self.page_count.get_or_init(|| count))
    }

    /// Page count if it has already been resolved
    pub fn cached_page_count(&self) -> Option<u32> {
        self.page_count.get().copied()
    }

    /// Ensure `page` is a valid 1-based index for this document
    pub fn check_page(&self, page: u32, backend: &dyn PdfBackend) -> Result<()> {
        let total = self.page_count(backend)?;
        check_page_bounds(page, total)
    }
}

/// Check the `%PDF` magic at the start of the buffer
pub fn validate_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Validate a 1-based page index against a page total
pub fn check_page_bounds(page: u32, total: u32) -> Result<()> {
    if page < 1 || page > total {
        return Err(Error::PageOutOfBounds { page, total });
    }
    Ok(())
}
