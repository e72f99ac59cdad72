//! Error types for the PDF speech server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for the PDF speech server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF speech server
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing caller input
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Upload with a content type other than PDF
    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    /// Text extraction failed for a page
    #[error("Failed to extract text from page {page}: {reason}")]
    Extraction { page: u32, reason: String },

    /// Rendering failed for a page
    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// TTS provider rejected the request
    #[error("TTS provider returned status {status}")]
    Upstream { status: u16 },

    /// Network or transport failure talking to the TTS provider
    #[error("TTS gateway failure: {reason}")]
    Gateway { reason: String },

    /// Session id unknown or expired
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    /// Session capacity reached
    #[error("Session limit reached ({max})")]
    SessionLimit { max: usize },

    /// Operation needs a loaded document
    #[error("No document loaded")]
    NoDocument,

    /// Operation needs synthesized audio
    #[error("No audio available")]
    NoAudio,

    /// Page text/render has not completed for the current page
    #[error("Page {page} is not ready")]
    PageNotReady { page: u32 },

    /// A synthesis request is already outstanding for this session
    #[error("Synthesis already in progress")]
    SynthesisInProgress,

    /// The page changed while its audio was being generated
    #[error("Page {page} was left before its audio was ready")]
    StaleSynthesis { page: u32 },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Error::Gateway { reason }
    }
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (library errors, provider bodies) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidRequest { reason } => reason.clone(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::UnsupportedMediaType { .. } => "Only PDF files are accepted".to_string(),
            Error::Extraction { page, .. } => {
                format!("Failed to extract text from page {}", page)
            }
            Error::Render { page, .. } => format!("Failed to render page {}", page),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Upstream { .. } => "Failed to generate audio".to_string(),
            Error::Gateway { .. } => "Internal server error".to_string(),
            Error::SessionNotFound { .. } => "Session not found".to_string(),
            Error::SessionLimit { .. } => "Too many active sessions".to_string(),
            Error::NoDocument => "No document loaded".to_string(),
            Error::NoAudio => "No audio available".to_string(),
            Error::PageNotReady { page } => format!("Page {} is not ready", page),
            Error::SynthesisInProgress => "Audio generation already in progress".to_string(),
            Error::StaleSynthesis { page } => {
                format!("Page {} changed before its audio was ready", page)
            }
            Error::Config { .. } => "Server misconfigured".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest { .. }
            | Error::PageOutOfBounds { .. }
            | Error::InvalidPdf { .. } => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::SessionNotFound { .. } | Error::NoDocument | Error::NoAudio => {
                StatusCode::NOT_FOUND
            }
            Error::PageNotReady { .. }
            | Error::SynthesisInProgress
            | Error::StaleSynthesis { .. } => StatusCode::CONFLICT,
            Error::SessionLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Extraction { .. } | Error::Render { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Pdfium { .. }
            | Error::Gateway { .. }
            | Error::Config { .. }
            | Error::Io(_)
            | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.client_message(),
        });

        (status, body).into_response()
    }
}
