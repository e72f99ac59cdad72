//! PDF Speech Server Library
//!
//! Reads a PDF one page at a time and turns the current page into speech:
//! - `pdf`: page text extraction and rendering (PDFium)
//! - `speech`: the text-to-speech gateway (PlayAI)
//! - `session`: per-reader state keeping page, text and audio in step
//! - `playback`: transport state for the synthesized audio
//! - `server`: the axum HTTP surface

pub mod config;
pub mod error;
pub mod pdf;
pub mod playback;
pub mod server;
pub mod session;
pub mod speech;

pub use config::{Config, ServerConfig, SpeechConfig};
pub use error::{Error, Result};
pub use server::{router, run_server, AppState};
