//! PDF Speech Server - Entry point

use pdf_speech_server::pdf::PdfiumBackend;
use pdf_speech_server::speech::PlayAiProvider;
use pdf_speech_server::{run_server, Config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_speech_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF Speech Server");

    let config = Config::from_env_file(".env")?;
    let backend = match &config.server.pdfium_library_dir {
        Some(dir) => PdfiumBackend::with_library_dir(dir),
        None => PdfiumBackend::new(),
    };
    if !backend.is_available() {
        tracing::warn!("PDFium library not found; page extraction and rendering will fail");
    }
    let provider = PlayAiProvider::new(config.speech.clone())?;

    run_server(config, Arc::new(backend), Arc::new(provider)).await?;
    Ok(())
}
