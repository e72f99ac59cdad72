//! `/sessions` routes

use super::tts::audio_response;
use super::{parse_json, AppState};
use crate::error::{Error, Result};
use crate::pdf::{self, Document, FrameCache, FrameKey, PdfBackend, RenderedPage};
use crate::playback::{PlaybackCommand, PlaybackStatus};
use crate::session::{
    FrameInfo, PageTicket, SessionSnapshot, SessionSummary, SharedSession, SynthesisTicket,
    VoiceSettings,
};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/document", post(upload_document))
        .route("/:id/page", put(change_page))
        .route("/:id/page/text", get(page_text))
        .route("/:id/page/image", get(page_image))
        .route("/:id/settings", put(update_settings))
        .route("/:id/synthesize", post(synthesize_page))
        .route("/:id/audio", get(get_audio))
        .route("/:id/playback", get(playback_status).post(playback_command))
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSnapshot>)> {
    let (_, session) = state.sessions.create()?;
    let snapshot = session.lock().snapshot();
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list())
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>> {
    let session = state.sessions.get(&id)?;
    let snapshot = session.lock().snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if let Some(document_id) = state.sessions.remove(&id)? {
        state.frames.remove_document(&document_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the session's document with an uploaded PDF (`file` or `pdf` field)
async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>> {
    let session = state.sessions.get(&id)?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to read multipart field");
        Error::InvalidRequest {
            reason: "Failed to read upload".to_string(),
        }
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != "file" && name != "pdf" {
            tracing::debug!(field = %name, "ignoring multipart field");
            continue;
        }

        if let Some(content_type) = field.content_type() {
            if !is_pdf_content_type(content_type) {
                return Err(Error::UnsupportedMediaType {
                    content_type: content_type.to_string(),
                });
            }
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let data = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to read file data");
            Error::InvalidRequest {
                reason: "Failed to read file data".to_string(),
            }
        })?;
        tracing::debug!(session = %id, bytes = data.len(), "received upload");

        let document = Document::from_bytes(filename, data.to_vec())?;
        let total_pages = {
            let backend = Arc::clone(&state.backend);
            let document = document.clone();
            tokio::task::spawn_blocking(move || document.page_count(backend.as_ref()))
                .await
                .map_err(join_error)??
        };

        let (ticket, previous) = {
            let mut session = session.lock();
            let previous = session.document().map(|doc| doc.id().to_string());
            (session.load_document(document, total_pages)?, previous)
        };
        if let Some(previous) = previous {
            state.frames.remove_document(&previous);
        }

        load_page(&state, &session, ticket).await?;
        let snapshot = session.lock().snapshot();
        return Ok(Json(snapshot));
    }

    Err(Error::InvalidRequest {
        reason: "No file provided. Use field name 'file' or 'pdf'".to_string(),
    })
}

fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct PageChange {
    page: u32,
}

async fn change_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionSnapshot>> {
    let request: PageChange = parse_json(&body)?;
    let session = state.sessions.get(&id)?;

    let ticket = session.lock().change_page(request.page)?;
    load_page(&state, &session, ticket).await?;

    let snapshot = session.lock().snapshot();
    Ok(Json(snapshot))
}

/// Extract and render the ticket's page concurrently, then hand both
/// results to the session. Stale tickets are dropped by the session.
async fn load_page(state: &AppState, session: &SharedSession, ticket: PageTicket) -> Result<()> {
    let (document, scale) = {
        let session = session.lock();
        let document = session.document().cloned().ok_or(Error::NoDocument)?;
        (document, session.scale())
    };
    let page = ticket.page();

    let text_task = {
        let backend = Arc::clone(&state.backend);
        let document = document.clone();
        tokio::task::spawn_blocking(move || pdf::extract(backend.as_ref(), &document, page))
    };
    let render_task = {
        let backend = Arc::clone(&state.backend);
        let frames = Arc::clone(&state.frames);
        tokio::task::spawn_blocking(move || {
            render_cached(backend.as_ref(), &frames, &document, page, scale)
        })
    };

    let (text, rendered) = tokio::join!(text_task, render_task);
    let text = text.map_err(join_error).and_then(|outcome| outcome);
    let frame = rendered
        .map_err(join_error)
        .and_then(|outcome| outcome)
        .map(|rendered| frame_info(&rendered));

    let mut session = session.lock();
    session.record_text(ticket, text);
    session.record_render(ticket, frame);
    Ok(())
}

fn render_cached(
    backend: &dyn PdfBackend,
    frames: &FrameCache,
    document: &Document,
    page: u32,
    scale: f32,
) -> Result<Arc<RenderedPage>> {
    let key = FrameKey::new(document.id(), page, scale);
    if let Some(hit) = frames.get(&key) {
        return Ok(hit);
    }

    let rendered = Arc::new(pdf::render(backend, document, page, scale)?);
    frames.put(key, Arc::clone(&rendered));
    Ok(rendered)
}

fn frame_info(rendered: &RenderedPage) -> FrameInfo {
    FrameInfo {
        page: rendered.page,
        scale: rendered.scale,
        width: rendered.width,
        height: rendered.height,
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Internal {
        reason: format!("Blocking task failed: {}", e),
    }
}

#[derive(Debug, Serialize)]
struct PageTextResponse {
    page: u32,
    total_pages: u32,
    text: String,
    text_error: bool,
}

async fn page_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PageTextResponse>> {
    let session = state.sessions.get(&id)?;
    let session = session.lock();
    if session.document().is_none() {
        return Err(Error::NoDocument);
    }

    let page_state = session.page_state().ok_or(Error::PageNotReady {
        page: session.current_page(),
    })?;
    Ok(Json(PageTextResponse {
        page: page_state.page_index,
        total_pages: session.total_pages(),
        text: page_state.extracted_text.clone(),
        text_error: page_state.text_error,
    }))
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    scale: Option<f32>,
    /// `in` or `out`, one step from the current scale
    zoom: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    page: u32,
    scale: f32,
    width: u32,
    height: u32,
    mime_type: &'static str,
    data: String,
}

/// Current page as PNG, or as base64 JSON with `encoding=base64`.
/// A `scale` parameter becomes the session's zoom factor, and `zoom=in|out`
/// steps it from there.
async fn page_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<Response> {
    let as_base64 = match query.encoding.as_deref() {
        None | Some("png") | Some("binary") => false,
        Some("base64") => true,
        Some(other) => {
            return Err(Error::InvalidRequest {
                reason: format!("Unsupported encoding: {}", other),
            })
        }
    };

    let zoom: Option<fn(f32) -> f32> = match query.zoom.as_deref() {
        None => None,
        Some("in") => Some(pdf::zoom_in),
        Some("out") => Some(pdf::zoom_out),
        Some(other) => {
            return Err(Error::InvalidRequest {
                reason: format!("Unsupported zoom: {}", other),
            })
        }
    };

    let session = state.sessions.get(&id)?;
    let (document, page, scale) = {
        let mut session = session.lock();
        let document = session.document().cloned().ok_or(Error::NoDocument)?;
        let mut scale = match query.scale {
            Some(scale) => session.set_scale(scale),
            None => session.scale(),
        };
        if let Some(step) = zoom {
            scale = session.set_scale(step(scale));
        }
        (document, session.current_page(), scale)
    };

    let backend = Arc::clone(&state.backend);
    let frames = Arc::clone(&state.frames);
    let (rendered, encoded) = tokio::task::spawn_blocking(move || -> Result<_> {
        let rendered = render_cached(backend.as_ref(), &frames, &document, page, scale)?;
        let encoded = rendered.to_png()?;
        Ok((rendered, encoded))
    })
    .await
    .map_err(join_error)??;

    session.lock().update_frame(frame_info(&rendered));

    if as_base64 {
        use base64::Engine;
        return Ok(Json(ImageResponse {
            page: rendered.page,
            scale: rendered.scale,
            width: rendered.width,
            height: rendered.height,
            mime_type: "image/png",
            data: base64::engine::general_purpose::STANDARD.encode(&encoded),
        })
        .into_response());
    }

    Ok(([(header::CONTENT_TYPE, "image/png")], encoded).into_response())
}

#[derive(Debug, Deserialize)]
struct SettingsUpdate {
    voice: Option<String>,
    speed: Option<f32>,
    temperature: Option<f32>,
}

async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<VoiceSettings>> {
    let update: SettingsUpdate = parse_json(&body)?;
    let session = state.sessions.get(&id)?;
    let mut session = session.lock();
    let settings = session
        .update_settings(update.voice.as_deref(), update.speed, update.temperature)?
        .clone();
    Ok(Json(settings))
}

#[derive(Debug, Serialize)]
struct SynthesisResponse {
    audio_id: String,
    page: u32,
    bytes: usize,
    content_type: String,
}

/// Frees the synthesis slot if the request future is dropped mid-call
struct SynthesisGuard {
    session: SharedSession,
    ticket: SynthesisTicket,
    armed: bool,
}

impl SynthesisGuard {
    fn new(session: SharedSession, ticket: SynthesisTicket) -> Self {
        Self {
            session,
            ticket,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SynthesisGuard {
    fn drop(&mut self) {
        if self.armed {
            self.session.lock().abort_synthesis(self.ticket);
        }
    }
}

/// Synthesize the current page's text with the session's voice settings
async fn synthesize_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SynthesisResponse>> {
    let session = state.sessions.get(&id)?;
    let (ticket, request) = session.lock().begin_synthesis()?;

    let guard = SynthesisGuard::new(Arc::clone(&session), ticket);
    let outcome = state.gateway.synthesize_request(&request).await;
    guard.disarm();

    let handle = session.lock().complete_synthesis(ticket, outcome)?;
    let handle = handle.ok_or(Error::StaleSynthesis {
        page: ticket.page(),
    })?;

    Ok(Json(SynthesisResponse {
        audio_id: handle.id().to_string(),
        page: handle.page(),
        bytes: handle.len(),
        content_type: handle.content_type().to_string(),
    }))
}

async fn get_audio(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let session = state.sessions.get(&id)?;
    let handle = session.lock().audio().cloned().ok_or(Error::NoAudio)?;

    Ok(audio_response(
        handle.content_type().to_string(),
        handle.data().to_vec(),
    ))
}

async fn playback_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlaybackStatus>> {
    let session = state.sessions.get(&id)?;
    let status = session.lock().playback()?.status();
    Ok(Json(status))
}

async fn playback_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<PlaybackStatus>> {
    let command: PlaybackCommand = parse_json(&body)?;
    let session = state.sessions.get(&id)?;
    let mut session = session.lock();
    let playback = session.playback_mut()?;
    playback.apply(&command)?;
    Ok(Json(playback.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("application/pdf", true)]
    #[case("application/PDF", true)]
    #[case("application/pdf; name=book.pdf", true)]
    #[case("image/png", false)]
    #[case("text/plain", false)]
    fn test_pdf_content_type(#[case] content_type: &str, #[case] expected: bool) {
        assert_eq!(is_pdf_content_type(content_type), expected);
    }
}
