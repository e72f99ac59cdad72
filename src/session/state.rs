//! Page-synchronized document/audio session
//!
//! A session walks `Empty -> Loaded -> PageReady -> AudioReady`. Every page
//! change (or new document) bumps a generation counter and hands out a
//! [`PageTicket`]; text and render results carrying an older generation are
//! dropped, as are synthesis results that finish after the page moved on.

use crate::error::{Error, Result};
use crate::pdf::{check_page_bounds, clamp_scale, Document, DEFAULT_SCALE};
use crate::playback::{PlaybackController, PlaybackStatus};
use crate::speech::{
    voices, SynthesisRequest, SynthesizedAudio, TtsParams, DEFAULT_SPEED, DEFAULT_TEMPERATURE,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Text shown in place of a page whose text could not be extracted
pub const EXTRACTION_PLACEHOLDER: &str = "Error extracting text from this page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    Loaded,
    PageReady,
    AudioReady,
}

/// Identifies one page computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    page: u32,
}

impl PageTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Identifies one outstanding synthesis call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisTicket {
    id: u64,
    generation: u64,
    page: u32,
}

impl SynthesisTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Extracted text and the page it was extracted from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageState {
    pub page_index: u32,
    pub extracted_text: String,
    pub rendered_at: u32,
    /// True when `extracted_text` is the placeholder
    pub text_error: bool,
}

impl PageState {
    pub fn is_current(&self) -> bool {
        self.rendered_at == self.page_index
    }
}

/// Geometry of the last successfully rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameInfo {
    pub page: u32,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

/// Reference to the synthesized audio of one page
#[derive(Debug, Clone)]
pub struct AudioHandle {
    id: String,
    page: u32,
    content_type: String,
    data: Arc<[u8]>,
    created_at: DateTime<Utc>,
}

impl AudioHandle {
    fn new(page: u32, audio: SynthesizedAudio) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            page,
            content_type: audio.content_type,
            data: Arc::from(audio.data),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Voice selection applied to the next synthesis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub voice: String,
    pub speed: f32,
    pub temperature: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice: voices::default_voice().id.to_string(),
            speed: DEFAULT_SPEED,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug)]
struct PendingPage {
    ticket: PageTicket,
    text: Option<(String, bool)>,
    rendered: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct AudioSummary {
    pub id: String,
    pub page: u32,
    pub bytes: usize,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Serializable view of a session
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
    pub document: Option<DocumentSummary>,
    pub current_page: u32,
    pub total_pages: u32,
    pub text: Option<String>,
    pub text_error: bool,
    pub frame: Option<FrameInfo>,
    pub scale: f32,
    pub settings: VoiceSettings,
    pub synthesizing: bool,
    pub audio: Option<AudioSummary>,
    pub playback: Option<PlaybackStatus>,
}

/// One reader's document, page and audio state
#[derive(Debug)]
pub struct ReaderSession {
    id: String,
    created_at: DateTime<Utc>,
    last_activity: Instant,
    document: Option<Document>,
    total_pages: u32,
    current_page: u32,
    generation: u64,
    page_state: Option<PageState>,
    pending: Option<PendingPage>,
    frame: Option<FrameInfo>,
    scale: f32,
    settings: VoiceSettings,
    next_synthesis_id: u64,
    synthesis: Option<SynthesisTicket>,
    audio: Option<AudioHandle>,
    playback: Option<PlaybackController>,
}

impl ReaderSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
            document: None,
            total_pages: 0,
            current_page: 0,
            generation: 0,
            page_state: None,
            pending: None,
            frame: None,
            scale: DEFAULT_SCALE,
            settings: VoiceSettings::default(),
            next_synthesis_id: 0,
            synthesis: None,
            audio: None,
            playback: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.document.is_none() {
            SessionPhase::Empty
        } else if self.audio.is_some() {
            SessionPhase::AudioReady
        } else if self.pending.is_none() && self.current_text().is_some() {
            SessionPhase::PageReady
        } else {
            SessionPhase::Loaded
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn frame(&self) -> Option<FrameInfo> {
        self.frame
    }

    pub fn audio(&self) -> Option<&AudioHandle> {
        self.audio.as_ref()
    }

    pub fn is_synthesizing(&self) -> bool {
        self.synthesis.is_some()
    }

    /// Page state for the current page, if its text has been extracted
    pub fn page_state(&self) -> Option<&PageState> {
        self.page_state
            .as_ref()
            .filter(|state| state.is_current() && state.page_index == self.current_page)
    }

    /// Extracted text of the current page.
    /// `None` while extraction for the current page is outstanding.
    pub fn current_text(&self) -> Option<&str> {
        self.page_state().map(|state| state.extracted_text.as_str())
    }

    /// Replace the document and start over at page 1
    pub fn load_document(&mut self, document: Document, total_pages: u32) -> Result<PageTicket> {
        if total_pages == 0 {
            return Err(Error::InvalidPdf {
                reason: "Document has no pages".to_string(),
            });
        }

        tracing::info!(
            session = %self.id,
            document = %document.id(),
            name = %document.name(),
            pages = total_pages,
            "document loaded"
        );

        self.document = Some(document);
        self.total_pages = total_pages;
        self.frame = None;
        Ok(self.start_page(1))
    }

    /// Move to another page. Releases any audio attached to the old page.
    pub fn change_page(&mut self, page: u32) -> Result<PageTicket> {
        if self.document.is_none() {
            return Err(Error::NoDocument);
        }
        check_page_bounds(page, self.total_pages)?;

        tracing::debug!(session = %self.id, from = self.current_page, to = page, "page change");
        Ok(self.start_page(page))
    }

    /// Ticket for the computation of the current page, if one is outstanding
    pub fn pending_ticket(&self) -> Option<PageTicket> {
        self.pending.as_ref().map(|pending| pending.ticket)
    }

    fn start_page(&mut self, page: u32) -> PageTicket {
        self.generation += 1;
        self.current_page = page;
        self.page_state = None;
        self.release_audio();

        let ticket = PageTicket {
            generation: self.generation,
            page,
        };
        self.pending = Some(PendingPage {
            ticket,
            text: None,
            rendered: false,
        });
        ticket
    }

    /// Record the extraction result for a page computation.
    ///
    /// Extraction failures never propagate: the page gets the placeholder
    /// text and `text_error` is set. Returns `false` for stale tickets.
    pub fn record_text(&mut self, ticket: PageTicket, outcome: Result<String>) -> bool {
        if self.pending_ticket() != Some(ticket) {
            tracing::debug!(session = %self.id, page = ticket.page, "stale extraction result dropped");
            return false;
        }

        let text = match outcome {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!(session = %self.id, page = ticket.page, error = %e, "text extraction failed");
                (EXTRACTION_PLACEHOLDER.to_string(), true)
            }
        };
        if let Some(pending) = self.pending.as_mut() {
            pending.text = Some(text);
        }
        self.settle_page();
        true
    }

    /// Record the render result for a page computation.
    ///
    /// A failed render leaves the previous frame in place. Returns `false`
    /// for stale tickets.
    pub fn record_render(&mut self, ticket: PageTicket, outcome: Result<FrameInfo>) -> bool {
        if self.pending_ticket() != Some(ticket) {
            tracing::debug!(session = %self.id, page = ticket.page, "stale render result dropped");
            return false;
        }

        match outcome {
            Ok(frame) => self.frame = Some(frame),
            Err(e) => {
                tracing::warn!(session = %self.id, page = ticket.page, error = %e, "page render failed");
            }
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.rendered = true;
        }
        self.settle_page();
        true
    }

    /// Replace the frame descriptor after an out-of-band render of the
    /// current page (e.g. a zoom change)
    pub fn update_frame(&mut self, frame: FrameInfo) -> bool {
        if frame.page != self.current_page || self.pending.is_some() {
            return false;
        }
        self.frame = Some(frame);
        true
    }

    fn settle_page(&mut self) {
        let complete = matches!(&self.pending, Some(p) if p.rendered && p.text.is_some());
        if !complete {
            return;
        }

        if let Some(PendingPage {
            ticket,
            text: Some((text, text_error)),
            ..
        }) = self.pending.take()
        {
            self.page_state = Some(PageState {
                page_index: self.current_page,
                extracted_text: text,
                rendered_at: ticket.page,
                text_error,
            });
            tracing::debug!(session = %self.id, page = ticket.page, "page ready");
        }
    }

    /// Update the zoom factor used for page renders
    pub fn set_scale(&mut self, scale: f32) -> f32 {
        self.scale = clamp_scale(scale);
        self.scale
    }

    /// Change voice, speed or temperature for the next synthesis.
    /// The playback rate follows the synthesis speed.
    pub fn update_settings(
        &mut self,
        voice: Option<&str>,
        speed: Option<f32>,
        temperature: Option<f32>,
    ) -> Result<&VoiceSettings> {
        let voice = match voice {
            Some(key) => voices::find(key)
                .map(|v| v.id.to_string())
                .ok_or_else(|| Error::InvalidRequest {
                    reason: format!("Unknown voice: {}", key),
                })?,
            None => self.settings.voice.clone(),
        };

        // Reuse the wire validation for ranges
        let checked = SynthesisRequest::from_params(TtsParams {
            text: Some("-".to_string()),
            voice: Some(voice),
            speed: Some(speed.unwrap_or(self.settings.speed)),
            temperature: Some(temperature.unwrap_or(self.settings.temperature)),
        })?;

        self.settings = VoiceSettings {
            voice: checked.voice,
            speed: checked.speed,
            temperature: checked.temperature,
        };
        if let (Some(playback), Some(speed)) = (self.playback.as_mut(), speed) {
            playback.set_rate(speed);
        }
        Ok(&self.settings)
    }

    /// Claim the single synthesis slot for the current page's text
    pub fn begin_synthesis(&mut self) -> Result<(SynthesisTicket, SynthesisRequest)> {
        if self.document.is_none() {
            return Err(Error::NoDocument);
        }
        if self.synthesis.is_some() {
            return Err(Error::SynthesisInProgress);
        }
        if !matches!(self.phase(), SessionPhase::PageReady | SessionPhase::AudioReady) {
            return Err(Error::PageNotReady {
                page: self.current_page,
            });
        }

        let state = self.page_state().ok_or(Error::PageNotReady {
            page: self.current_page,
        })?;
        if state.text_error || state.extracted_text.trim().is_empty() {
            return Err(Error::InvalidRequest {
                reason: format!("Page {} has no text to read", self.current_page),
            });
        }

        let request = SynthesisRequest::from_params(TtsParams {
            text: Some(state.extracted_text.clone()),
            voice: Some(self.settings.voice.clone()),
            speed: Some(self.settings.speed),
            temperature: Some(self.settings.temperature),
        })?;

        self.next_synthesis_id += 1;
        let ticket = SynthesisTicket {
            id: self.next_synthesis_id,
            generation: self.generation,
            page: self.current_page,
        };
        self.synthesis = Some(ticket);
        Ok((ticket, request))
    }

    /// Finish a synthesis call.
    ///
    /// Frees the synthesis slot. On success for a still-current page the
    /// audio becomes the active handle (releasing the prior one); results
    /// for a page that is no longer current are discarded and `Ok(None)` is
    /// returned.
    pub fn complete_synthesis(
        &mut self,
        ticket: SynthesisTicket,
        outcome: Result<SynthesizedAudio>,
    ) -> Result<Option<AudioHandle>> {
        if self.synthesis == Some(ticket) {
            self.synthesis = None;
        }

        let audio = outcome?;
        if ticket.generation != self.generation {
            tracing::debug!(
                session = %self.id,
                page = ticket.page,
                "synthesis finished after page change, audio discarded"
            );
            return Ok(None);
        }

        let handle = AudioHandle::new(ticket.page, audio);
        tracing::info!(
            session = %self.id,
            audio = %handle.id(),
            page = handle.page(),
            bytes = handle.len(),
            "audio attached"
        );

        self.release_audio();
        self.playback = Some(PlaybackController::new(self.settings.speed));
        self.audio = Some(handle.clone());
        Ok(Some(handle))
    }

    /// Give up a synthesis that will never complete (caller cancelled)
    pub fn abort_synthesis(&mut self, ticket: SynthesisTicket) {
        if self.synthesis == Some(ticket) {
            tracing::debug!(session = %self.id, page = ticket.page, "synthesis aborted");
            self.synthesis = None;
        }
    }

    pub fn playback(&self) -> Result<&PlaybackController> {
        self.playback.as_ref().ok_or(Error::NoAudio)
    }

    pub fn playback_mut(&mut self) -> Result<&mut PlaybackController> {
        self.playback.as_mut().ok_or(Error::NoAudio)
    }

    fn release_audio(&mut self) {
        if let Some(handle) = self.audio.take() {
            tracing::debug!(session = %self.id, audio = %handle.id(), "audio released");
        }
        self.playback = None;
    }

    /// Tear the session down, releasing document and audio
    pub fn close(&mut self) {
        self.generation += 1;
        self.release_audio();
        self.document = None;
        self.pending = None;
        self.page_state = None;
        self.frame = None;
        self.synthesis = None;
        self.total_pages = 0;
        self.current_page = 0;
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() > idle_timeout
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.page_state();
        SessionSnapshot {
            id: self.id.clone(),
            phase: self.phase(),
            created_at: self.created_at,
            document: self.document.as_ref().map(|doc| DocumentSummary {
                id: doc.id().to_string(),
                name: doc.name().to_string(),
                bytes: doc.len(),
            }),
            current_page: self.current_page,
            total_pages: self.total_pages,
            text: state.map(|s| s.extracted_text.clone()),
            text_error: state.map(|s| s.text_error).unwrap_or(false),
            frame: self.frame,
            scale: self.scale,
            settings: self.settings.clone(),
            synthesizing: self.synthesis.is_some(),
            audio: self.audio.as_ref().map(|audio| AudioSummary {
                id: audio.id.clone(),
                page: audio.page,
                bytes: audio.len(),
                content_type: audio.content_type.clone(),
                created_at: audio.created_at,
            }),
            playback: self.playback.as_ref().map(PlaybackController::status),
        }
    }
}
