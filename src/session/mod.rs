//! Reading sessions
//!
//! A [`ReaderSession`] ties one document, its current page and the audio
//! synthesized for that page together. [`SessionManager`] owns the live
//! sessions and expires idle ones.

mod manager;
mod state;

pub use manager::{SessionManager, SessionSummary, SharedSession};
pub use state::{
    AudioHandle, AudioSummary, DocumentSummary, FrameInfo, PageState, PageTicket, ReaderSession,
    SessionPhase, SessionSnapshot, SynthesisTicket, VoiceSettings, EXTRACTION_PLACEHOLDER,
};
