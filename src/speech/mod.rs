//! Text-to-speech layer
//!
//! Request validation, the voice catalog and the gateway that forwards
//! synthesis requests to a remote provider.

mod gateway;
mod request;
pub mod voices;

pub use gateway::{PlayAiProvider, SpeechGateway, SpeechProvider, DEFAULT_AUDIO_CONTENT_TYPE};
pub use request::{
    SynthesisRequest, SynthesizedAudio, TtsParams, DEFAULT_SPEED, DEFAULT_TEMPERATURE, MAX_SPEED,
    MAX_TEMPERATURE, MIN_SPEED, MIN_TEMPERATURE,
};
pub use voices::Voice;
