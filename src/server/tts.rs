//! `POST /tts`

use super::{parse_json, AppState};
use crate::error::Result;
use crate::speech::TtsParams;
use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

/// Forward `{ text, voice, speed?, temperature? }` to the speech provider
/// and return the audio bytes unchanged.
pub(super) async fn synthesize_speech(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response> {
    let params: TtsParams = parse_json(&body)?;
    let audio = state.gateway.synthesize(params).await?;

    Ok(audio_response(audio.content_type, audio.data))
}

pub(super) fn audio_response(content_type: String, data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        data,
    )
        .into_response()
}
