//! Speech synthesis gateway and the PlayAI provider

use crate::config::SpeechConfig;
use crate::error::{Error, Result};
use crate::speech::{SynthesisRequest, SynthesizedAudio, TtsParams};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::sync::Arc;

/// Content type reported when the provider does not name an audio type
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// A remote text-to-speech service.
///
/// One call is one complete round trip: no retries, no caching.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio>;
}

/// Validates synthesis requests and forwards them to a provider
#[derive(Clone)]
pub struct SpeechGateway {
    provider: Arc<dyn SpeechProvider>,
}

impl SpeechGateway {
    pub fn new(provider: Arc<dyn SpeechProvider>) -> Self {
        Self { provider }
    }

    /// Validate wire parameters, apply defaults, then synthesize
    pub async fn synthesize(&self, params: TtsParams) -> Result<SynthesizedAudio> {
        let request = SynthesisRequest::from_params(params)?;
        self.synthesize_request(&request).await
    }

    /// Synthesize an already validated request
    pub async fn synthesize_request(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        tracing::info!(
            provider = self.provider.name(),
            voice = %request.voice,
            chars = request.text.chars().count(),
            speed = request.speed,
            temperature = request.temperature,
            "synthesizing speech"
        );

        let audio = self.provider.synthesize(request).await?;

        tracing::debug!(
            bytes = audio.data.len(),
            content_type = %audio.content_type,
            "synthesis complete"
        );
        Ok(audio)
    }
}

/// Upstream request body
#[derive(Debug, Serialize)]
struct PlayAiBody<'a> {
    model: &'a str,
    text: &'a str,
    voice: &'a str,
    speed: f32,
    temperature: f32,
}

/// PlayAI streaming TTS endpoint, consumed as a single complete payload
pub struct PlayAiProvider {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl PlayAiProvider {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechProvider for PlayAiProvider {
    fn name(&self) -> &str {
        "playai"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        let body = PlayAiBody {
            model: &self.config.model,
            text: &request.text,
            voice: &request.voice,
            speed: request.speed,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.config.api_url.clone())
            .header(AUTHORIZATION, &self.config.api_key)
            .header("x-user-id", &self.config.user_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect();
            tracing::error!(
                status = status.as_u16(),
                detail = %detail,
                "TTS provider error"
            );
            return Err(Error::Upstream {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();

        let max_bytes = self.config.max_audio_bytes;
        if let Some(content_length) = response.content_length() {
            if content_length > max_bytes {
                return Err(Error::Gateway {
                    reason: format!(
                        "Audio response too large: {} bytes (max: {} bytes)",
                        content_length, max_bytes
                    ),
                });
            }
        }

        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            data.extend_from_slice(&chunk);
            if data.len() as u64 > max_bytes {
                return Err(Error::Gateway {
                    reason: format!(
                        "Audio response too large: {} bytes (max: {} bytes)",
                        data.len(),
                        max_bytes
                    ),
                });
            }
        }

        if data.is_empty() {
            return Err(Error::Gateway {
                reason: "TTS provider returned an empty body".to_string(),
            });
        }

        Ok(SynthesizedAudio { data, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingProvider {
        calls: Mutex<Vec<SynthesisRequest>>,
    }

    #[async_trait]
    impl SpeechProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
            self.calls.lock().push(request.clone());
            Ok(SynthesizedAudio {
                data: vec![0xFF, 0xFB, 0x90],
                content_type: DEFAULT_AUDIO_CONTENT_TYPE.to_string(),
            })
        }
    }

    fn gateway() -> (SpeechGateway, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider {
            calls: Mutex::new(Vec::new()),
        });
        (SpeechGateway::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_defaults_filled_before_dispatch() {
        let (gateway, provider) = gateway();
        let audio = gateway
            .synthesize(TtsParams {
                text: Some("Hello".into()),
                voice: Some("v1".into()),
                ..TtsParams::default()
            })
            .await
            .unwrap();

        assert!(!audio.data.is_empty());
        let calls = provider.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].speed, 1.0);
        assert_eq!(calls[0].temperature, 0.5);
    }

    #[tokio::test]
    async fn test_missing_text_never_dispatched() {
        let (gateway, provider) = gateway();
        let result = gateway
            .synthesize(TtsParams {
                voice: Some("v1".into()),
                ..TtsParams::default()
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
        assert!(provider.calls.lock().is_empty());
    }
}
