//! Synthesis request validation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 1.0;

/// Synthesis parameters as they arrive on the wire (`POST /tts`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsParams {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// A validated synthesis request with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub temperature: f32,
}

impl SynthesisRequest {
    /// Validate wire parameters and fill in defaults.
    ///
    /// Text and voice must be present and non-blank; speed and temperature
    /// default to 1.0 and 0.5 and must fall inside their ranges.
    pub fn from_params(params: TtsParams) -> Result<Self> {
        let text = params.text.filter(|t| !t.trim().is_empty());
        let voice = params.voice.filter(|v| !v.trim().is_empty());

        let (Some(text), Some(voice)) = (text, voice) else {
            return Err(Error::InvalidRequest {
                reason: "Missing required parameters".to_string(),
            });
        };

        let speed = params.speed.unwrap_or(DEFAULT_SPEED);
        check_range("speed", speed, MIN_SPEED, MAX_SPEED)?;

        let temperature = params.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        check_range("temperature", temperature, MIN_TEMPERATURE, MAX_TEMPERATURE)?;

        Ok(Self {
            text,
            voice,
            speed,
            temperature,
        })
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::InvalidRequest {
            reason: format!("{} must be between {} and {}", name, min, max),
        });
    }
    Ok(())
}

/// Audio returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn params(text: Option<&str>, voice: Option<&str>) -> TtsParams {
        TtsParams {
            text: text.map(str::to_string),
            voice: voice.map(str::to_string),
            ..TtsParams::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let request = SynthesisRequest::from_params(params(Some("Hello"), Some("v1"))).unwrap();
        assert_eq!(
            request,
            SynthesisRequest {
                text: "Hello".to_string(),
                voice: "v1".to_string(),
                speed: 1.0,
                temperature: 0.5,
            }
        );
    }

    #[rstest]
    #[case(None, Some("v1"))]
    #[case(Some("Hello"), None)]
    #[case(Some("   "), Some("v1"))]
    #[case(Some("Hello"), Some(""))]
    fn test_missing_text_or_voice(#[case] text: Option<&str>, #[case] voice: Option<&str>) {
        let result = SynthesisRequest::from_params(params(text, voice));
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
    }

    #[rstest]
    #[case(Some(0.4), None)]
    #[case(Some(2.5), None)]
    #[case(Some(f32::NAN), None)]
    #[case(None, Some(-0.1))]
    #[case(None, Some(1.5))]
    fn test_out_of_range_settings(#[case] speed: Option<f32>, #[case] temperature: Option<f32>) {
        let mut p = params(Some("Hello"), Some("v1"));
        p.speed = speed;
        p.temperature = temperature;
        assert!(matches!(
            SynthesisRequest::from_params(p),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_explicit_settings_kept() {
        let mut p = params(Some("Hello"), Some("v1"));
        p.speed = Some(2.0);
        p.temperature = Some(0.0);
        let request = SynthesisRequest::from_params(p).unwrap();
        assert_eq!(request.speed, 2.0);
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn test_wire_params_deserialize() {
        let p: TtsParams =
            serde_json::from_str(r#"{"text":"Hi","voice":"v1","speed":null}"#).unwrap();
        assert_eq!(p.text.as_deref(), Some("Hi"));
        assert_eq!(p.speed, None);
        assert_eq!(p.temperature, None);
    }
}
