//! Built-in voice catalog

use serde::Serialize;

/// A named synthesis persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Provider voice identifier (sent as `voice`)
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    pub gender: &'static str,
    pub style: &'static str,
}

static VOICES: &[Voice] = &[
    Voice {
        id: "s3://voice-cloning-zero-shot/baf1ef41-36b6-428c-9bdf-50ba54682bd8/original/manifest.json",
        name: "Angelo",
        gender: "male",
        style: "conversational",
    },
    Voice {
        id: "s3://voice-cloning-zero-shot/d9ff78ba-d016-47f6-b0ef-dd630f59414e/female-cs/manifest.json",
        name: "Jennifer",
        gender: "female",
        style: "narrative",
    },
    Voice {
        id: "s3://voice-cloning-zero-shot/e040bd1b-f190-4bdb-83f0-75ef85b18f84/original/manifest.json",
        name: "Briggs",
        gender: "male",
        style: "advertising",
    },
    Voice {
        id: "s3://voice-cloning-zero-shot/831bd330-85c6-4333-b2b4-10c476ea3491/original/manifest.json",
        name: "Nia",
        gender: "female",
        style: "videos",
    },
];

/// All voices, default first
pub fn all() -> &'static [Voice] {
    VOICES
}

/// Voice used when a session has not picked one
pub fn default_voice() -> &'static Voice {
    &VOICES[0]
}

/// Look a voice up by provider id or by display name (case-insensitive)
pub fn find(key: &str) -> Option<&'static Voice> {
    VOICES
        .iter()
        .find(|v| v.id == key || v.name.eq_ignore_ascii_case(key))
}
