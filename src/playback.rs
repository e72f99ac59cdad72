//! Playback position model for synthesized audio
//!
//! The server does not output sound. It keeps the authoritative
//! play/pause/seek/volume/rate state for the active audio handle so every
//! client of a session sees the same transport.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Distance covered by skip forward / skip backward
pub const SKIP_SECS: f64 = 10.0;
pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 2.0;

/// Snapshot of the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub volume: f32,
    pub rate: f32,
    /// `m:ss` rendering of the position
    pub position_label: String,
}

/// A transport command sent by a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    Seek { position: f64 },
    SkipForward,
    SkipBackward,
    Volume { value: f32 },
    Rate { value: f32 },
    Duration { value: f64 },
    Advance { elapsed: f64 },
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    playing: bool,
    position: f64,
    duration: Option<f64>,
    volume: f32,
    rate: f32,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PlaybackController {
    /// Paused at the start, full volume, playing back at `rate`
    pub fn new(rate: f32) -> Self {
        Self {
            playing: false,
            position: 0.0,
            duration: None,
            volume: 1.0,
            rate: clamp_rate(rate),
        }
    }

    pub fn play(&mut self) {
        if self.at_end() {
            self.position = 0.0;
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump to `secs`, clamped to the known length of the stream
    pub fn seek(&mut self, secs: f64) {
        self.position = self.clamp_position(secs);
    }

    pub fn skip_forward(&mut self) {
        self.seek(self.position + SKIP_SECS);
    }

    pub fn skip_backward(&mut self) {
        self.seek(self.position - SKIP_SECS);
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = clamp_rate(rate);
    }

    /// Record the stream length once the client has decoded its metadata
    pub fn set_duration(&mut self, secs: f64) {
        if secs.is_finite() && secs >= 0.0 {
            self.duration = Some(secs);
            self.position = self.clamp_position(self.position);
        }
    }

    /// Move the position forward by wall-clock time while playing.
    /// Playback stops when the end of the stream is reached.
    pub fn advance(&mut self, elapsed: Duration) {
        if !self.playing {
            return;
        }
        let next = self.position + elapsed.as_secs_f64() * f64::from(self.rate);
        self.position = self.clamp_position(next);
        if self.at_end() {
            self.playing = false;
        }
    }

    /// Apply a client command. An elapsed time that does not fit a
    /// `Duration` is rejected.
    pub fn apply(&mut self, command: &PlaybackCommand) -> Result<()> {
        match *command {
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Toggle => self.toggle(),
            PlaybackCommand::Seek { position } => self.seek(position),
            PlaybackCommand::SkipForward => self.skip_forward(),
            PlaybackCommand::SkipBackward => self.skip_backward(),
            PlaybackCommand::Volume { value } => self.set_volume(value),
            PlaybackCommand::Rate { value } => self.set_rate(value),
            PlaybackCommand::Duration { value } => self.set_duration(value),
            PlaybackCommand::Advance { elapsed } => {
                let elapsed =
                    Duration::try_from_secs_f64(elapsed).map_err(|_| Error::InvalidRequest {
                        reason: format!("Invalid elapsed time: {}", elapsed),
                    })?;
                self.advance(elapsed);
            }
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            playing: self.playing,
            position_secs: self.position,
            duration_secs: self.duration,
            volume: self.volume,
            rate: self.rate,
            position_label: format_time(self.position),
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.duration, Some(d) if self.position >= d)
    }

    fn clamp_position(&self, secs: f64) -> f64 {
        if !secs.is_finite() {
            return self.position;
        }
        let upper = self.duration.unwrap_or(f64::MAX);
        secs.clamp(0.0, upper)
    }
}

fn clamp_rate(rate: f32) -> f32 {
    if !rate.is_finite() {
        return 1.0;
    }
    rate.clamp(MIN_RATE, MAX_RATE)
}

/// Format seconds as `m:ss`
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loaded(duration: f64) -> PlaybackController {
        let mut controller = PlaybackController::new(1.0);
        controller.set_duration(duration);
        controller
    }

    #[test]
    fn test_play_pause_toggle() {
        let mut controller = loaded(30.0);
        assert!(!controller.is_playing());

        controller.play();
        assert!(controller.is_playing());
        controller.pause();
        assert!(!controller.is_playing());
        controller.toggle();
        assert!(controller.is_playing());
        controller.toggle();
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_seek_clamped_to_stream() {
        let mut controller = loaded(30.0);
        controller.seek(12.5);
        assert_eq!(controller.position(), 12.5);
        controller.seek(99.0);
        assert_eq!(controller.position(), 30.0);
        controller.seek(-4.0);
        assert_eq!(controller.position(), 0.0);
        controller.seek(f64::NAN);
        assert_eq!(controller.position(), 0.0);
    }

    #[test]
    fn test_skip_by_ten_seconds() {
        let mut controller = loaded(25.0);
        controller.skip_forward();
        assert_eq!(controller.position(), 10.0);
        controller.skip_forward();
        controller.skip_forward();
        assert_eq!(controller.position(), 25.0);
        controller.skip_backward();
        assert_eq!(controller.position(), 15.0);
    }

    #[test]
    fn test_volume_and_rate_clamped() {
        let mut controller = PlaybackController::new(5.0);
        assert_eq!(controller.status().rate, MAX_RATE);

        controller.set_volume(1.7);
        assert_eq!(controller.status().volume, 1.0);
        controller.set_volume(-1.0);
        assert_eq!(controller.status().volume, 0.0);
        controller.set_rate(0.1);
        assert_eq!(controller.status().rate, MIN_RATE);
    }

    #[test]
    fn test_advance_scaled_by_rate_and_stops_at_end() {
        let mut controller = loaded(10.0);
        controller.set_rate(2.0);

        controller.advance(Duration::from_secs(2));
        assert_eq!(controller.position(), 0.0, "paused transport does not move");

        controller.play();
        controller.advance(Duration::from_secs(3));
        assert_eq!(controller.position(), 6.0);

        controller.advance(Duration::from_secs(5));
        assert_eq!(controller.position(), 10.0);
        assert!(!controller.is_playing());

        controller.play();
        assert_eq!(controller.position(), 0.0, "play at end restarts");
    }

    #[test]
    fn test_commands_deserialize_and_apply() {
        let mut controller = loaded(60.0);
        let commands: Vec<PlaybackCommand> = serde_json::from_str(
            r#"[{"action":"play"},{"action":"seek","position":42.0},{"action":"volume","value":0.25}]"#,
        )
        .unwrap();
        for command in &commands {
            controller.apply(command).unwrap();
        }

        let status = controller.status();
        assert!(status.playing);
        assert_eq!(status.position_secs, 42.0);
        assert_eq!(status.volume, 0.25);
        assert_eq!(status.position_label, "0:42");
    }

    #[test]
    fn test_advance_rejects_unrepresentable_elapsed() {
        let mut controller = loaded(30.0);
        controller.play();
        controller.seek(5.0);

        for elapsed in [1e300, -1.0, f64::NAN, f64::INFINITY] {
            let result = controller.apply(&PlaybackCommand::Advance { elapsed });
            assert!(matches!(result, Err(Error::InvalidRequest { .. })));
        }
        assert_eq!(controller.position(), 5.0);
        assert!(controller.is_playing());

        controller
            .apply(&PlaybackCommand::Advance { elapsed: 1e9 })
            .unwrap();
        assert_eq!(controller.position(), 30.0);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.9), "0:09");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
