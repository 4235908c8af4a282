use std::path::Path;
use std::time::Duration;

use crate::effects::engine::MAX_TRACKS;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelflowError, ReelflowResult};

/// PCM layout shared by audio tracks and audio decoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl AudioFormat {
    /// Samples per channel delivered for one output tick, rounded up.
    pub fn samples_per_tick(self, fps: Fps) -> usize {
        let num = u64::from(self.sample_rate) * u64::from(fps.den);
        num.div_ceil(u64::from(fps.num)) as usize
    }
}

/// Persisted playback settings.
///
/// Every field has a default, so a settings file only needs to name what it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Output frame rate, read once when playback starts.
    pub output_fps: Fps,
    /// Composed output size. Every video clip is decoded at this size.
    pub canvas: Canvas,
    /// Number of video tracks fed into the mixer (at most 64).
    pub video_tracks: u32,
    /// Number of audio tracks.
    pub audio_tracks: u32,
    /// Lookahead, in frames, during which an upcoming clip is preloaded.
    pub preload_window: u64,
    /// Upper bound for any wait on a clip state transition.
    pub transition_timeout_ms: u64,
    /// Audio track PCM layout.
    pub audio: AudioFormat,
    /// Worker threads used to tick tracks. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_fps: Fps { num: 30, den: 1 },
            canvas: Canvas {
                width: 640,
                height: 480,
            },
            video_tracks: MAX_TRACKS as u32,
            audio_tracks: MAX_TRACKS as u32,
            preload_window: 60,
            transition_timeout_ms: 2_000,
            audio: AudioFormat::default(),
            threads: None,
        }
    }
}

impl Settings {
    pub fn from_json_str(s: &str) -> ReelflowResult<Self> {
        let settings: Self =
            serde_json::from_str(s).map_err(|e| ReelflowError::serde(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ReelflowResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReelflowError::config(format!("read settings '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> ReelflowResult<()> {
        Fps::new(self.output_fps.num, self.output_fps.den)
            .map_err(|e| ReelflowError::config(e.to_string()))?;
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ReelflowError::config("canvas width/height must be > 0"));
        }
        if self.video_tracks as usize > MAX_TRACKS {
            return Err(ReelflowError::config(format!(
                "video_tracks must be <= {MAX_TRACKS}, got {}",
                self.video_tracks
            )));
        }
        if self.audio_tracks as usize > MAX_TRACKS {
            return Err(ReelflowError::config(format!(
                "audio_tracks must be <= {MAX_TRACKS}, got {}",
                self.audio_tracks
            )));
        }
        if self.transition_timeout_ms == 0 {
            return Err(ReelflowError::config("transition_timeout_ms must be > 0"));
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(ReelflowError::config(
                "audio sample_rate/channels must be > 0",
            ));
        }
        if self.threads == Some(0) {
            return Err(ReelflowError::config("threads must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
