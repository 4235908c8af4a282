use std::path::{Path, PathBuf};

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::frame::VideoFrame;
use crate::settings::AudioFormat;

/// Configuration provided to a [`FrameSink`] when playback starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// PCM layout of the audio tracks, if the session has any.
    pub audio: Option<AudioFormat>,
}

/// Consumer of the frames a playback surface displays.
///
/// Ordering contract: `push_frame` is called once per tick, in tick order. Indices repeat while
/// playback is paused.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> ReelflowResult<()>;
    /// Push the frame shown at timeline position `idx`.
    fn push_frame(&mut self, idx: FrameIndex, frame: &VideoFrame) -> ReelflowResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> ReelflowResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, VideoFrame)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, VideoFrame)] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelflowResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &VideoFrame) -> ReelflowResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> ReelflowResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Writes every pushed frame as `frame_<tick>.png` into a directory.
///
/// Files are numbered by push order, so paused ticks produce distinct files.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written since `begin`.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, tick: u64) -> PathBuf {
        self.dir.join(format!("frame_{tick:06}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, _cfg: SinkConfig) -> ReelflowResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            ReelflowError::config(format!("create output dir '{}': {e}", self.dir.display()))
        })?;
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &VideoFrame) -> ReelflowResult<()> {
        let path = self.frame_path(self.written);
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| anyhow::anyhow!("write png '{}': {e}", path.display()))?;
        tracing::trace!(frame = idx.0, path = %path.display(), "frame written");
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> ReelflowResult<()> {
        tracing::debug!(dir = %self.dir.display(), frames = self.written, "png sequence done");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/sink.rs"]
mod tests;
