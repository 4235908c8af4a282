//! Decoder binding contract.
//!
//! A [`MediaDecoder`] is the opaque per-clip decode engine. It runs its own thread and hands
//! every decoded unit to a [`FrameDelivery`] target, which decides whether the frame is taken,
//! discarded as stale, or whether the decoder should stop delivering.

use std::fmt;
use std::sync::Arc;

use crate::foundation::core::{Fps, FrameRange};
use crate::foundation::error::ReelflowResult;
use crate::media::clip::{MediaKind, MediaSource};
use crate::settings::AudioFormat;

pub mod ffmpeg;
pub mod pump;
pub mod synthetic;

/// Shape of one decoded unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFormat {
    /// Tightly packed RGBA8 frames.
    Video { width: u32, height: u32 },
    /// Interleaved little-endian `f32` PCM, one tick worth per unit.
    Audio {
        format: AudioFormat,
        samples_per_tick: usize,
    },
}

impl StreamFormat {
    pub fn kind(self) -> MediaKind {
        match self {
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
        }
    }

    /// Byte length of one decoded unit.
    pub fn frame_len(self) -> usize {
        match self {
            Self::Video { width, height } => width as usize * height as usize * 4,
            Self::Audio {
                format,
                samples_per_tick,
            } => samples_per_tick * usize::from(format.channels) * 4,
        }
    }
}

/// Stamp carried by every delivered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// Source frame index.
    pub pts: i64,
    /// Seek generation the frame was decoded under.
    pub serial: u64,
}

/// Outcome of a frame handed to a [`FrameDelivery`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was written into the target buffer.
    Consumed,
    /// The frame predates the latest seek and was dropped.
    Discarded,
    /// The target is stopping or has nothing left to render. Deliver no more frames until
    /// the next seek or stop.
    Stop,
}

/// Receiving side of a decoder: the lock/unlock callback pair collapsed into one call.
///
/// `on_frame` may block the decoder thread until the target is ready for another frame.
/// `fill` is invoked at most once, with the target buffer, while the target holds its lock.
pub trait FrameDelivery: Send + Sync {
    fn on_frame(&self, info: FrameInfo, fill: &mut dyn FnMut(&mut [u8])) -> Delivery;
    /// The decoder ran past the end of its range while decoding under `serial`.
    fn on_end_reached(&self, serial: u64);
}

/// Typed decoder configuration.
#[derive(Clone)]
pub struct DecoderConfig {
    pub source: MediaSource,
    /// Source frames to play, half-open.
    pub range: FrameRange,
    pub fps: Fps,
    pub format: StreamFormat,
    /// Serial stamped on frames until the first seek.
    pub serial: u64,
    pub delivery: Arc<dyn FrameDelivery>,
}

impl fmt::Debug for DecoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderConfig")
            .field("source", &self.source)
            .field("range", &self.range)
            .field("fps", &self.fps)
            .field("format", &self.format)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Per-clip decode engine.
pub trait MediaDecoder: Send {
    /// Open the media and start the decoder thread, paused.
    fn open(&mut self, cfg: DecoderConfig) -> ReelflowResult<()>;
    fn play(&mut self) -> ReelflowResult<()>;
    fn pause(&mut self) -> ReelflowResult<()>;
    /// Seek to `position` in `[0, 1]` of the configured range. Frames decoded afterwards carry
    /// `serial`.
    fn seek(&mut self, position: f64, serial: u64) -> ReelflowResult<()>;
    /// Blocking and idempotent. No callbacks are delivered once this returns.
    fn stop(&mut self);
}

/// Creates one decoder per clip workflow.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, source: &MediaSource) -> ReelflowResult<Box<dyn MediaDecoder>>;
}

/// Dispatch on URI scheme: `synthetic://` sources go to the built-in test-pattern decoder,
/// everything else to the ffmpeg binding.
#[derive(Debug, Default)]
pub struct SchemeDecoderFactory {
    synthetic: synthetic::SyntheticDecoderFactory,
    ffmpeg: ffmpeg::FfmpegDecoderFactory,
}

impl SchemeDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecoderFactory for SchemeDecoderFactory {
    fn create(&self, source: &MediaSource) -> ReelflowResult<Box<dyn MediaDecoder>> {
        if source.uri.starts_with(synthetic::SCHEME) {
            self.synthetic.create(source)
        } else {
            self.ffmpeg.create(source)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decoder/mod.rs"]
mod tests;
