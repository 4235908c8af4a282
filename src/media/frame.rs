use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelflowError, ReelflowResult};

/// A video frame as RGBA8 pixels.
///
/// Frames leaving the mixer are opaque, so premultiplied and straight alpha coincide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Transparent frame of the given size.
    pub fn blank(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0; canvas.rgba_len()],
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> ReelflowResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ReelflowError::validation(format!(
                "rgba buffer has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Fill every pixel with the same RGBA value.
    pub fn fill(&mut self, px: [u8; 4]) {
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    /// Copy pixels from `src`, which must have the same size.
    pub fn copy_from(&mut self, src: &VideoFrame) -> ReelflowResult<()> {
        if self.width != src.width || self.height != src.height {
            return Err(ReelflowError::validation(format!(
                "frame size mismatch: {}x{} vs {}x{}",
                self.width, self.height, src.width, src.height
            )));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }
}

/// One tick worth of interleaved `f32` PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSample {
    pub sample_rate: u32,
    pub channels: u16,
    /// Source pts of the clip frame this sample came from.
    pub pts: i64,
    pub interleaved_f32: Vec<f32>,
}

impl AudioSample {
    /// Decode little-endian `f32` bytes as produced by audio decoders.
    pub fn from_le_bytes(sample_rate: u32, channels: u16, pts: i64, bytes: &[u8]) -> Self {
        let interleaved_f32 = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Self {
            sample_rate,
            channels,
            pts,
            interleaved_f32,
        }
    }
}

/// Synchronized per-tick output of the whole timeline.
#[derive(Clone, Debug)]
pub struct OutputBuffers {
    pub video: VideoFrame,
    pub audio: Option<AudioSample>,
}

#[cfg(test)]
#[path = "../../tests/unit/media/frame.rs"]
mod tests;
