//! Deterministic test-pattern decoder.
//!
//! `synthetic://<name>` sources decode to solid frames whose red/green channels are derived
//! from the URI and whose blue channel is the low byte of the pts. Audio units carry the pts
//! as every sample value. URIs whose name starts with `fail` refuse to open.

use crate::decoder::pump::{DecoderJournal, FrameSource, PumpDecoder};
use crate::decoder::{DecoderConfig, DecoderFactory, MediaDecoder, StreamFormat};
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::foundation::math::Fnv1a64;
use crate::media::clip::MediaSource;

pub const SCHEME: &str = "synthetic://";

/// Pixel a synthetic video source produces for `pts`.
pub fn pixel_for(uri: &str, pts: i64) -> [u8; 4] {
    let mut h = Fnv1a64::new_default();
    h.write_bytes(uri.as_bytes());
    let seed = h.finish().to_le_bytes();
    [seed[0], seed[1], pts as u8, 255]
}

struct SyntheticSource {
    uri: String,
    format: StreamFormat,
    next: u64,
}

impl SyntheticSource {
    fn open(cfg: &DecoderConfig) -> ReelflowResult<Box<dyn FrameSource>> {
        let Some(name) = cfg.source.uri.strip_prefix(SCHEME) else {
            return Err(ReelflowError::decoder(format!(
                "'{}' is not a synthetic source",
                cfg.source.uri
            )));
        };
        if name.starts_with("fail") {
            return Err(ReelflowError::decoder(format!(
                "cannot open '{}'",
                cfg.source.uri
            )));
        }
        Ok(Box::new(Self {
            uri: cfg.source.uri.clone(),
            format: cfg.format,
            next: cfg.range.start.0,
        }))
    }
}

impl FrameSource for SyntheticSource {
    fn seek(&mut self, frame: u64) -> ReelflowResult<()> {
        self.next = frame;
        Ok(())
    }

    fn read_frame(&mut self, out: &mut [u8]) -> ReelflowResult<bool> {
        let pts = self.next as i64;
        match self.format {
            StreamFormat::Video { .. } => {
                let px = pixel_for(&self.uri, pts);
                for d in out.chunks_exact_mut(4) {
                    d.copy_from_slice(&px);
                }
            }
            StreamFormat::Audio { .. } => {
                let v = (pts as f32).to_le_bytes();
                for d in out.chunks_exact_mut(4) {
                    d.copy_from_slice(&v);
                }
            }
        }
        self.next += 1;
        Ok(true)
    }
}

/// Factory for synthetic decoders. Every decoder it creates records its calls in one journal.
#[derive(Clone, Debug, Default)]
pub struct SyntheticDecoderFactory {
    journal: DecoderJournal,
}

impl SyntheticDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> DecoderJournal {
        self.journal.clone()
    }
}

impl DecoderFactory for SyntheticDecoderFactory {
    fn create(&self, _source: &MediaSource) -> ReelflowResult<Box<dyn MediaDecoder>> {
        Ok(Box::new(PumpDecoder::new(
            SyntheticSource::open,
            Some(self.journal.clone()),
        )))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decoder/synthetic.rs"]
mod tests;
