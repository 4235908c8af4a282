use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::decoder::{DecoderConfig, Delivery, FrameInfo, MediaDecoder};
use crate::foundation::core::FrameRange;
use crate::foundation::error::{ReelflowError, ReelflowResult};

/// Sequential frame producer driven by a [`PumpDecoder`] thread.
pub trait FrameSource: Send + 'static {
    /// Position the source so the next read yields source frame `frame`.
    fn seek(&mut self, frame: u64) -> ReelflowResult<()>;
    /// Decode the next unit into `out`. Returns `false` at end of stream.
    fn read_frame(&mut self, out: &mut [u8]) -> ReelflowResult<bool>;
}

/// Opens a [`FrameSource`] for a decoder configuration.
pub type SourceOpener = fn(&DecoderConfig) -> ReelflowResult<Box<dyn FrameSource>>;

/// Calls made against decoders created by one factory.
#[derive(Clone, Debug, PartialEq)]
pub enum DecoderCall {
    Open { uri: String },
    Play { uri: String },
    Pause { uri: String },
    Seek { uri: String, position: f64, serial: u64 },
    Stop { uri: String },
}

impl DecoderCall {
    pub fn uri(&self) -> &str {
        match self {
            Self::Open { uri }
            | Self::Play { uri }
            | Self::Pause { uri }
            | Self::Seek { uri, .. }
            | Self::Stop { uri } => uri,
        }
    }
}

/// Shared, append-only record of decoder calls.
#[derive(Clone, Debug, Default)]
pub struct DecoderJournal {
    calls: Arc<Mutex<Vec<DecoderCall>>>,
}

impl DecoderJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: DecoderCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<DecoderCall> {
        self.calls.lock().clone()
    }

    pub fn opens(&self, uri: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DecoderCall::Open { uri: u } if u == uri))
            .count()
    }

    pub fn stops(&self, uri: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DecoderCall::Stop { uri: u } if u == uri))
            .count()
    }

    /// Seek positions requested for `uri`, in call order.
    pub fn seeks(&self, uri: &str) -> Vec<f64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                DecoderCall::Seek {
                    uri: u, position, ..
                } if u == uri => Some(*position),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[derive(Debug, Default)]
struct Control {
    playing: bool,
    stop: bool,
    seek: Option<(u64, u64)>,
}

#[derive(Debug, Default)]
struct ControlCell {
    state: Mutex<Control>,
    cond: Condvar,
}

impl ControlCell {
    fn update(&self, f: impl FnOnce(&mut Control)) {
        let mut c = self.state.lock();
        f(&mut c);
        self.cond.notify_all();
    }

    /// Block until a seek or stop is pending. Returns `false` on stop.
    fn wait_for_command(&self) -> bool {
        let mut c = self.state.lock();
        while !c.stop && c.seek.is_none() {
            self.cond.wait(&mut c);
        }
        !c.stop
    }
}

/// [`MediaDecoder`] that runs a [`FrameSource`] on a dedicated thread and pushes its frames
/// into the configured delivery target.
pub struct PumpDecoder {
    opener: SourceOpener,
    journal: Option<DecoderJournal>,
    uri: String,
    range: Option<FrameRange>,
    control: Arc<ControlCell>,
    worker: Option<JoinHandle<()>>,
}

impl PumpDecoder {
    pub fn new(opener: SourceOpener, journal: Option<DecoderJournal>) -> Self {
        Self {
            opener,
            journal,
            uri: String::new(),
            range: None,
            control: Arc::new(ControlCell::default()),
            worker: None,
        }
    }

    fn record(&self, call: DecoderCall) {
        if let Some(j) = &self.journal {
            j.record(call);
        }
    }

    fn open_range(&self) -> ReelflowResult<FrameRange> {
        self.range
            .ok_or_else(|| ReelflowError::state(format!("decoder for '{}' is not open", self.uri)))
    }
}

impl MediaDecoder for PumpDecoder {
    fn open(&mut self, cfg: DecoderConfig) -> ReelflowResult<()> {
        if self.worker.is_some() {
            return Err(ReelflowError::state(format!(
                "decoder for '{}' is already open",
                self.uri
            )));
        }
        self.uri = cfg.source.uri.clone();
        self.record(DecoderCall::Open {
            uri: self.uri.clone(),
        });

        let source = (self.opener)(&cfg)?;
        let control = Arc::new(ControlCell::default());
        let worker_control = Arc::clone(&control);
        let range = cfg.range;
        let worker = std::thread::Builder::new()
            .name("reelflow-decoder".to_string())
            .spawn(move || pump(source, cfg, &worker_control))
            .map_err(|e| ReelflowError::decoder(format!("failed to spawn decoder thread: {e}")))?;

        self.control = control;
        self.range = Some(range);
        self.worker = Some(worker);
        Ok(())
    }

    fn play(&mut self) -> ReelflowResult<()> {
        self.open_range()?;
        self.record(DecoderCall::Play {
            uri: self.uri.clone(),
        });
        self.control.update(|c| c.playing = true);
        Ok(())
    }

    fn pause(&mut self) -> ReelflowResult<()> {
        self.open_range()?;
        self.record(DecoderCall::Pause {
            uri: self.uri.clone(),
        });
        self.control.update(|c| c.playing = false);
        Ok(())
    }

    fn seek(&mut self, position: f64, serial: u64) -> ReelflowResult<()> {
        let range = self.open_range()?;
        if !position.is_finite() {
            return Err(ReelflowError::validation(format!(
                "seek position must be finite, got {position}"
            )));
        }
        self.record(DecoderCall::Seek {
            uri: self.uri.clone(),
            position,
            serial,
        });
        let offset = (position.clamp(0.0, 1.0) * range.len_frames() as f64).round() as u64;
        let target = range.start.0.saturating_add(offset).min(range.end.0);
        self.control.update(|c| c.seek = Some((target, serial)));
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.record(DecoderCall::Stop {
            uri: self.uri.clone(),
        });
        self.control.update(|c| {
            c.stop = true;
            c.seek = None;
        });
        if worker.join().is_err() {
            tracing::warn!(uri = %self.uri, "decoder thread panicked");
        }
        self.range = None;
    }
}

impl Drop for PumpDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump(mut source: Box<dyn FrameSource>, cfg: DecoderConfig, control: &ControlCell) {
    let begin = cfg.range.start.0;
    let end = cfg.range.end.0;
    let delivery = cfg.delivery;
    let mut scratch = vec![0u8; cfg.format.frame_len()];
    let mut serial = cfg.serial;
    let mut pos = begin;

    loop {
        let seek = {
            let mut c = control.state.lock();
            while !c.stop && c.seek.is_none() && !c.playing {
                control.cond.wait(&mut c);
            }
            if c.stop {
                return;
            }
            c.seek.take()
        };

        if let Some((target, s)) = seek {
            serial = s;
            pos = target;
            if let Err(e) = source.seek(pos) {
                tracing::warn!(uri = %cfg.source.uri, error = %e, "decoder seek failed");
                pos = end;
            }
            continue;
        }

        if pos >= end {
            delivery.on_end_reached(serial);
            if !control.wait_for_command() {
                return;
            }
            continue;
        }

        match source.read_frame(&mut scratch) {
            Ok(true) => {}
            Ok(false) => {
                pos = end;
                continue;
            }
            Err(e) => {
                tracing::warn!(uri = %cfg.source.uri, error = %e, "decoder read failed");
                pos = end;
                continue;
            }
        }

        let info = FrameInfo {
            pts: pos as i64,
            serial,
        };
        let mut fill = |buf: &mut [u8]| {
            let n = buf.len().min(scratch.len());
            buf[..n].copy_from_slice(&scratch[..n]);
        };
        match delivery.on_frame(info, &mut fill) {
            Delivery::Consumed => pos += 1,
            // A seek is already pending; it repositions the source.
            Delivery::Discarded => {}
            Delivery::Stop => {
                if !control.wait_for_command() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decoder/pump.rs"]
mod tests;
