use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::decoder::{
    DecoderConfig, Delivery, FrameDelivery, FrameInfo, MediaDecoder, StreamFormat,
};
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::clip::{ClipId, SharedClip};

/// Lifecycle of one clip's decode pipeline.
///
/// `Stopped -> Initializing -> Ready -> Rendering -> Sleeping <-> Paused`, with `Stopping` and
/// `EndReached` on the way out. `PauseRequired`/`UnpauseRequired` only exist while the decoder
/// is being told to pause or resume. `None` marks a workflow that has been torn down for good.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClipState {
    None,
    Stopped,
    Initializing,
    Ready,
    Rendering,
    Sleeping,
    Stopping,
    EndReached,
    PauseRequired,
    Paused,
    UnpauseRequired,
}

/// How [`ClipWorkflow::get_output`] treats the current buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetMode {
    /// Consume the frame and let a sleeping clip compute the next one.
    Pop,
    /// Read the frame without consuming it.
    Get,
}

/// One decoded unit copied out of a clip workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipOutput {
    pub pts: i64,
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct Slot {
    state: ClipState,
    required: Option<ClipState>,
    start_requested: bool,
    serial: u64,
    buffer: Vec<u8>,
    buffer_serial: u64,
    previous_pts: i64,
    current_pts: i64,
}

/// State shared with the decoder thread. All transitions happen under `slot`'s lock and are
/// announced on `cond`.
#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl FrameDelivery for Shared {
    fn on_frame(&self, info: FrameInfo, fill: &mut dyn FnMut(&mut [u8])) -> Delivery {
        let mut s = self.slot.lock();
        loop {
            if info.serial < s.serial {
                return Delivery::Discarded;
            }
            match s.state {
                ClipState::Initializing => {
                    s.state = if s.start_requested {
                        ClipState::Rendering
                    } else {
                        ClipState::Ready
                    };
                    s.start_requested = false;
                    self.cond.notify_all();
                }
                ClipState::Rendering => {
                    fill(&mut s.buffer);
                    s.buffer_serial = info.serial;
                    s.previous_pts = s.current_pts;
                    s.current_pts = info.pts;
                    s.state = s.required.take().unwrap_or(ClipState::Sleeping);
                    self.cond.notify_all();
                    return Delivery::Consumed;
                }
                ClipState::Ready
                | ClipState::Sleeping
                | ClipState::PauseRequired
                | ClipState::Paused
                | ClipState::UnpauseRequired => self.cond.wait(&mut s),
                ClipState::Stopping
                | ClipState::Stopped
                | ClipState::EndReached
                | ClipState::None => return Delivery::Stop,
            }
        }
    }

    fn on_end_reached(&self, serial: u64) {
        let mut s = self.slot.lock();
        loop {
            if serial < s.serial {
                return;
            }
            match s.state {
                // The last frame has not been consumed yet.
                ClipState::Initializing
                | ClipState::Ready
                | ClipState::Sleeping
                | ClipState::PauseRequired
                | ClipState::Paused
                | ClipState::UnpauseRequired => self.cond.wait(&mut s),
                ClipState::Rendering => {
                    s.state = ClipState::EndReached;
                    self.cond.notify_all();
                    return;
                }
                _ => return,
            }
        }
    }
}

/// Drives one clip's decoder and holds the single frame it produces per render cycle.
pub struct ClipWorkflow {
    id: ClipId,
    clip: SharedClip,
    format: StreamFormat,
    fps: Fps,
    timeout: Duration,
    decoder: Box<dyn MediaDecoder>,
    shared: Arc<Shared>,
}

impl ClipWorkflow {
    pub fn new(
        clip: SharedClip,
        decoder: Box<dyn MediaDecoder>,
        format: StreamFormat,
        fps: Fps,
        timeout: Duration,
    ) -> Self {
        let id = clip.read().id();
        Self {
            id,
            clip,
            format,
            fps,
            timeout,
            decoder,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: ClipState::Stopped,
                    required: None,
                    start_requested: false,
                    serial: 0,
                    buffer: vec![0; format.frame_len()],
                    buffer_serial: 0,
                    previous_pts: -1,
                    current_pts: -1,
                }),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn clip(&self) -> &SharedClip {
        &self.clip
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn state(&self) -> ClipState {
        self.shared.slot.lock().state
    }

    pub fn is_end_reached(&self) -> bool {
        self.state() == ClipState::EndReached
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ClipState::Stopped
    }

    pub fn is_rendering(&self) -> bool {
        self.state() == ClipState::Rendering
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ClipState::Ready
    }

    /// Pts distance between the last two delivered frames.
    pub fn pts_diff(&self) -> i64 {
        let s = self.shared.slot.lock();
        if s.previous_pts < 0 {
            return 0;
        }
        s.current_pts - s.previous_pts
    }

    /// Open the decoder and start it. Valid only from `Stopped`.
    ///
    /// On failure the workflow is back in `Stopped` and the decoder is closed.
    pub fn initialize(&mut self) -> ReelflowResult<()> {
        let serial = {
            let mut s = self.shared.slot.lock();
            if s.state != ClipState::Stopped {
                return Err(ReelflowError::state(format!(
                    "clip {}: initialize from {:?}",
                    self.id, s.state
                )));
            }
            s.state = ClipState::Initializing;
            s.required = None;
            s.start_requested = false;
            s.serial += 1;
            s.previous_pts = -1;
            s.current_pts = -1;
            self.shared.cond.notify_all();
            s.serial
        };

        let cfg = {
            let clip = self.clip.read();
            DecoderConfig {
                source: clip.source().clone(),
                range: clip.bounds(),
                fps: self.fps,
                format: self.format,
                serial,
                delivery: self.shared.clone(),
            }
        };
        let opened = self.decoder.open(cfg).and_then(|()| self.decoder.play());
        if let Err(e) = opened {
            self.decoder.stop();
            let mut s = self.shared.slot.lock();
            s.state = ClipState::Stopped;
            self.shared.cond.notify_all();
            tracing::warn!(clip = %self.id, error = %e, "clip decoder failed to open");
            return Err(e);
        }
        tracing::debug!(clip = %self.id, "clip initializing");
        Ok(())
    }

    /// `Ready -> Rendering`. From `Initializing` the request is kept and applied when the first
    /// frame arrives.
    pub fn start_render(&self) {
        let mut s = self.shared.slot.lock();
        match s.state {
            ClipState::Ready => {
                s.state = ClipState::Rendering;
                self.shared.cond.notify_all();
            }
            ClipState::Initializing => s.start_requested = true,
            other => tracing::debug!(clip = %self.id, state = ?other, "start_render ignored"),
        }
    }

    /// Copy out the current frame. Requires `Sleeping` or `Paused`.
    pub fn get_output(&self, mode: GetMode) -> ReelflowResult<ClipOutput> {
        let mut s = self.shared.slot.lock();
        if !matches!(s.state, ClipState::Sleeping | ClipState::Paused) {
            return Err(ReelflowError::state(format!(
                "clip {}: output read while {:?}",
                self.id, s.state
            )));
        }
        let out = ClipOutput {
            pts: s.current_pts,
            data: s.buffer.clone(),
        };
        if mode == GetMode::Pop && s.state == ClipState::Sleeping {
            s.state = s.required.take().unwrap_or(ClipState::Rendering);
            self.shared.cond.notify_all();
        }
        Ok(out)
    }

    /// Apply a pending state request. Without one this only wakes the decoder thread; a
    /// sleeping clip keeps its frame until it is popped.
    pub fn wake(&self) {
        let mut s = self.shared.slot.lock();
        if let Some(required) = s.required.take() {
            s.state = required;
        }
        self.shared.cond.notify_all();
    }

    /// Record a state to enter on the next [`wake`](Self::wake) or frame delivery.
    pub fn query_state_change(&self, state: ClipState) {
        self.shared.slot.lock().required = Some(state);
    }

    /// Seek to `position` within the clip. Waits out `Rendering` first.
    ///
    /// A sleeping clip discards its pre-seek frame and this call returns once the frame at the
    /// new position is ready.
    pub fn set_position(&mut self, position: f64) -> ReelflowResult<()> {
        self.wait_until("finish rendering before seek", |st| st != ClipState::Rendering)?;
        let serial = {
            let s = self.shared.slot.lock();
            match s.state {
                ClipState::Initializing
                | ClipState::Ready
                | ClipState::Sleeping
                | ClipState::Paused => s.serial + 1,
                other => {
                    return Err(ReelflowError::state(format!(
                        "clip {}: seek while {other:?}",
                        self.id
                    )));
                }
            }
        };
        self.decoder.seek(position, serial)?;

        let refresh = {
            let mut s = self.shared.slot.lock();
            s.serial = serial;
            let refresh = s.state == ClipState::Sleeping && s.buffer_serial < serial;
            if refresh {
                s.state = ClipState::Rendering;
            }
            self.shared.cond.notify_all();
            refresh
        };
        tracing::debug!(clip = %self.id, position, serial, "clip seek");
        if refresh {
            self.wait_until("render after seek", |st| st != ClipState::Rendering)?;
        }
        Ok(())
    }

    /// Seek to `frame` frames past the clip's begin.
    pub fn set_time(&mut self, frame: u64) -> ReelflowResult<()> {
        let length = self.clip.read().length();
        self.set_position(frame as f64 / length as f64)
    }

    /// Pause a sleeping clip. Its current frame stays readable with [`GetMode::Get`].
    pub fn pause(&mut self) -> ReelflowResult<()> {
        self.wait_until("finish rendering before pause", |st| {
            st != ClipState::Rendering
        })?;
        {
            let mut s = self.shared.slot.lock();
            if s.state != ClipState::Sleeping {
                return Ok(());
            }
            s.state = ClipState::PauseRequired;
        }
        let res = self.decoder.pause();
        let mut s = self.shared.slot.lock();
        if s.state == ClipState::PauseRequired {
            s.state = ClipState::Paused;
        }
        self.shared.cond.notify_all();
        res
    }

    pub fn unpause(&mut self) -> ReelflowResult<()> {
        {
            let mut s = self.shared.slot.lock();
            if s.state != ClipState::Paused {
                return Ok(());
            }
            s.state = ClipState::UnpauseRequired;
        }
        let res = self.decoder.play();
        let mut s = self.shared.slot.lock();
        if s.state == ClipState::UnpauseRequired {
            s.state = ClipState::Sleeping;
        }
        self.shared.cond.notify_all();
        res
    }

    /// Block until the first frame has been decoded.
    pub fn wait_for_complete_init(&self) -> ReelflowResult<ClipState> {
        self.wait_until("complete initialization", |st| {
            st != ClipState::Initializing
        })
    }

    pub fn wait_while_rendering(&self) -> ReelflowResult<ClipState> {
        self.wait_until("finish rendering", |st| st != ClipState::Rendering)
    }

    /// Tear the decoder down and return to `Stopped`. Blocking and idempotent.
    pub fn stop(&mut self) {
        {
            let mut s = self.shared.slot.lock();
            if matches!(s.state, ClipState::Stopped | ClipState::None) {
                return;
            }
            s.state = ClipState::Stopping;
            s.required = None;
            s.start_requested = false;
            self.shared.cond.notify_all();
        }
        self.decoder.stop();
        let mut s = self.shared.slot.lock();
        s.state = ClipState::Stopped;
        s.previous_pts = -1;
        s.current_pts = -1;
        self.shared.cond.notify_all();
        tracing::debug!(clip = %self.id, "clip stopped");
    }

    fn wait_until(
        &self,
        what: &str,
        done: impl Fn(ClipState) -> bool,
    ) -> ReelflowResult<ClipState> {
        let deadline = Instant::now() + self.timeout;
        let mut s = self.shared.slot.lock();
        while !done(s.state) {
            if self.shared.cond.wait_until(&mut s, deadline).timed_out() && !done(s.state) {
                return Err(ReelflowError::timeout(format!(
                    "clip {}: {what} (stuck in {:?} after {:?})",
                    self.id, s.state, self.timeout
                )));
            }
        }
        Ok(s.state)
    }
}

impl Drop for ClipWorkflow {
    fn drop(&mut self) {
        self.stop();
        self.shared.slot.lock().state = ClipState::None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/workflow/clip_workflow.rs"]
mod tests;
