use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::decoder::{DecoderFactory, StreamFormat};
use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::clip::{ClipId, MediaKind, SharedClip};
use crate::workflow::clip_workflow::{ClipOutput, ClipState, ClipWorkflow, GetMode};

/// Addresses one track of the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TrackRef {
    pub kind: MediaKind,
    pub index: u32,
}

impl TrackRef {
    pub fn video(index: u32) -> Self {
        Self {
            kind: MediaKind::Video,
            index,
        }
    }

    pub fn audio(index: u32) -> Self {
        Self {
            kind: MediaKind::Audio,
            index,
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MediaKind::Video => write!(f, "video#{}", self.index),
            MediaKind::Audio => write!(f, "audio#{}", self.index),
        }
    }
}

/// What a track did for one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackTick {
    /// Frame of the active clip, if it had one ready.
    pub output: Option<ClipOutput>,
    /// The track has no clip left at or after the current frame.
    pub end_reached: bool,
}

/// Per-tick role of a clip relative to the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipRole {
    Active,
    Upcoming,
    Inactive,
}

/// Construction parameters shared by every track of a session.
#[derive(Clone)]
pub struct TrackParams {
    pub factory: Arc<dyn DecoderFactory>,
    pub format: StreamFormat,
    pub fps: Fps,
    pub preload_window: u64,
    pub timeout: Duration,
}

/// Ordered, non-overlapping clips of one track, keyed by timeline start frame.
pub struct TrackWorkflow {
    track: TrackRef,
    params: TrackParams,
    clips: BTreeMap<u64, ClipWorkflow>,
    last_rendered_frame: u64,
    paused: bool,
}

/// Classify a clip starting at `start` with `length` frames against `current`.
///
/// A clip stays active through `start + length`, except on the frame where the next clip on
/// the track begins.
pub fn classify(
    start: u64,
    length: u64,
    current: u64,
    next_start: Option<u64>,
    preload_window: u64,
) -> ClipRole {
    if start <= current
        && current <= start.saturating_add(length)
        && next_start != Some(current)
    {
        ClipRole::Active
    } else if start > current && start - current < preload_window {
        ClipRole::Upcoming
    } else {
        ClipRole::Inactive
    }
}

impl TrackWorkflow {
    pub fn new(track: TrackRef, params: TrackParams) -> Self {
        Self {
            track,
            params,
            clips: BTreeMap::new(),
            last_rendered_frame: 0,
            paused: false,
        }
    }

    pub fn track(&self) -> TrackRef {
        self.track
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Timeline frame where the last clip ends.
    pub fn length(&self) -> u64 {
        self.clips
            .iter()
            .next_back()
            .map(|(start, cw)| start.saturating_add(cw.clip().read().length()))
            .unwrap_or(0)
    }

    pub fn clip_start(&self, id: ClipId) -> Option<u64> {
        self.clips
            .iter()
            .find(|(_, cw)| cw.id() == id)
            .map(|(start, _)| *start)
    }

    pub fn clip_state(&self, id: ClipId) -> Option<ClipState> {
        self.clips
            .values()
            .find(|cw| cw.id() == id)
            .map(ClipWorkflow::state)
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.clip_start(id).is_some()
    }

    /// Timeline interval covered by every clip except `skip`.
    fn occupied(&self, skip: Option<ClipId>) -> impl Iterator<Item = (ClipId, FrameRange)> + '_ {
        self.clips.iter().filter_map(move |(start, cw)| {
            if Some(cw.id()) == skip {
                return None;
            }
            let len = cw.clip().read().length();
            Some((
                cw.id(),
                FrameRange {
                    start: FrameIndex(*start),
                    end: FrameIndex(start.saturating_add(len)),
                },
            ))
        })
    }

    /// Timeline span of `length` frames from `start`. Rejects spans past the end of the
    /// frame counter.
    fn span(&self, start: u64, length: u64) -> ReelflowResult<FrameRange> {
        let end = start.checked_add(length).ok_or_else(|| {
            ReelflowError::validation(format!(
                "track {}: clip of {length} frames does not fit at {start}",
                self.track
            ))
        })?;
        Ok(FrameRange {
            start: FrameIndex(start),
            end: FrameIndex(end),
        })
    }

    fn check_free(&self, span: FrameRange, skip: Option<ClipId>) -> ReelflowResult<()> {
        if let Some((other, _)) = self.occupied(skip).find(|(_, r)| r.overlaps(span)) {
            return Err(ReelflowError::validation(format!(
                "track {}: [{}, {}) overlaps clip {other}",
                self.track, span.start.0, span.end.0
            )));
        }
        Ok(())
    }

    /// Place `clip` at timeline frame `start`. Rejects overlaps.
    pub fn add_clip(&mut self, clip: SharedClip, start: u64) -> ReelflowResult<()> {
        let (id, length) = {
            let c = clip.read();
            (c.id(), c.length())
        };
        if self.contains(id) {
            return Err(ReelflowError::validation(format!(
                "track {}: clip {id} is already placed",
                self.track
            )));
        }
        let span = self.span(start, length)?;
        self.check_free(span, None)?;

        let decoder = self.params.factory.create(clip.read().source())?;
        let cw = ClipWorkflow::new(
            clip,
            decoder,
            self.params.format,
            self.params.fps,
            self.params.timeout,
        );
        self.clips.insert(start, cw);
        tracing::debug!(track = %self.track, clip = %id, start, length, "clip added");
        Ok(())
    }

    /// Stop and detach a clip, returning its handle.
    pub fn remove_clip(&mut self, id: ClipId) -> ReelflowResult<SharedClip> {
        let start = self.clip_start(id).ok_or_else(|| {
            ReelflowError::validation(format!("track {}: no clip {id}", self.track))
        })?;
        let Some(mut cw) = self.clips.remove(&start) else {
            return Err(ReelflowError::validation(format!(
                "track {}: no clip {id}",
                self.track
            )));
        };
        self.stop_clip_workflow(&mut cw);
        tracing::debug!(track = %self.track, clip = %id, "clip removed");
        Ok(Arc::clone(cw.clip()))
    }

    /// Check that clip `id` can take `new_length` frames at its current start.
    pub fn check_resize(&self, id: ClipId, new_length: u64) -> ReelflowResult<()> {
        let Some(start) = self.clip_start(id) else {
            return Ok(());
        };
        let span = self.span(start, new_length)?;
        self.check_free(span, Some(id))
    }

    /// Trim clip `id` to `[begin, end)` source frames, keeping its timeline start.
    pub fn resize_clip(&mut self, id: ClipId, begin: u64, end: u64) -> ReelflowResult<()> {
        let clip = self.clip(id).ok_or_else(|| {
            ReelflowError::validation(format!("track {}: no clip {id}", self.track))
        })?;
        if begin >= end {
            return Err(ReelflowError::validation(format!(
                "clip {id}: begin {begin} must be before end {end}"
            )));
        }
        self.check_resize(id, end - begin)?;
        clip.write().set_boundaries(begin, end)?;
        self.clip_resized(id);
        tracing::debug!(track = %self.track, clip = %id, begin, end, "clip resized");
        Ok(())
    }

    pub fn clip(&self, id: ClipId) -> Option<SharedClip> {
        self.clips
            .values()
            .find(|cw| cw.id() == id)
            .map(|cw| Arc::clone(cw.clip()))
    }

    /// Bounds of clip `id` changed. A live workflow is stopped so the next tick reopens it
    /// with the new range.
    pub fn clip_resized(&mut self, id: ClipId) {
        if let Some(cw) = self.clips.values_mut().find(|cw| cw.id() == id) {
            stop_workflow(self.track, cw);
        }
    }

    /// True iff the track is empty or its last clip ends before `current`.
    pub fn check_end(&self, current: u64) -> bool {
        match self.clips.iter().next_back() {
            None => true,
            Some((start, cw)) => start.saturating_add(cw.clip().read().length()) < current,
        }
    }

    /// Compute this track's contribution to the tick at `current`.
    #[tracing::instrument(level = "trace", skip(self), fields(track = %self.track))]
    pub fn get_output(&mut self, current: u64) -> TrackTick {
        let end_reached = self.check_end(current);
        let need_repositioning = current.abs_diff(self.last_rendered_frame) > 1;
        let preload_window = self.params.preload_window;
        let track = self.track;
        let paused = self.paused;

        let starts: Vec<u64> = self.clips.keys().copied().collect();
        let mut output = None;
        for (i, &start) in starts.iter().enumerate() {
            let next_start = starts.get(i + 1).copied();
            let Some(cw) = self.clips.get_mut(&start) else {
                continue;
            };
            let length = cw.clip().read().length();
            match classify(start, length, current, next_start, preload_window) {
                ClipRole::Active => {
                    output = render_clip(track, cw, current, start, need_repositioning, paused);
                    self.last_rendered_frame = current;
                }
                ClipRole::Upcoming => preload_clip(track, cw),
                ClipRole::Inactive => stop_workflow(track, cw),
            }
        }
        TrackTick {
            output,
            end_reached,
        }
    }

    /// Idempotent teardown of one clip workflow.
    pub fn stop_clip_workflow(&self, cw: &mut ClipWorkflow) {
        stop_workflow(self.track, cw);
    }

    pub fn stop(&mut self) {
        let track = self.track;
        for cw in self.clips.values_mut() {
            stop_workflow(track, cw);
        }
        self.last_rendered_frame = 0;
        self.paused = false;
    }

    /// Hold the active clip on its current frame. Clips that are still opening or rendering
    /// are paused as soon as their frame is ready.
    pub fn pause(&mut self) {
        self.paused = true;
        for cw in self.clips.values_mut() {
            if let Err(e) = cw.pause() {
                tracing::warn!(track = %self.track, clip = %cw.id(), error = %e, "pause failed");
            }
        }
    }

    pub fn unpause(&mut self) {
        self.paused = false;
        for cw in self.clips.values_mut() {
            if let Err(e) = cw.unpause() {
                tracing::warn!(track = %self.track, clip = %cw.id(), error = %e, "unpause failed");
            }
        }
    }
}

fn position(current: u64, start: u64, length: u64) -> f64 {
    (current - start) as f64 / length as f64
}

fn render_clip(
    track: TrackRef,
    cw: &mut ClipWorkflow,
    current: u64,
    start: u64,
    need_repositioning: bool,
    paused: bool,
) -> Option<ClipOutput> {
    match try_render_clip(cw, current, start, need_repositioning, paused) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(track = %track, clip = %cw.id(), frame = current, error = %e, "clip produced no frame");
            None
        }
    }
}

fn try_render_clip(
    cw: &mut ClipWorkflow,
    current: u64,
    start: u64,
    need_repositioning: bool,
    paused: bool,
) -> ReelflowResult<Option<ClipOutput>> {
    let length = cw.clip().read().length();
    let mut state = cw.state();
    if state == ClipState::Rendering {
        state = cw.wait_while_rendering()?;
    }
    match state {
        ClipState::Sleeping => serve_sleeping(cw, current, start, need_repositioning, paused),
        ClipState::Paused if paused && !need_repositioning => {
            Ok(Some(cw.get_output(GetMode::Get)?))
        }
        ClipState::Paused => {
            cw.unpause()?;
            serve_sleeping(cw, current, start, need_repositioning, paused)
        }
        ClipState::Stopped => {
            cw.initialize()?;
            cw.start_render();
            if start != current {
                cw.set_position(position(current, start, length))?;
            }
            Ok(None)
        }
        ClipState::Ready | ClipState::Initializing => {
            cw.start_render();
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Read the frame of a sleeping clip. While the track is paused the clip is paused first and
/// the frame is kept for the next tick.
fn serve_sleeping(
    cw: &mut ClipWorkflow,
    current: u64,
    start: u64,
    need_repositioning: bool,
    paused: bool,
) -> ReelflowResult<Option<ClipOutput>> {
    if need_repositioning {
        let length = cw.clip().read().length();
        cw.set_position(position(current, start, length))?;
    }
    // The seek may have run the clip to its end.
    if cw.state() != ClipState::Sleeping {
        return Ok(None);
    }
    if paused {
        cw.pause()?;
        return Ok(Some(cw.get_output(GetMode::Get)?));
    }
    let out = cw.get_output(GetMode::Pop)?;
    cw.wake();
    Ok(Some(out))
}

fn preload_clip(track: TrackRef, cw: &mut ClipWorkflow) {
    if cw.state() != ClipState::Stopped {
        return;
    }
    if let Err(e) = cw.initialize() {
        tracing::warn!(track = %track, clip = %cw.id(), error = %e, "preload failed");
    }
}

fn stop_workflow(track: TrackRef, cw: &mut ClipWorkflow) {
    let waited = match cw.state() {
        ClipState::Stopped | ClipState::None => return,
        ClipState::Sleeping | ClipState::Ready | ClipState::EndReached | ClipState::Paused => {
            Ok(())
        }
        ClipState::Rendering => cw.wait_while_rendering().map(|_| ()),
        ClipState::Initializing => cw.wait_for_complete_init().map(|_| ()),
        ClipState::Stopping | ClipState::PauseRequired | ClipState::UnpauseRequired => Ok(()),
    };
    if let Err(e) = waited {
        tracing::warn!(track = %track, clip = %cw.id(), error = %e, "stopping clip without waiting");
    }
    cw.query_state_change(ClipState::Stopping);
    cw.wake();
    cw.stop();
}

#[cfg(test)]
#[path = "../../tests/unit/workflow/track_workflow.rs"]
mod tests;
