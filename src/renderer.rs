//! Bridge between the session's synchronous tick and a push-style playback surface.
//!
//! The surface calls [`RenderCallbacks::lock`] on its driver thread to pull one composed frame
//! and [`RenderCallbacks::unlock`] right after, which is where queued edits are applied. Edits
//! issued through [`WorkflowRenderer`] while playback runs are queued; otherwise they apply at
//! once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;

use parking_lot::Mutex;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::ReelflowResult;
use crate::media::clip::{ClipId, SharedClip};
use crate::media::frame::{AudioSample, VideoFrame};
use crate::surface::sink::SinkConfig;
use crate::surface::{PlaybackSurface, RenderCallbacks};
use crate::workflow::action::{Action, ActionQueue};
use crate::workflow::events::{FrameChangedReason, PlaybackEvent};
use crate::workflow::main_workflow::MainWorkflow;
use crate::workflow::track_workflow::TrackRef;

/// The callback side registered with the surface.
struct RenderBridge {
    main: Arc<Mutex<MainWorkflow>>,
    actions: Arc<ActionQueue>,
    stopping: AtomicBool,
    audio: Mutex<Option<AudioSample>>,
}

impl RenderCallbacks for RenderBridge {
    fn lock(&self, out: &mut VideoFrame) -> ReelflowResult<Option<FrameIndex>> {
        if self.stopping.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut main = self.main.lock();
        let frame = main.current_frame();
        let buffers = main.get_synchrone_output()?;
        out.copy_from(&buffers.video)?;
        *self.audio.lock() = buffers.audio.clone();
        Ok(Some(FrameIndex(frame)))
    }

    fn unlock(&self) {
        let mut main = self.main.lock();
        self.actions.apply_all(&mut main);
    }

    /// At the end of the timeline the session stops and rewinds on the driver thread, so
    /// edits apply directly again and a new preview can start.
    fn finished(&self) -> bool {
        let mut main = self.main.lock();
        if !main.is_end_reached() {
            return false;
        }
        main.stop();
        self.actions.apply_all(&mut main);
        true
    }
}

/// Transport and edit front-end of a playback session.
pub struct WorkflowRenderer<S: PlaybackSurface> {
    main: Arc<Mutex<MainWorkflow>>,
    actions: Arc<ActionQueue>,
    bridge: Arc<RenderBridge>,
    surface: S,
    fps: Option<Fps>,
    paused: bool,
}

impl<S: PlaybackSurface> WorkflowRenderer<S> {
    pub fn new(main: MainWorkflow, surface: S) -> Self {
        let main = Arc::new(Mutex::new(main));
        let actions = Arc::new(ActionQueue::new());
        let bridge = Arc::new(RenderBridge {
            main: Arc::clone(&main),
            actions: Arc::clone(&actions),
            stopping: AtomicBool::new(false),
            audio: Mutex::new(None),
        });
        Self {
            main,
            actions,
            bridge,
            surface,
            fps: None,
            paused: false,
        }
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.main.lock().subscribe()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn actions(&self) -> &ActionQueue {
        &self.actions
    }

    /// Start playback from the current frame. Does nothing on an empty timeline.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn start_preview(&mut self) -> ReelflowResult<()> {
        let cfg = {
            let mut main = self.main.lock();
            if main.is_rendering() {
                return Ok(());
            }
            if main.length_frames() == 0 {
                tracing::debug!("nothing to preview");
                return Ok(());
            }
            let settings = main.settings();
            let fps = settings.output_fps;
            let cfg = SinkConfig {
                width: settings.canvas.width,
                height: settings.canvas.height,
                fps,
                audio: (settings.audio_tracks > 0).then_some(settings.audio),
            };
            main.start_render()?;
            self.fps = Some(fps);
            cfg
        };

        // A session that ran to its end leaves an exited driver behind.
        if let Err(e) = self.surface.join() {
            tracing::warn!(error = %e, "previous playback ended with error");
        }
        self.paused = false;
        self.bridge.stopping.store(false, Ordering::Release);
        let callbacks: Arc<dyn RenderCallbacks> = self.bridge.clone();
        if let Err(e) = self.surface.play(callbacks, cfg) {
            self.main.lock().stop();
            return Err(e);
        }
        Ok(())
    }

    /// Start playback, or flip between paused and playing. `force_pause` only ever pauses.
    pub fn toggle_play_pause(&mut self, force_pause: bool) -> ReelflowResult<()> {
        if !self.is_rendering() {
            if !force_pause {
                self.start_preview()?;
            }
            return Ok(());
        }
        if self.paused && !force_pause {
            self.actions.push(Action::Unpause);
            self.paused = false;
        } else if !self.paused {
            self.actions.push(Action::Pause);
            self.paused = true;
        }
        Ok(())
    }

    /// Stop playback and rewind. Blocks until the surface's driver thread has exited.
    pub fn stop(&mut self) -> ReelflowResult<()> {
        self.bridge.stopping.store(true, Ordering::Release);
        let surface = self.surface.stop();

        let mut main = self.main.lock();
        main.stop();
        // Edits queued after the last tick still apply.
        self.actions.apply_all(&mut main);
        self.paused = false;
        surface
    }

    /// Wait for playback to run to its end, then stop.
    pub fn wait_for_end(&mut self) -> ReelflowResult<()> {
        let joined = self.surface.join();
        let stopped = self.stop();
        joined.and(stopped)
    }

    pub fn next_frame(&self) {
        let mut main = self.main.lock();
        if !main.is_rendering() || self.paused {
            main.next_frame();
        }
    }

    pub fn previous_frame(&self) {
        let mut main = self.main.lock();
        if !main.is_rendering() || self.paused {
            main.previous_frame();
        }
    }

    fn edit(&self, action: Action) -> ReelflowResult<()> {
        let mut main = self.main.lock();
        if main.is_rendering() {
            self.actions.push(action);
            return Ok(());
        }
        action.apply(&mut main)
    }

    pub fn add_clip(&self, track: TrackRef, clip: SharedClip, start: u64) -> ReelflowResult<()> {
        self.edit(Action::AddClip { track, clip, start })
    }

    pub fn remove_clip(&self, track: TrackRef, clip: ClipId) -> ReelflowResult<()> {
        self.edit(Action::RemoveClip { track, clip })
    }

    pub fn resize_clip(
        &self,
        track: TrackRef,
        clip: ClipId,
        begin: u64,
        end: u64,
    ) -> ReelflowResult<()> {
        self.edit(Action::ResizeClip {
            track,
            clip,
            begin,
            end,
        })
    }

    /// Cut `clip` at source frame `new_clip_begin`. The right half becomes a new clip placed at
    /// timeline frame `new_clip_pos` and is returned.
    ///
    /// While playing, the cut is queued as one action: if the right half cannot be placed, the
    /// original clip keeps its end.
    pub fn split(
        &self,
        clip: &SharedClip,
        track: TrackRef,
        new_clip_pos: u64,
        new_clip_begin: u64,
    ) -> ReelflowResult<SharedClip> {
        let (id, right) = {
            let c = clip.read();
            let right = c.split_off(new_clip_begin, c.end())?;
            (c.id(), right.into_shared())
        };
        self.edit(Action::SplitClip {
            track,
            clip: id,
            at: new_clip_begin,
            right: Arc::clone(&right),
            start: new_clip_pos,
        })?;
        Ok(right)
    }

    /// Undo a split: drop `split` and give `origin` back its end.
    pub fn unsplit(
        &self,
        origin: ClipId,
        split: ClipId,
        track: TrackRef,
        old_end: u64,
    ) -> ReelflowResult<()> {
        self.edit(Action::UnsplitClip {
            track,
            origin,
            split,
            old_end,
        })
    }

    /// Move the playhead from a cursor of the edit surface.
    pub fn set_current_frame(&self, frame: u64, origin: FrameChangedReason) {
        let mut main = self.main.lock();
        if main.is_rendering() {
            self.actions.push(Action::SetCurrentFrame {
                frame,
                reason: origin,
            });
        } else {
            main.set_current_frame(frame, origin);
        }
    }

    pub fn current_frame(&self) -> u64 {
        self.main.lock().current_frame()
    }

    /// Output fps of the running preview, or the configured one when stopped.
    pub fn fps(&self) -> Fps {
        self.fps.unwrap_or_else(|| self.main.lock().fps())
    }

    pub fn length_ms(&self) -> u64 {
        let length = self.main.lock().length_frames();
        self.fps().frames_to_millis(length)
    }

    pub fn is_rendering(&self) -> bool {
        self.main.lock().is_rendering()
    }

    pub fn is_paused(&self) -> bool {
        self.main.lock().is_paused()
    }

    /// Audio paired with the last displayed frame.
    pub fn last_audio_sample(&self) -> Option<AudioSample> {
        self.bridge.audio.lock().clone()
    }
}

impl<S: PlaybackSurface> Drop for WorkflowRenderer<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "renderer stopped with error");
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/renderer.rs"]
mod tests;
