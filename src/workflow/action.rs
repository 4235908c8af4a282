use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::foundation::error::ReelflowResult;
use crate::media::clip::{ClipId, SharedClip};
use crate::workflow::events::FrameChangedReason;
use crate::workflow::main_workflow::MainWorkflow;
use crate::workflow::track_workflow::TrackRef;

/// A structural edit deferred until the render thread is between ticks.
#[derive(Clone)]
pub enum Action {
    AddClip {
        track: TrackRef,
        clip: SharedClip,
        start: u64,
    },
    RemoveClip {
        track: TrackRef,
        clip: ClipId,
    },
    ResizeClip {
        track: TrackRef,
        clip: ClipId,
        begin: u64,
        end: u64,
    },
    /// Cut `clip` at source frame `at` and place the right half `right` at `start`.
    SplitClip {
        track: TrackRef,
        clip: ClipId,
        at: u64,
        right: SharedClip,
        start: u64,
    },
    UnsplitClip {
        track: TrackRef,
        origin: ClipId,
        split: ClipId,
        old_end: u64,
    },
    Pause,
    Unpause,
    SetCurrentFrame {
        frame: u64,
        reason: FrameChangedReason,
    },
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddClip { track, clip, start } => f
                .debug_struct("AddClip")
                .field("track", track)
                .field("clip", &clip.read().id())
                .field("start", start)
                .finish(),
            Self::RemoveClip { track, clip } => f
                .debug_struct("RemoveClip")
                .field("track", track)
                .field("clip", clip)
                .finish(),
            Self::ResizeClip {
                track,
                clip,
                begin,
                end,
            } => f
                .debug_struct("ResizeClip")
                .field("track", track)
                .field("clip", clip)
                .field("begin", begin)
                .field("end", end)
                .finish(),
            Self::SplitClip {
                track,
                clip,
                at,
                right,
                start,
            } => f
                .debug_struct("SplitClip")
                .field("track", track)
                .field("clip", clip)
                .field("at", at)
                .field("right", &right.read().id())
                .field("start", start)
                .finish(),
            Self::UnsplitClip {
                track,
                origin,
                split,
                old_end,
            } => f
                .debug_struct("UnsplitClip")
                .field("track", track)
                .field("origin", origin)
                .field("split", split)
                .field("old_end", old_end)
                .finish(),
            Self::Pause => f.write_str("Pause"),
            Self::Unpause => f.write_str("Unpause"),
            Self::SetCurrentFrame { frame, reason } => f
                .debug_struct("SetCurrentFrame")
                .field("frame", frame)
                .field("reason", reason)
                .finish(),
        }
    }
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddClip { .. } => "add_clip",
            Self::RemoveClip { .. } => "remove_clip",
            Self::ResizeClip { .. } => "resize_clip",
            Self::SplitClip { .. } => "split_clip",
            Self::UnsplitClip { .. } => "unsplit_clip",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::SetCurrentFrame { .. } => "set_current_frame",
        }
    }

    /// Execute against the session. A failing action leaves the session unchanged.
    pub fn apply(self, main: &mut MainWorkflow) -> ReelflowResult<()> {
        match self {
            Self::AddClip { track, clip, start } => main.add_clip(track, clip, start),
            Self::RemoveClip { track, clip } => main.remove_clip(track, clip).map(|_| ()),
            Self::ResizeClip {
                track,
                clip,
                begin,
                end,
            } => main.resize_clip(track, clip, begin, end),
            Self::SplitClip {
                track,
                clip,
                at,
                right,
                start,
            } => main.split_clip(track, clip, at, right, start),
            Self::UnsplitClip {
                track,
                origin,
                split,
                old_end,
            } => main.unsplit_clip(track, origin, split, old_end),
            Self::Pause => {
                main.pause();
                Ok(())
            }
            Self::Unpause => {
                main.unpause();
                Ok(())
            }
            Self::SetCurrentFrame { frame, reason } => {
                main.set_current_frame(frame, reason);
                Ok(())
            }
        }
    }
}

/// FIFO of deferred edits. Producers push from any thread; the render thread drains it once
/// per tick.
#[derive(Debug, Default)]
pub struct ActionQueue {
    queue: Mutex<VecDeque<Action>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: Action) {
        tracing::debug!(action = action.kind(), "action queued");
        self.queue.lock().push_back(action);
    }

    /// Enqueue several actions with no other producer interleaving.
    pub fn push_all(&self, actions: impl IntoIterator<Item = Action>) {
        let mut queue = self.queue.lock();
        for action in actions {
            tracing::debug!(action = action.kind(), "action queued");
            queue.push_back(action);
        }
    }

    /// Take every queued action, oldest first.
    pub fn drain(&self) -> Vec<Action> {
        self.queue.lock().drain(..).collect()
    }

    /// Drain and apply in enqueue order. Returns how many actions succeeded.
    pub fn apply_all(&self, main: &mut MainWorkflow) -> usize {
        let mut applied = 0;
        for action in self.drain() {
            let kind = action.kind();
            match action.apply(main) {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!(action = kind, error = %e, "queued action failed"),
            }
        }
        applied
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/workflow/action.rs"]
mod tests;
