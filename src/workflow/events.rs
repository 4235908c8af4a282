use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;

use crate::workflow::track_workflow::TrackRef;

/// Who moved the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameChangedReason {
    /// Playback advanced on its own.
    Renderer,
    TimelineCursor,
    PreviewCursor,
    RulerCursor,
}

/// Notification delivered to subscribers of a playback session.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    Playing,
    Paused,
    Unpaused,
    Stopped,
    /// Every track ran past its last clip.
    EndReached,
    FrameChanged {
        frame: u64,
        reason: FrameChangedReason,
    },
    TrackEndReached {
        track: TrackRef,
    },
}

/// Fan-out of [`PlaybackEvent`]s over `mpsc` channels. Dropped receivers are pruned on emit.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<PlaybackEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: PlaybackEvent) {
        tracing::trace!(?event, "playback event");
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
