//! Playback driver contract.
//!
//! A surface owns the thread that paces playback. Every tick it asks its [`RenderCallbacks`]
//! for a frame (`lock`), displays it, and hands control back (`unlock`) so queued edits can be
//! applied before the next tick.

use std::sync::Arc;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::ReelflowResult;
use crate::media::frame::VideoFrame;

pub mod clocked;
pub mod sink;

use sink::SinkConfig;

/// Callback pair registered with a playback surface. Invoked on the surface's driver thread.
pub trait RenderCallbacks: Send + Sync {
    /// Compute the next frame into `out`. Returns the timeline position shown, or `None` when
    /// the producer is stopping and the surface should wind down.
    fn lock(&self, out: &mut VideoFrame) -> ReelflowResult<Option<FrameIndex>>;
    /// Called after every `lock`, including failed ones.
    fn unlock(&self);
    /// The producer has nothing more to show.
    fn finished(&self) -> bool;
}

pub trait PlaybackSurface: Send {
    /// Start the driver thread.
    fn play(&mut self, callbacks: Arc<dyn RenderCallbacks>, cfg: SinkConfig)
    -> ReelflowResult<()>;
    /// Suspend ticking. The last frame stays displayed.
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop the driver and wait for its thread to exit. Idempotent.
    fn stop(&mut self) -> ReelflowResult<()>;
    /// Wait until the driver stops on its own (tick limit or finished producer).
    fn join(&mut self) -> ReelflowResult<()>;
    fn is_playing(&self) -> bool;
}
