//! Reelflow is a timeline playback engine for a non-linear video editor.
//!
//! Each clip on the timeline gets its own decode state machine, each track schedules its clips
//! around the playhead, and a session aggregator pulls one synchronized video/audio pair per
//! output tick:
//!
//! - Build a [`MainWorkflow`] from [`Settings`] and a [`DecoderFactory`]
//! - Wrap it in a [`WorkflowRenderer`] driving a [`PlaybackSurface`]
//! - Edit the timeline at any time; edits made while playing are applied between ticks
#![forbid(unsafe_code)]

pub mod decoder;
pub mod effects;
pub mod foundation;
pub mod media;
pub mod renderer;
pub mod script;
pub mod settings;
pub mod surface;
pub mod workflow;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
pub use crate::foundation::error::{ReelflowError, ReelflowResult};

pub use crate::decoder::synthetic::SyntheticDecoderFactory;
pub use crate::decoder::{DecoderFactory, MediaDecoder, SchemeDecoderFactory};
pub use crate::effects::engine::EffectsEngine;
pub use crate::media::clip::{Clip, ClipId, MediaKind, MediaSource, SharedClip};
pub use crate::media::frame::{AudioSample, OutputBuffers, VideoFrame};
pub use crate::renderer::WorkflowRenderer;
pub use crate::script::{ScriptClip, SessionScript};
pub use crate::settings::{AudioFormat, Settings};
pub use crate::surface::clocked::{ClockedOpts, ClockedSurface};
pub use crate::surface::sink::{FrameSink, InMemorySink, PngSequenceSink, SinkConfig};
pub use crate::surface::{PlaybackSurface, RenderCallbacks};
pub use crate::workflow::action::{Action, ActionQueue};
pub use crate::workflow::clip_workflow::{ClipState, ClipWorkflow};
pub use crate::workflow::events::{FrameChangedReason, PlaybackEvent};
pub use crate::workflow::main_workflow::MainWorkflow;
pub use crate::workflow::track_workflow::{TrackRef, TrackWorkflow};
