//! JSON session scripts: settings plus an initial timeline.
//!
//! ```json
//! {
//!   "settings": { "canvas": { "width": 64, "height": 36 }, "video_tracks": 2 },
//!   "ticks": 90,
//!   "clips": [
//!     { "kind": "video", "track": 0, "uri": "synthetic://intro", "begin": 0, "end": 60, "start": 0 }
//!   ]
//! }
//! ```

use std::path::Path;

use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::clip::{Clip, MediaKind, MediaSource, SharedClip};
use crate::renderer::WorkflowRenderer;
use crate::settings::Settings;
use crate::surface::PlaybackSurface;
use crate::workflow::track_workflow::TrackRef;

/// One clip placement.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptClip {
    pub kind: MediaKind,
    pub track: u32,
    pub uri: String,
    /// Source bounds, half-open.
    pub begin: u64,
    pub end: u64,
    /// Timeline frame the clip starts at.
    pub start: u64,
}

impl ScriptClip {
    pub fn track_ref(&self) -> TrackRef {
        TrackRef {
            kind: self.kind,
            index: self.track,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionScript {
    pub settings: Settings,
    pub clips: Vec<ScriptClip>,
    /// Tick limit for a scripted preview. `None` plays to the end of the timeline.
    pub ticks: Option<u64>,
}

impl SessionScript {
    pub fn from_json_str(s: &str) -> ReelflowResult<Self> {
        let script: Self =
            serde_json::from_str(s).map_err(|e| ReelflowError::serde(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ReelflowResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReelflowError::config(format!("read script '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> ReelflowResult<()> {
        self.settings.validate()?;
        for (i, c) in self.clips.iter().enumerate() {
            let tracks = match c.kind {
                MediaKind::Video => self.settings.video_tracks,
                MediaKind::Audio => self.settings.audio_tracks,
            };
            if c.track >= tracks {
                return Err(ReelflowError::validation(format!(
                    "clips[{i}]: track {} out of range ({tracks} {:?} tracks)",
                    c.track, c.kind
                )));
            }
            if c.begin >= c.end {
                return Err(ReelflowError::validation(format!(
                    "clips[{i}]: begin must be < end"
                )));
            }
        }
        if self.ticks == Some(0) {
            return Err(ReelflowError::validation("ticks must be > 0 when set"));
        }
        Ok(())
    }

    /// Place every clip on `renderer`'s timeline, in script order.
    pub fn load_into<S: PlaybackSurface>(
        &self,
        renderer: &WorkflowRenderer<S>,
    ) -> ReelflowResult<Vec<SharedClip>> {
        let mut placed = Vec::with_capacity(self.clips.len());
        for c in &self.clips {
            let clip = Clip::new(MediaSource::new(c.uri.as_str()), c.begin, c.end)?.into_shared();
            renderer.add_clip(c.track_ref(), clip.clone(), c.start)?;
            placed.push(clip);
        }
        tracing::debug!(clips = placed.len(), "session script loaded");
        Ok(placed)
    }
}

#[cfg(test)]
#[path = "../tests/unit/script.rs"]
mod tests;
