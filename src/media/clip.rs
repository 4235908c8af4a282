use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{ReelflowError, ReelflowResult};

/// Unique clip identity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ClipId(pub uuid::Uuid);

impl ClipId {
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which kind of track a clip (or decoder stream) belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
}

/// Reference to source media, resolved by a decoder factory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MediaSource {
    pub uri: String,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A trimmed reference into a media stream.
///
/// `bounds` are source frames, half-open. The clip's length on the timeline equals the length
/// of its bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    id: ClipId,
    source: MediaSource,
    bounds: FrameRange,
}

/// Clip handle shared between the edit layer and the workflow that plays it.
pub type SharedClip = Arc<RwLock<Clip>>;

impl Clip {
    pub fn new(source: MediaSource, begin: u64, end: u64) -> ReelflowResult<Self> {
        Ok(Self {
            id: ClipId::new_v4(),
            source,
            bounds: checked_bounds(begin, end)?,
        })
    }

    /// Build the right half of a split: same media, fresh identity, `[begin, end)`.
    pub fn split_off(&self, begin: u64, end: u64) -> ReelflowResult<Self> {
        if begin <= self.bounds.start.0 || begin >= self.bounds.end.0 {
            return Err(ReelflowError::validation(format!(
                "split point {begin} is outside clip {} bounds [{}, {})",
                self.id, self.bounds.start.0, self.bounds.end.0
            )));
        }
        Ok(Self {
            id: ClipId::new_v4(),
            source: self.source.clone(),
            bounds: checked_bounds(begin, end)?,
        })
    }

    pub fn into_shared(self) -> SharedClip {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn bounds(&self) -> FrameRange {
        self.bounds
    }

    pub fn begin(&self) -> u64 {
        self.bounds.start.0
    }

    pub fn end(&self) -> u64 {
        self.bounds.end.0
    }

    pub fn length(&self) -> u64 {
        self.bounds.len_frames()
    }

    pub fn set_boundaries(&mut self, begin: u64, end: u64) -> ReelflowResult<()> {
        self.bounds = checked_bounds(begin, end)?;
        Ok(())
    }

    pub fn set_end(&mut self, end: u64) -> ReelflowResult<()> {
        self.set_boundaries(self.begin(), end)
    }
}

fn checked_bounds(begin: u64, end: u64) -> ReelflowResult<FrameRange> {
    if begin >= end {
        return Err(ReelflowError::validation(format!(
            "clip bounds must satisfy begin < end, got [{begin}, {end})"
        )));
    }
    FrameRange::new(FrameIndex(begin), FrameIndex(end))
}

#[cfg(test)]
#[path = "../../tests/unit/media/clip.rs"]
mod tests;
