use std::ops::Deref;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::effects::composite::{OPAQUE_BLACK, layer_over};
use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::frame::VideoFrame;

/// Number of per-track input slots.
pub const MAX_TRACKS: usize = 64;

/// One node of the composition graph.
///
/// A stage reads the frames wired to its named input ports and writes a single output frame.
/// Unwired or empty inputs resolve to `None`.
pub trait EffectStage: Send + Sync {
    fn name(&self) -> &str;
    fn input_ports(&self) -> Vec<String>;
    fn render(&mut self, inputs: &StageInputs<'_>, out: &mut VideoFrame) -> ReelflowResult<()>;
}

/// A frame wired to a stage input. Track frames stay read-locked while held.
pub enum InputFrame<'a> {
    Track(MappedRwLockReadGuard<'a, VideoFrame>),
    Stage(&'a VideoFrame),
}

impl Deref for InputFrame<'_> {
    type Target = VideoFrame;

    fn deref(&self) -> &VideoFrame {
        match self {
            Self::Track(frame) => frame,
            Self::Stage(frame) => frame,
        }
    }
}

/// The input ports of one stage, resolved on demand against the track slots and the outputs
/// of earlier stages.
pub struct StageInputs<'a> {
    ports: &'a [Option<PortSource>],
    tracks: &'a [RwLock<InputSlot>],
    stages: &'a [VideoFrame],
}

impl<'a> StageInputs<'a> {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Frame on input `port`. `None` when the port is unwired or its track had no frame.
    pub fn get(&self, port: usize) -> Option<InputFrame<'a>> {
        match (*self.ports.get(port)?)? {
            PortSource::Track(t) => {
                let slot = self.tracks.get(t)?.read();
                if !slot.present {
                    return None;
                }
                Some(InputFrame::Track(RwLockReadGuard::map(slot, |s| &s.frame)))
            }
            PortSource::Stage(s) => self.stages.get(s).map(InputFrame::Stage),
        }
    }
}

/// Composites `track{i}` inputs back-to-front over opaque black. Track 0 ends up on top.
#[derive(Debug, Default)]
pub struct MixerEffect;

impl EffectStage for MixerEffect {
    fn name(&self) -> &str {
        "mixer"
    }

    fn input_ports(&self) -> Vec<String> {
        (0..MAX_TRACKS).map(|i| format!("track{i}")).collect()
    }

    fn render(&mut self, inputs: &StageInputs<'_>, out: &mut VideoFrame) -> ReelflowResult<()> {
        out.fill(OPAQUE_BLACK);
        for port in (0..inputs.len()).rev() {
            if let Some(frame) = inputs.get(port) {
                layer_over(&mut out.data, &frame.data)?;
            }
        }
        Ok(())
    }
}

/// Copies `in` to its output, black when nothing is wired.
#[derive(Debug, Default)]
pub struct OutputStage;

impl EffectStage for OutputStage {
    fn name(&self) -> &str {
        "output"
    }

    fn input_ports(&self) -> Vec<String> {
        vec!["in".to_string()]
    }

    fn render(&mut self, inputs: &StageInputs<'_>, out: &mut VideoFrame) -> ReelflowResult<()> {
        match inputs.get(0) {
            Some(frame) => out.copy_from(&frame),
            None => {
                out.fill(OPAQUE_BLACK);
                Ok(())
            }
        }
    }
}

/// Where a stage input reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortSource {
    Track(usize),
    Stage(usize),
}

#[derive(Debug)]
struct InputSlot {
    frame: VideoFrame,
    present: bool,
}

/// Fixed-topology composition graph: 64 track inputs, a mixer, an output stage.
pub struct EffectsEngine {
    canvas: Canvas,
    inputs: Vec<RwLock<InputSlot>>,
    stages: Vec<Box<dyn EffectStage>>,
    wiring: Vec<Vec<Option<PortSource>>>,
    stage_outputs: Vec<VideoFrame>,
    video_output: Option<PortSource>,
    output: VideoFrame,
}

impl EffectsEngine {
    pub fn new(canvas: Canvas) -> Self {
        let mut output = VideoFrame::blank(canvas);
        output.fill(OPAQUE_BLACK);
        Self {
            canvas,
            inputs: (0..MAX_TRACKS)
                .map(|_| {
                    RwLock::new(InputSlot {
                        frame: VideoFrame::blank(canvas),
                        present: false,
                    })
                })
                .collect(),
            stages: Vec::new(),
            wiring: Vec::new(),
            stage_outputs: Vec::new(),
            video_output: None,
            output,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn is_running(&self) -> bool {
        !self.stages.is_empty()
    }

    /// Load the stages and rebuild the wiring.
    pub fn start(&mut self) -> ReelflowResult<()> {
        self.stop();
        self.load(Box::new(MixerEffect));
        self.load(Box::new(OutputStage));

        for i in 0..MAX_TRACKS {
            self.patch(PortSource::Track(i), 0, &format!("track{i}"))?;
        }
        self.patch(PortSource::Stage(0), 1, "in")?;
        self.video_output = Some(PortSource::Stage(1));
        tracing::debug!(stages = self.stages.len(), "effects engine started");
        Ok(())
    }

    /// Unload every stage. Input slots keep their content.
    pub fn stop(&mut self) {
        if self.stages.is_empty() {
            return;
        }
        self.stages.clear();
        self.wiring.clear();
        self.stage_outputs.clear();
        self.video_output = None;
        tracing::debug!("effects engine stopped");
    }

    fn load(&mut self, stage: Box<dyn EffectStage>) {
        self.wiring.push(vec![None; stage.input_ports().len()]);
        self.stage_outputs.push(VideoFrame::blank(self.canvas));
        self.stages.push(stage);
    }

    fn patch(&mut self, from: PortSource, stage: usize, port: &str) -> ReelflowResult<()> {
        let target = self
            .stages
            .get(stage)
            .ok_or_else(|| ReelflowError::validation(format!("no effect stage {stage}")))?;
        let idx = target
            .input_ports()
            .iter()
            .position(|p| p == port)
            .ok_or_else(|| {
                ReelflowError::validation(format!("stage '{}' has no port '{port}'", target.name()))
            })?;
        match from {
            PortSource::Track(t) if t >= MAX_TRACKS => {
                return Err(ReelflowError::validation(format!("no track input {t}")));
            }
            PortSource::Stage(s) if s >= stage => {
                return Err(ReelflowError::validation(format!(
                    "stage {stage} cannot read from later stage {s}"
                )));
            }
            _ => {}
        }
        self.wiring[stage][idx] = Some(from);
        Ok(())
    }

    /// Copy one track's frame into its input slot.
    pub fn set_input_frame(&self, track: usize, rgba: &[u8]) -> ReelflowResult<()> {
        let slot = self
            .inputs
            .get(track)
            .ok_or_else(|| ReelflowError::validation(format!("no track input {track}")))?;
        let mut slot = slot.write();
        if rgba.len() != slot.frame.data.len() {
            return Err(ReelflowError::validation(format!(
                "track {track} frame has {} bytes, expected {}",
                rgba.len(),
                slot.frame.data.len()
            )));
        }
        slot.frame.data.copy_from_slice(rgba);
        slot.present = true;
        Ok(())
    }

    /// Mark a track as having no frame this tick.
    pub fn clear_input(&self, track: usize) {
        if let Some(slot) = self.inputs.get(track) {
            slot.write().present = false;
        }
    }

    /// Run every stage in order and update the output frame. Allocation-free once started.
    pub fn render(&mut self) -> ReelflowResult<()> {
        let Some(video_output) = self.video_output else {
            return Err(ReelflowError::state("effects engine is not started"));
        };

        for (i, stage) in self.stages.iter_mut().enumerate() {
            let (done, rest) = self.stage_outputs.split_at_mut(i);
            let inputs = StageInputs {
                ports: &self.wiring[i],
                tracks: &self.inputs,
                stages: done,
            };
            stage.render(&inputs, &mut rest[0])?;
        }

        let not_wired = || ReelflowError::state("video output is not wired");
        match video_output {
            PortSource::Stage(s) => {
                let composed = self.stage_outputs.get(s).ok_or_else(not_wired)?;
                self.output.copy_from(composed)
            }
            PortSource::Track(t) => {
                let slot = self.inputs.get(t).ok_or_else(not_wired)?.read();
                self.output.copy_from(&slot.frame)
            }
        }
    }

    /// The last composed frame.
    pub fn output_frame(&self) -> &VideoFrame {
        &self.output
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/engine.rs"]
mod tests;
