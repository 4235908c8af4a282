use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use rayon::prelude::*;

use crate::decoder::{DecoderFactory, StreamFormat};
use crate::effects::engine::EffectsEngine;
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::clip::{ClipId, MediaKind, SharedClip};
use crate::media::frame::{AudioSample, OutputBuffers, VideoFrame};
use crate::settings::Settings;
use crate::workflow::clip_workflow::ClipOutput;
use crate::workflow::events::{EventBus, FrameChangedReason, PlaybackEvent};
use crate::workflow::track_workflow::{TrackParams, TrackRef, TrackWorkflow};

/// One playback session: every track of the timeline plus the composition stage.
///
/// [`get_synchrone_output`](Self::get_synchrone_output) is the tick. It fans out to all tracks
/// on a rayon pool, joins, composes the video tracks and picks the first audio track that
/// produced a sample.
pub struct MainWorkflow {
    settings: Settings,
    video_tracks: Vec<TrackWorkflow>,
    audio_tracks: Vec<TrackWorkflow>,
    effects: EffectsEngine,
    output: OutputBuffers,
    current_frame: u64,
    rendering: bool,
    paused: bool,
    ended_tracks: HashSet<TrackRef>,
    end_reached: bool,
    pool: rayon::ThreadPool,
    events: EventBus,
}

impl MainWorkflow {
    pub fn new(settings: Settings, factory: Arc<dyn DecoderFactory>) -> ReelflowResult<Self> {
        settings.validate()?;
        let fps = settings.output_fps;
        let timeout = settings.transition_timeout();
        let video = TrackParams {
            factory: Arc::clone(&factory),
            format: StreamFormat::Video {
                width: settings.canvas.width,
                height: settings.canvas.height,
            },
            fps,
            preload_window: settings.preload_window,
            timeout,
        };
        let audio = TrackParams {
            factory,
            format: StreamFormat::Audio {
                format: settings.audio,
                samples_per_tick: settings.audio.samples_per_tick(fps),
            },
            fps,
            preload_window: settings.preload_window,
            timeout,
        };

        let video_tracks = (0..settings.video_tracks)
            .map(|i| TrackWorkflow::new(TrackRef::video(i), video.clone()))
            .collect();
        let audio_tracks = (0..settings.audio_tracks)
            .map(|i| TrackWorkflow::new(TrackRef::audio(i), audio.clone()))
            .collect();
        let pool = build_thread_pool(settings.threads)?;

        let mut black = VideoFrame::blank(settings.canvas);
        black.fill(crate::effects::composite::OPAQUE_BLACK);

        Ok(Self {
            effects: EffectsEngine::new(settings.canvas),
            output: OutputBuffers {
                video: black,
                audio: None,
            },
            settings,
            video_tracks,
            audio_tracks,
            current_frame: 0,
            rendering: false,
            paused: false,
            ended_tracks: HashSet::new(),
            end_reached: false,
            pool,
            events: EventBus::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fps(&self) -> Fps {
        self.settings.output_fps
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// All tracks ran past their last clip on the latest tick.
    pub fn is_end_reached(&self) -> bool {
        self.end_reached
    }

    /// Output of the latest tick.
    pub fn output(&self) -> &OutputBuffers {
        &self.output
    }

    /// Timeline length in frames: the furthest clip end over all tracks.
    pub fn length_frames(&self) -> u64 {
        self.video_tracks
            .iter()
            .chain(&self.audio_tracks)
            .map(TrackWorkflow::length)
            .max()
            .unwrap_or(0)
    }

    pub fn track(&self, track: TrackRef) -> Option<&TrackWorkflow> {
        let tracks = match track.kind {
            MediaKind::Video => &self.video_tracks,
            MediaKind::Audio => &self.audio_tracks,
        };
        tracks.get(track.index as usize)
    }

    fn track_mut(&mut self, track: TrackRef) -> ReelflowResult<&mut TrackWorkflow> {
        let tracks = match track.kind {
            MediaKind::Video => &mut self.video_tracks,
            MediaKind::Audio => &mut self.audio_tracks,
        };
        tracks
            .get_mut(track.index as usize)
            .ok_or_else(|| ReelflowError::validation(format!("no track {track}")))
    }

    pub fn add_clip(
        &mut self,
        track: TrackRef,
        clip: SharedClip,
        start: u64,
    ) -> ReelflowResult<()> {
        self.track_mut(track)?.add_clip(clip, start)
    }

    pub fn remove_clip(&mut self, track: TrackRef, clip: ClipId) -> ReelflowResult<SharedClip> {
        self.track_mut(track)?.remove_clip(clip)
    }

    pub fn resize_clip(
        &mut self,
        track: TrackRef,
        clip: ClipId,
        begin: u64,
        end: u64,
    ) -> ReelflowResult<()> {
        self.track_mut(track)?.resize_clip(clip, begin, end)
    }

    /// Cut clip `origin` so it ends at source frame `at`, and place `right` at timeline frame
    /// `start`. Either both edits apply or neither does.
    pub fn split_clip(
        &mut self,
        track: TrackRef,
        origin: ClipId,
        at: u64,
        right: SharedClip,
        start: u64,
    ) -> ReelflowResult<()> {
        let (begin, end) = self.clip_bounds(track, origin)?;
        self.resize_clip(track, origin, begin, at)?;
        if let Err(e) = self.add_clip(track, right, start) {
            self.resize_clip(track, origin, begin, end)?;
            return Err(e);
        }
        Ok(())
    }

    /// Remove `split` and give `origin` back its source end `old_end`. Either both edits apply
    /// or neither does.
    pub fn unsplit_clip(
        &mut self,
        track: TrackRef,
        origin: ClipId,
        split: ClipId,
        old_end: u64,
    ) -> ReelflowResult<()> {
        let (begin, _) = self.clip_bounds(track, origin)?;
        let start = self
            .track(track)
            .and_then(|t| t.clip_start(split))
            .ok_or_else(|| ReelflowError::validation(format!("no clip {split} on {track}")))?;
        let removed = self.remove_clip(track, split)?;
        if let Err(e) = self.resize_clip(track, origin, begin, old_end) {
            tracing::warn!(error = %e, "unsplit resize failed, restoring split clip");
            self.add_clip(track, removed, start)?;
            return Err(e);
        }
        Ok(())
    }

    fn clip_bounds(&self, track: TrackRef, clip: ClipId) -> ReelflowResult<(u64, u64)> {
        let c = self
            .find_clip(track, clip)
            .ok_or_else(|| ReelflowError::validation(format!("no clip {clip} on {track}")))?;
        let c = c.read();
        Ok((c.begin(), c.end()))
    }

    pub fn find_clip(&self, track: TrackRef, clip: ClipId) -> Option<SharedClip> {
        self.track(track)?.clip(clip)
    }

    /// Arm the session for ticking.
    pub fn start_render(&mut self) -> ReelflowResult<()> {
        self.effects.start()?;
        if self.paused {
            for track in self.video_tracks.iter_mut().chain(&mut self.audio_tracks) {
                track.unpause();
            }
        }
        self.rendering = true;
        self.paused = false;
        self.end_reached = false;
        self.ended_tracks.clear();
        tracing::info!(
            frame = self.current_frame,
            length = self.length_frames(),
            "render started"
        );
        self.events.emit(PlaybackEvent::Playing);
        Ok(())
    }

    /// Compute the output for the current frame, then advance unless paused.
    #[tracing::instrument(level = "debug", skip(self), fields(frame = self.current_frame))]
    pub fn get_synchrone_output(&mut self) -> ReelflowResult<&OutputBuffers> {
        if !self.rendering {
            return Err(ReelflowError::state("render is not started"));
        }
        let current = self.current_frame;
        let effects = &self.effects;
        let video_tracks = &mut self.video_tracks;
        let audio_tracks = &mut self.audio_tracks;

        let (video_ends, audio_ticks) = self.pool.install(|| {
            rayon::join(
                || {
                    video_tracks
                        .par_iter_mut()
                        .enumerate()
                        .map(|(slot, track)| {
                            let tick = track.get_output(current);
                            feed_effects(effects, slot, track.track(), tick.output.as_ref());
                            (track.track(), tick.end_reached)
                        })
                        .collect::<Vec<_>>()
                },
                || {
                    audio_tracks
                        .par_iter_mut()
                        .map(|track| {
                            let tick = track.get_output(current);
                            (track.track(), tick.end_reached, tick.output)
                        })
                        .collect::<Vec<_>>()
                },
            )
        });

        self.effects.render()?;
        self.output.video.copy_from(self.effects.output_frame())?;
        let audio = self.settings.audio;
        self.output.audio = audio_ticks
            .iter()
            .find_map(|(_, _, out)| out.as_ref())
            .map(|out| {
                AudioSample::from_le_bytes(audio.sample_rate, audio.channels, out.pts, &out.data)
            });

        let ends = video_ends
            .into_iter()
            .chain(audio_ticks.iter().map(|(track, ended, _)| (*track, *ended)));
        self.track_ends(ends);

        if !self.paused {
            self.current_frame += 1;
            self.events.emit(PlaybackEvent::FrameChanged {
                frame: self.current_frame,
                reason: FrameChangedReason::Renderer,
            });
        }
        Ok(&self.output)
    }

    fn track_ends(&mut self, ends: impl Iterator<Item = (TrackRef, bool)>) {
        let mut all = true;
        for (track, ended) in ends {
            all &= ended;
            if !ended {
                self.ended_tracks.remove(&track);
            } else if self.ended_tracks.insert(track) {
                self.events.emit(PlaybackEvent::TrackEndReached { track });
            }
        }
        if all && !self.end_reached {
            tracing::info!(frame = self.current_frame, "end of timeline reached");
            self.events.emit(PlaybackEvent::EndReached);
        }
        self.end_reached = all;
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        for track in self.video_tracks.iter_mut().chain(&mut self.audio_tracks) {
            track.pause();
        }
        self.paused = true;
        self.events.emit(PlaybackEvent::Paused);
    }

    pub fn unpause(&mut self) {
        if !self.paused {
            return;
        }
        for track in self.video_tracks.iter_mut().chain(&mut self.audio_tracks) {
            track.unpause();
        }
        self.paused = false;
        self.events.emit(PlaybackEvent::Unpaused);
    }

    /// Tear every clip down and rewind to frame 0.
    pub fn stop(&mut self) {
        for track in self.video_tracks.iter_mut().chain(&mut self.audio_tracks) {
            track.stop();
        }
        self.effects.stop();
        let was_rendering = self.rendering;
        self.rendering = false;
        self.paused = false;
        self.end_reached = false;
        self.ended_tracks.clear();
        if was_rendering || self.current_frame != 0 {
            self.set_current_frame(0, FrameChangedReason::Renderer);
        }
        if was_rendering {
            tracing::info!("render stopped");
            self.events.emit(PlaybackEvent::Stopped);
        }
    }

    pub fn set_current_frame(&mut self, frame: u64, reason: FrameChangedReason) {
        self.current_frame = frame;
        self.events.emit(PlaybackEvent::FrameChanged { frame, reason });
    }

    pub fn next_frame(&mut self) {
        self.set_current_frame(self.current_frame + 1, FrameChangedReason::Renderer);
    }

    pub fn previous_frame(&mut self) {
        self.set_current_frame(
            self.current_frame.saturating_sub(1),
            FrameChangedReason::Renderer,
        );
    }
}

impl Drop for MainWorkflow {
    fn drop(&mut self) {
        self.stop();
    }
}

fn feed_effects(
    effects: &EffectsEngine,
    slot: usize,
    track: TrackRef,
    out: Option<&ClipOutput>,
) {
    let Some(out) = out else {
        effects.clear_input(slot);
        return;
    };
    if let Err(e) = effects.set_input_frame(slot, &out.data) {
        tracing::warn!(track = %track, error = %e, "track frame rejected by mixer");
        effects.clear_input(slot);
    }
}

fn build_thread_pool(threads: Option<usize>) -> ReelflowResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(ReelflowError::validation(
            "track threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("reelflow-track-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelflowError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/workflow/main_workflow.rs"]
mod tests;
