use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::media::frame::VideoFrame;
use crate::surface::sink::{FrameSink, SinkConfig};
use crate::surface::{PlaybackSurface, RenderCallbacks};

/// Pacing options for [`ClockedSurface`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockedOpts {
    /// Tick as fast as frames are produced instead of at the output fps.
    pub full_speed: bool,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
}

#[derive(Debug, Default)]
struct Flags {
    stop: bool,
    paused: bool,
    running: bool,
    ticks: u64,
}

#[derive(Debug, Default)]
struct Control {
    flags: Mutex<Flags>,
    cond: Condvar,
}

/// Playback surface that ticks on its own thread at the output frame rate and streams every
/// displayed frame into a [`FrameSink`].
pub struct ClockedSurface<S: FrameSink + 'static> {
    opts: ClockedOpts,
    sink: Arc<Mutex<S>>,
    control: Arc<Control>,
    worker: Option<JoinHandle<ReelflowResult<()>>>,
}

impl<S: FrameSink + 'static> ClockedSurface<S> {
    pub fn new(sink: S, opts: ClockedOpts) -> Self {
        Self {
            opts,
            sink: Arc::new(Mutex::new(sink)),
            control: Arc::new(Control::default()),
            worker: None,
        }
    }

    /// Borrow the sink. Blocks while the driver is pushing a frame.
    pub fn sink(&self) -> MutexGuard<'_, S> {
        self.sink.lock()
    }

    /// Ticks driven since the last `play`.
    pub fn ticks(&self) -> u64 {
        self.control.flags.lock().ticks
    }

    fn finish(&mut self) -> ReelflowResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker
            .join()
            .map_err(|_| ReelflowError::state("playback driver thread panicked"))?
    }
}

impl<S: FrameSink + 'static> PlaybackSurface for ClockedSurface<S> {
    fn play(
        &mut self,
        callbacks: Arc<dyn RenderCallbacks>,
        cfg: SinkConfig,
    ) -> ReelflowResult<()> {
        if self.worker.is_some() {
            return Err(ReelflowError::state("surface is already playing"));
        }
        {
            let mut flags = self.control.flags.lock();
            *flags = Flags {
                running: true,
                ..Flags::default()
            };
        }

        let sink = Arc::clone(&self.sink);
        let control = Arc::clone(&self.control);
        let opts = self.opts;
        let worker = std::thread::Builder::new()
            .name("reelflow-playback".to_string())
            .spawn(move || {
                let res = drive(callbacks.as_ref(), &sink, &control, opts, cfg);
                control.flags.lock().running = false;
                control.cond.notify_all();
                if let Err(e) = &res {
                    tracing::warn!(error = %e, "playback driver failed");
                }
                res
            })
            .map_err(|e| ReelflowError::state(format!("failed to spawn playback thread: {e}")))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn pause(&mut self) {
        self.control.flags.lock().paused = true;
        self.control.cond.notify_all();
    }

    fn resume(&mut self) {
        self.control.flags.lock().paused = false;
        self.control.cond.notify_all();
    }

    fn stop(&mut self) -> ReelflowResult<()> {
        self.control.flags.lock().stop = true;
        self.control.cond.notify_all();
        self.finish()
    }

    fn join(&mut self) -> ReelflowResult<()> {
        self.finish()
    }

    fn is_playing(&self) -> bool {
        let flags = self.control.flags.lock();
        flags.running && !flags.paused
    }
}

impl<S: FrameSink + 'static> Drop for ClockedSurface<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "playback surface stopped with error");
        }
    }
}

fn drive<S: FrameSink>(
    callbacks: &dyn RenderCallbacks,
    sink: &Mutex<S>,
    control: &Control,
    opts: ClockedOpts,
    cfg: SinkConfig,
) -> ReelflowResult<()> {
    let period = cfg.fps.frame_duration();
    let mut frame = VideoFrame::blank(Canvas {
        width: cfg.width,
        height: cfg.height,
    });
    sink.lock().begin(cfg)?;
    tracing::debug!(?period, full_speed = opts.full_speed, "playback driver started");

    let mut deadline = Instant::now();
    let mut ticks = 0u64;
    loop {
        {
            let mut flags = control.flags.lock();
            while flags.paused && !flags.stop {
                control.cond.wait(&mut flags);
            }
            if flags.stop {
                break;
            }
        }
        if opts.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }

        let shown = callbacks.lock(&mut frame);
        let pushed = match shown {
            Ok(Some(idx)) => sink.lock().push_frame(idx, &frame).map(|()| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        callbacks.unlock();
        if !pushed? {
            break;
        }
        ticks += 1;
        control.flags.lock().ticks = ticks;
        if callbacks.finished() {
            tracing::debug!(ticks, "producer finished");
            break;
        }

        if !opts.full_speed {
            deadline += period;
            let mut flags = control.flags.lock();
            while !flags.stop && Instant::now() < deadline {
                if control.cond.wait_until(&mut flags, deadline).timed_out() {
                    break;
                }
            }
        }
    }

    sink.lock().end()?;
    tracing::debug!(ticks, "playback driver stopped");
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/surface/clocked.rs"]
mod tests;
