use super::*;
use crate::foundation::core::{Fps, FrameIndex};
use crate::surface::sink::InMemorySink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
struct Counting {
    locks: AtomicU64,
    unlocks: AtomicU64,
    finish_after: Option<u64>,
    fail_at: Option<u64>,
}

impl RenderCallbacks for Counting {
    fn lock(&self, out: &mut VideoFrame) -> ReelflowResult<Option<FrameIndex>> {
        let n = self.locks.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(n) {
            return Err(ReelflowError::decoder("boom"));
        }
        out.fill([n as u8, 0, 0, 255]);
        Ok(Some(FrameIndex(n)))
    }

    fn unlock(&self) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    fn finished(&self) -> bool {
        self.finish_after.is_some_and(|n| self.locks.load(Ordering::SeqCst) >= n)
    }
}

fn config(fps: u32) -> SinkConfig {
    SinkConfig {
        width: 1,
        height: 1,
        fps: Fps::new(fps, 1).unwrap(),
        audio: None,
    }
}

fn wait_for(what: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if what() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    what()
}

#[test]
fn tick_limit_stops_the_driver_and_pairs_every_lock() {
    let cbs = Arc::new(Counting::default());
    let mut surface = ClockedSurface::new(
        InMemorySink::new(),
        ClockedOpts {
            full_speed: true,
            max_ticks: Some(5),
        },
    );
    surface.play(cbs.clone(), config(30)).unwrap();
    surface.join().unwrap();

    assert!(!surface.is_playing());
    assert_eq!(surface.ticks(), 5);
    assert_eq!(cbs.unlocks.load(Ordering::SeqCst), 5);
    let sink = surface.sink();
    let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, vec![0, 1, 2, 3, 4]);
    assert!(sink.is_ended());
}

#[test]
fn finished_producer_ends_playback() {
    let cbs = Arc::new(Counting {
        finish_after: Some(3),
        ..Counting::default()
    });
    let mut surface = ClockedSurface::new(
        InMemorySink::new(),
        ClockedOpts {
            full_speed: true,
            max_ticks: None,
        },
    );
    surface.play(cbs, config(30)).unwrap();
    surface.join().unwrap();
    assert_eq!(surface.sink().frames().len(), 3);
}

#[test]
fn lock_failure_is_returned_and_still_unlocked() {
    let cbs = Arc::new(Counting {
        fail_at: Some(2),
        ..Counting::default()
    });
    let mut surface = ClockedSurface::new(
        InMemorySink::new(),
        ClockedOpts {
            full_speed: true,
            max_ticks: None,
        },
    );
    surface.play(cbs.clone(), config(30)).unwrap();
    assert!(matches!(surface.join(), Err(ReelflowError::Decoder(_))));
    assert_eq!(cbs.unlocks.load(Ordering::SeqCst), 3);
    assert_eq!(surface.sink().frames().len(), 2);
}

#[test]
fn stop_interrupts_paced_playback_and_is_idempotent() {
    let cbs = Arc::new(Counting::default());
    let mut surface = ClockedSurface::new(InMemorySink::new(), ClockedOpts::default());
    surface.play(cbs, config(1)).unwrap();
    assert!(wait_for(|| surface.ticks() >= 1));
    assert!(surface.is_playing());

    let started = Instant::now();
    surface.stop().unwrap();
    surface.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(!surface.is_playing());
    assert!(surface.sink().is_ended());
}

#[test]
fn pause_suspends_ticking_until_resume() {
    let cbs = Arc::new(Counting::default());
    let mut surface = ClockedSurface::new(InMemorySink::new(), ClockedOpts::default());
    surface.play(cbs, config(200)).unwrap();
    assert!(wait_for(|| surface.ticks() >= 2));

    surface.pause();
    assert!(!surface.is_playing());
    std::thread::sleep(Duration::from_millis(30));
    let held = surface.ticks();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(surface.ticks(), held);

    surface.resume();
    assert!(wait_for(|| surface.ticks() > held));
    surface.stop().unwrap();
}

#[test]
fn playing_twice_is_rejected() {
    let cbs = Arc::new(Counting::default());
    let mut surface = ClockedSurface::new(InMemorySink::new(), ClockedOpts::default());
    surface.play(cbs.clone(), config(10)).unwrap();
    assert!(matches!(
        surface.play(cbs, config(10)),
        Err(ReelflowError::State(_))
    ));
    surface.stop().unwrap();
}
