use super::*;
use crate::decoder::synthetic::{SyntheticDecoderFactory, pixel_for};
use crate::foundation::core::Canvas;
use crate::media::clip::{Clip, MediaSource};
use crate::workflow::clip_workflow::ClipState;

fn session(factory: &SyntheticDecoderFactory) -> MainWorkflow {
    let settings = Settings {
        canvas: Canvas {
            width: 2,
            height: 2,
        },
        video_tracks: 2,
        audio_tracks: 1,
        threads: Some(2),
        transition_timeout_ms: 5_000,
        ..Settings::default()
    };
    MainWorkflow::new(settings, Arc::new(factory.clone())).unwrap()
}

fn clip(uri: &str, begin: u64, end: u64) -> SharedClip {
    Clip::new(MediaSource::new(uri), begin, end)
        .unwrap()
        .into_shared()
}

fn top_left(main: &MainWorkflow) -> Option<[u8; 4]> {
    main.output().video.pixel(0, 0)
}

#[test]
fn tick_requires_started_render() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    assert!(matches!(
        main.get_synchrone_output(),
        Err(ReelflowError::State(_))
    ));
}

#[test]
fn empty_timeline_is_black_and_ends_immediately() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let events = main.subscribe();
    main.start_render().unwrap();

    let out = main.get_synchrone_output().unwrap();
    assert_eq!(out.video.pixel(1, 1), Some([0, 0, 0, 255]));
    assert_eq!(out.audio, None);
    assert!(main.is_end_reached());

    let events: Vec<_> = events.try_iter().collect();
    assert_eq!(events[0], PlaybackEvent::Playing);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::TrackEndReached { .. }))
            .count(),
        3
    );
    assert!(events.contains(&PlaybackEvent::EndReached));
}

#[test]
fn clip_frames_reach_the_output_one_tick_after_open() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::video(0), clip("synthetic://v", 0, 10), 0).unwrap();
    main.start_render().unwrap();

    main.get_synchrone_output().unwrap();
    assert_eq!(top_left(&main), Some([0, 0, 0, 255]));
    assert_eq!(main.current_frame(), 1);

    main.get_synchrone_output().unwrap();
    assert_eq!(top_left(&main), Some(pixel_for("synthetic://v", 0)));
    main.get_synchrone_output().unwrap();
    assert_eq!(top_left(&main), Some(pixel_for("synthetic://v", 1)));
    assert_eq!(main.current_frame(), 3);
}

#[test]
fn track_zero_is_composited_on_top() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::video(1), clip("synthetic://under", 0, 10), 0).unwrap();
    main.add_clip(TrackRef::video(0), clip("synthetic://over", 0, 10), 0).unwrap();
    main.start_render().unwrap();
    main.get_synchrone_output().unwrap();
    main.get_synchrone_output().unwrap();
    assert_eq!(top_left(&main), Some(pixel_for("synthetic://over", 0)));
}

#[test]
fn audio_track_supplies_the_tick_sample() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::audio(0), clip("synthetic://tone", 5, 50), 0).unwrap();
    main.start_render().unwrap();
    main.get_synchrone_output().unwrap();
    let out = main.get_synchrone_output().unwrap();

    let audio = out.audio.as_ref().unwrap();
    assert_eq!(audio.pts, 5);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.interleaved_f32.len(), 1_600 * 2);
    assert!(audio.interleaved_f32.iter().all(|s| *s == 5.0));
}

#[test]
fn paused_session_repeats_the_frame_and_holds_position() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::video(0), clip("synthetic://p", 0, 30), 0).unwrap();
    main.start_render().unwrap();
    for _ in 0..3 {
        main.get_synchrone_output().unwrap();
    }
    let shown = top_left(&main);

    main.pause();
    assert!(main.is_paused());
    for _ in 0..2 {
        main.get_synchrone_output().unwrap();
        assert_eq!(main.current_frame(), 3);
    }

    main.unpause();
    main.get_synchrone_output().unwrap();
    assert_eq!(main.current_frame(), 4);
    assert_ne!(top_left(&main), shown);
}

#[test]
fn pause_right_after_start_holds_the_first_frame() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::video(0), clip("synthetic://early", 0, 30), 0).unwrap();
    main.start_render().unwrap();
    main.pause();

    let first = Some(pixel_for("synthetic://early", 0));
    for _ in 0..500 {
        if top_left(&main) == first {
            break;
        }
        main.get_synchrone_output().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(top_left(&main), first);
    for _ in 0..3 {
        std::thread::sleep(std::time::Duration::from_millis(3));
        main.get_synchrone_output().unwrap();
        assert_eq!(top_left(&main), first);
        assert_eq!(main.current_frame(), 0);
    }
}

#[test]
fn split_clip_is_all_or_nothing() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let track = TrackRef::video(0);
    let c = clip("synthetic://cut", 0, 100);
    let id = c.read().id();
    main.add_clip(track, Arc::clone(&c), 0).unwrap();
    main.add_clip(track, clip("synthetic://wall", 0, 10), 120).unwrap();

    let blocked = c.read().split_off(40, 100).unwrap().into_shared();
    assert!(main.split_clip(track, id, 40, blocked, 100).is_err());
    assert_eq!(c.read().end(), 100);
    assert_eq!(main.track(track).unwrap().clip_count(), 2);

    let right = c.read().split_off(40, 100).unwrap().into_shared();
    let right_id = right.read().id();
    main.split_clip(track, id, 40, right, 40).unwrap();
    assert_eq!(c.read().end(), 40);
    assert_eq!(main.track(track).unwrap().clip_start(right_id), Some(40));

    main.unsplit_clip(track, id, right_id, 100).unwrap();
    assert_eq!(c.read().end(), 100);
    assert_eq!(main.track(track).unwrap().clip_count(), 2);
}

#[test]
fn stop_when_idle_at_frame_zero_emits_nothing() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let events = main.subscribe();
    main.stop();
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn end_reached_is_signalled_once() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    main.add_clip(TrackRef::video(0), clip("synthetic://e", 0, 3), 0).unwrap();
    let events = main.subscribe();
    main.start_render().unwrap();

    for _ in 0..4 {
        main.get_synchrone_output().unwrap();
        assert!(!main.is_end_reached());
    }
    main.get_synchrone_output().unwrap();
    assert!(main.is_end_reached());
    main.get_synchrone_output().unwrap();

    let ends = events
        .try_iter()
        .filter(|e| *e == PlaybackEvent::EndReached)
        .count();
    assert_eq!(ends, 1);
}

#[test]
fn stop_rewinds_and_stops_every_clip() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let c = clip("synthetic://s", 0, 30);
    let id = c.read().id();
    main.add_clip(TrackRef::video(0), c, 0).unwrap();
    main.start_render().unwrap();
    for _ in 0..3 {
        main.get_synchrone_output().unwrap();
    }
    let events = main.subscribe();

    main.stop();
    assert!(!main.is_rendering());
    assert_eq!(main.current_frame(), 0);
    let track = main.track(TrackRef::video(0)).unwrap();
    assert_eq!(track.clip_state(id), Some(ClipState::Stopped));
    assert_eq!(factory.journal().stops("synthetic://s"), 1);

    let events: Vec<_> = events.try_iter().collect();
    assert!(events.contains(&PlaybackEvent::Stopped));
    assert!(events.contains(&PlaybackEvent::FrameChanged {
        frame: 0,
        reason: FrameChangedReason::Renderer
    }));
}

#[test]
fn edits_address_tracks_by_kind_and_index() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let c = clip("synthetic://x", 0, 40);
    let id = c.read().id();
    assert!(main.add_clip(TrackRef::video(2), Arc::clone(&c), 0).is_err());
    main.add_clip(TrackRef::audio(0), c, 10).unwrap();
    assert_eq!(main.length_frames(), 50);
    assert!(main.find_clip(TrackRef::video(0), id).is_none());
    assert!(main.find_clip(TrackRef::audio(0), id).is_some());

    main.resize_clip(TrackRef::audio(0), id, 0, 20).unwrap();
    assert_eq!(main.length_frames(), 30);
    main.remove_clip(TrackRef::audio(0), id).unwrap();
    assert_eq!(main.length_frames(), 0);
}

#[test]
fn cursor_moves_emit_their_reason() {
    let factory = SyntheticDecoderFactory::new();
    let mut main = session(&factory);
    let events = main.subscribe();
    main.set_current_frame(42, FrameChangedReason::RulerCursor);
    main.next_frame();
    main.previous_frame();
    main.previous_frame();
    assert_eq!(main.current_frame(), 41);

    let events: Vec<_> = events.try_iter().collect();
    assert_eq!(
        events[0],
        PlaybackEvent::FrameChanged {
            frame: 42,
            reason: FrameChangedReason::RulerCursor
        }
    );
    assert_eq!(events.len(), 4);
}

#[test]
fn zero_threads_is_rejected() {
    assert!(build_thread_pool(Some(0)).is_err());
    assert!(build_thread_pool(Some(1)).is_ok());
}
