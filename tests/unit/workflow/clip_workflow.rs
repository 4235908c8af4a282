use super::*;
use crate::decoder::DecoderFactory;
use crate::decoder::synthetic::{SyntheticDecoderFactory, pixel_for};
use crate::media::clip::{Clip, MediaSource};

const FORMAT: StreamFormat = StreamFormat::Video {
    width: 2,
    height: 2,
};

fn workflow(factory: &SyntheticDecoderFactory, uri: &str, begin: u64, end: u64) -> ClipWorkflow {
    let source = MediaSource::new(uri);
    let clip = Clip::new(source.clone(), begin, end).unwrap().into_shared();
    ClipWorkflow::new(
        clip,
        factory.create(&source).unwrap(),
        FORMAT,
        Fps::new(30, 1).unwrap(),
        Duration::from_secs(5),
    )
}

fn render_first_frame(cw: &mut ClipWorkflow) {
    cw.initialize().unwrap();
    cw.start_render();
    cw.wait_for_complete_init().unwrap();
    assert_eq!(cw.wait_while_rendering().unwrap(), ClipState::Sleeping);
}

struct NullDecoder;

impl MediaDecoder for NullDecoder {
    fn open(&mut self, _cfg: DecoderConfig) -> ReelflowResult<()> {
        Ok(())
    }
    fn play(&mut self) -> ReelflowResult<()> {
        Ok(())
    }
    fn pause(&mut self) -> ReelflowResult<()> {
        Ok(())
    }
    fn seek(&mut self, _position: f64, _serial: u64) -> ReelflowResult<()> {
        Ok(())
    }
    fn stop(&mut self) {}
}

#[test]
fn first_frame_then_pop_advances() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://a", 10, 20);
    assert_eq!(cw.state(), ClipState::Stopped);

    render_first_frame(&mut cw);
    let first = cw.get_output(GetMode::Get).unwrap();
    assert_eq!(first.pts, 10);
    assert_eq!(first.data[..4], pixel_for("synthetic://a", 10));

    let popped = cw.get_output(GetMode::Pop).unwrap();
    assert_eq!(popped, first);
    assert_eq!(cw.wait_while_rendering().unwrap(), ClipState::Sleeping);
    assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, 11);
    assert_eq!(cw.pts_diff(), 1);
}

#[test]
fn wake_without_a_request_keeps_the_sleeping_frame() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://w", 0, 20);
    render_first_frame(&mut cw);

    for expected in 1..6 {
        cw.get_output(GetMode::Pop).unwrap();
        assert_eq!(cw.wait_while_rendering().unwrap(), ClipState::Sleeping);
        cw.wake();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cw.state(), ClipState::Sleeping);
        assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, expected);
    }
}

#[test]
fn initialize_is_only_valid_from_stopped() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://b", 0, 10);
    cw.initialize().unwrap();
    assert!(matches!(cw.initialize(), Err(ReelflowError::State(_))));
    assert_eq!(factory.journal().opens("synthetic://b"), 1);
}

#[test]
fn open_failure_returns_error_and_stays_stopped() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://fail", 0, 10);
    assert!(matches!(cw.initialize(), Err(ReelflowError::Decoder(_))));
    assert_eq!(cw.state(), ClipState::Stopped);
}

#[test]
fn output_requires_sleeping_or_paused() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://c", 0, 10);
    assert!(cw.get_output(GetMode::Get).is_err());
    cw.initialize().unwrap();
    assert_eq!(cw.wait_for_complete_init().unwrap(), ClipState::Ready);
    assert!(matches!(
        cw.get_output(GetMode::Pop),
        Err(ReelflowError::State(_))
    ));
}

#[test]
fn seek_from_sleeping_returns_frame_at_new_position() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://d", 0, 50);
    render_first_frame(&mut cw);

    cw.set_position(0.4).unwrap();
    assert_eq!(cw.state(), ClipState::Sleeping);
    assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, 20);
    assert_eq!(factory.journal().seeks("synthetic://d"), vec![0.4]);
}

#[test]
fn set_time_is_relative_to_clip_begin() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://e", 100, 200);
    render_first_frame(&mut cw);
    cw.set_time(25).unwrap();
    assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, 125);
}

#[test]
fn query_state_change_only_records_intent() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://f", 0, 10);
    render_first_frame(&mut cw);

    cw.query_state_change(ClipState::Stopping);
    assert_eq!(cw.state(), ClipState::Sleeping);
    cw.wake();
    assert_eq!(cw.state(), ClipState::Stopping);
    cw.stop();
    assert!(cw.is_stopped());
}

#[test]
fn stop_is_idempotent_and_allows_reinitialize() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://g", 0, 10);
    render_first_frame(&mut cw);

    cw.stop();
    cw.stop();
    assert!(cw.is_stopped());
    assert_eq!(factory.journal().stops("synthetic://g"), 1);

    render_first_frame(&mut cw);
    assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, 0);
    assert_eq!(factory.journal().opens("synthetic://g"), 2);
}

#[test]
fn paused_clip_keeps_returning_the_same_frame() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://h", 0, 10);
    render_first_frame(&mut cw);

    cw.pause().unwrap();
    assert_eq!(cw.state(), ClipState::Paused);
    let a = cw.get_output(GetMode::Get).unwrap();
    let b = cw.get_output(GetMode::Pop).unwrap();
    cw.wake();
    assert_eq!(a, b);
    assert_eq!(cw.state(), ClipState::Paused);

    cw.unpause().unwrap();
    assert_eq!(cw.state(), ClipState::Sleeping);
    assert_eq!(cw.get_output(GetMode::Get).unwrap().pts, a.pts);
}

#[test]
fn end_reached_after_last_frame_is_consumed() {
    let factory = SyntheticDecoderFactory::new();
    let mut cw = workflow(&factory, "synthetic://i", 0, 2);
    render_first_frame(&mut cw);

    assert_eq!(cw.get_output(GetMode::Pop).unwrap().pts, 0);
    assert_eq!(cw.wait_while_rendering().unwrap(), ClipState::Sleeping);
    assert_eq!(cw.get_output(GetMode::Pop).unwrap().pts, 1);
    assert_eq!(cw.wait_while_rendering().unwrap(), ClipState::EndReached);
    assert!(cw.is_end_reached());

    cw.stop();
    assert!(cw.is_stopped());
}

#[test]
fn stalled_decoder_times_out_and_still_stops() {
    let clip = Clip::new(MediaSource::new("stall://x"), 0, 10)
        .unwrap()
        .into_shared();
    let mut cw = ClipWorkflow::new(
        clip,
        Box::new(NullDecoder),
        FORMAT,
        Fps::new(30, 1).unwrap(),
        Duration::from_millis(50),
    );
    cw.initialize().unwrap();
    let err = cw.wait_for_complete_init().unwrap_err();
    assert!(err.is_timeout());
    cw.stop();
    assert!(cw.is_stopped());
}
