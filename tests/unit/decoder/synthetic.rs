use super::*;
use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::settings::AudioFormat;

fn config(uri: &str, format: StreamFormat) -> DecoderConfig {
    struct Ignore;
    impl crate::decoder::FrameDelivery for Ignore {
        fn on_frame(
            &self,
            _info: crate::decoder::FrameInfo,
            _fill: &mut dyn FnMut(&mut [u8]),
        ) -> crate::decoder::Delivery {
            crate::decoder::Delivery::Stop
        }
        fn on_end_reached(&self, _serial: u64) {}
    }

    DecoderConfig {
        source: MediaSource::new(uri),
        range: FrameRange::new(FrameIndex(0), FrameIndex(10)).unwrap(),
        fps: Fps::new(30, 1).unwrap(),
        format,
        serial: 0,
        delivery: std::sync::Arc::new(Ignore),
    }
}

#[test]
fn pixel_encodes_pts_in_blue() {
    let a = pixel_for("synthetic://a", 300);
    assert_eq!(a[2], (300 % 256) as u8);
    assert_eq!(a[3], 255);
    assert_eq!(pixel_for("synthetic://a", 1)[..2], a[..2]);
}

#[test]
fn video_frames_follow_seek() {
    let cfg = config(
        "synthetic://bars",
        StreamFormat::Video {
            width: 2,
            height: 1,
        },
    );
    let mut src = SyntheticSource::open(&cfg).unwrap();
    let mut buf = vec![0u8; 8];
    src.seek(7).unwrap();
    assert!(src.read_frame(&mut buf).unwrap());
    assert_eq!(buf[..4], pixel_for("synthetic://bars", 7));
    assert_eq!(buf[4..], pixel_for("synthetic://bars", 7));
}

#[test]
fn audio_samples_carry_pts() {
    let cfg = config(
        "synthetic://tone",
        StreamFormat::Audio {
            format: AudioFormat::default(),
            samples_per_tick: 2,
        },
    );
    let mut src = SyntheticSource::open(&cfg).unwrap();
    let mut buf = vec![0u8; 16];
    src.seek(42).unwrap();
    src.read_frame(&mut buf).unwrap();
    assert_eq!(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 42.0);
}

#[test]
fn fail_sources_do_not_open() {
    let cfg = config(
        "synthetic://fail-now",
        StreamFormat::Video {
            width: 1,
            height: 1,
        },
    );
    assert!(matches!(
        SyntheticSource::open(&cfg),
        Err(ReelflowError::Decoder(_))
    ));
}

#[test]
fn factory_decoders_share_the_journal() {
    let factory = SyntheticDecoderFactory::new();
    let mut dec = factory.create(&MediaSource::new("synthetic://j")).unwrap();
    dec.open(config(
        "synthetic://j",
        StreamFormat::Video {
            width: 1,
            height: 1,
        },
    ))
    .unwrap();
    dec.stop();
    assert_eq!(factory.journal().opens("synthetic://j"), 1);
    assert_eq!(factory.journal().stops("synthetic://j"), 1);
}
