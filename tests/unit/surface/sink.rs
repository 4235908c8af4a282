use super::*;
use crate::foundation::core::Canvas;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "reelflow_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn config() -> SinkConfig {
    SinkConfig {
        width: 2,
        height: 1,
        fps: Fps::new(25, 1).unwrap(),
        audio: None,
    }
}

fn red() -> VideoFrame {
    let mut f = VideoFrame::blank(Canvas {
        width: 2,
        height: 1,
    });
    f.fill([255, 0, 0, 255]);
    f
}

#[test]
fn in_memory_sink_keeps_frames_in_push_order() {
    let mut sink = InMemorySink::new();
    sink.begin(config()).unwrap();
    sink.push_frame(FrameIndex(3), &red()).unwrap();
    sink.push_frame(FrameIndex(3), &red()).unwrap();
    sink.push_frame(FrameIndex(4), &red()).unwrap();
    sink.end().unwrap();

    let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, vec![3, 3, 4]);
    assert_eq!(sink.config(), Some(config()));
    assert!(sink.is_ended());

    sink.begin(config()).unwrap();
    assert!(sink.frames().is_empty());
}

#[test]
fn png_sink_writes_one_file_per_push() {
    let dir = temp_dir("png_sink");
    let mut sink = PngSequenceSink::new(&dir);
    sink.begin(config()).unwrap();
    sink.push_frame(FrameIndex(0), &red()).unwrap();
    sink.push_frame(FrameIndex(0), &red()).unwrap();
    sink.end().unwrap();

    assert_eq!(sink.written(), 2);
    let img = image::open(sink.frame_path(1)).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (2, 1));
    assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0, 255]);
    std::fs::remove_dir_all(&dir).unwrap();
}
