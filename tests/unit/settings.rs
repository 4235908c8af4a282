use super::*;

#[test]
fn defaults_are_valid() {
    let s = Settings::default();
    s.validate().unwrap();
    assert_eq!(s.video_tracks, 64);
    assert_eq!(s.preload_window, 60);
    assert_eq!(s.transition_timeout(), Duration::from_secs(2));
}

#[test]
fn partial_json_keeps_defaults() {
    let s = Settings::from_json_str(r#"{ "output_fps": { "num": 25, "den": 1 } }"#).unwrap();
    assert_eq!(s.output_fps, Fps { num: 25, den: 1 });
    assert_eq!(s.canvas, Settings::default().canvas);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = Settings::from_json_str(r#"{ "fps": 25 }"#).unwrap_err();
    assert!(matches!(err, ReelflowError::Serde(_)));
}

#[test]
fn too_many_tracks_is_a_config_error() {
    let err = Settings::from_json_str(r#"{ "video_tracks": 65 }"#).unwrap_err();
    assert!(matches!(err, ReelflowError::Config(_)));
}

#[test]
fn zero_fps_is_a_config_error() {
    let err = Settings::from_json_str(r#"{ "output_fps": { "num": 0, "den": 1 } }"#).unwrap_err();
    assert!(matches!(err, ReelflowError::Config(_)));
}

#[test]
fn samples_per_tick_rounds_up() {
    let a = AudioFormat {
        sample_rate: 48_000,
        channels: 2,
    };
    assert_eq!(a.samples_per_tick(Fps { num: 25, den: 1 }), 1920);
    assert_eq!(a.samples_per_tick(Fps { num: 30000, den: 1001 }), 1602);
}

#[test]
fn from_path_reports_missing_file() {
    let err = Settings::from_path("target/does-not-exist/settings.json").unwrap_err();
    assert!(matches!(err, ReelflowError::Config(_)));
}
