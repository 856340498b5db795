use fastseek_core::pixel::DecodeQuality;
use fastseek_media::controller::{FastSeekController, SeekConfig};
use fastseek_test_harness::{assertions, fixtures};

#[test]
fn test_init_and_duration() {
    fixtures::init_test_logging();
    let dir = fixtures::fixture_dir();
    let path = fixtures::generate_test_video(dir.path(), "ctrl_init", 3.0);

    let mut controller = FastSeekController::new();
    assert!(controller.init(path.to_str().unwrap()));

    let duration = controller.duration_ms();
    assert!(
        (2400..=4500).contains(&duration),
        "duration: {duration}"
    );
    assert_eq!(controller.dimensions(), (320, 240));
    assert!(controller.codec().unwrap().starts_with("video/"));
}

#[test]
fn test_seek_upgrades_to_real_frame() {
    let dir = fixtures::fixture_dir();
    let path = fixtures::generate_test_video(dir.path(), "ctrl_seek", 2.0);

    let mut controller = FastSeekController::new();
    assert!(controller.init(path.to_str().unwrap()));

    // A cold decoder may serve the placeholder first; repeated seeks to the
    // same timestamp must upgrade to real content.
    let mut buffer = None;
    for _ in 0..10 {
        let candidate = controller.seek_to_frame(500).expect("image");
        let done = candidate.quality == DecodeQuality::Real;
        buffer = Some(candidate);
        if done {
            break;
        }
    }
    let buffer = buffer.unwrap();
    assert_eq!(buffer.quality, DecodeQuality::Real);
    assert_eq!((buffer.width, buffer.height), (320, 240));
    assertions::assert_fully_opaque(&buffer);
}

#[test]
fn test_init_missing_file_returns_false() {
    let mut controller = FastSeekController::new();
    assert!(!controller.init("/nonexistent/clip.mp4"));
    assert_eq!(controller.duration_ms(), 0);
    assert!(controller.seek_to_frame(1_000).is_none());
}

#[test]
fn test_init_audio_only_returns_false() {
    let dir = fixtures::fixture_dir();
    let path = fixtures::generate_audio_only(dir.path(), "ctrl_audio_only", 1.0);

    let mut controller = FastSeekController::new();
    assert!(!controller.init(path.to_str().unwrap()));
    assert_eq!(controller.duration_ms(), 0);
}

#[test]
fn test_reinit_switches_sources() {
    let dir = fixtures::fixture_dir();
    let short = fixtures::generate_test_video(dir.path(), "ctrl_short", 1.0);
    let long = fixtures::generate_test_video(dir.path(), "ctrl_long", 3.0);

    let mut controller = FastSeekController::new();
    assert!(controller.init(short.to_str().unwrap()));
    let first = controller.duration_ms();

    assert!(controller.init(long.to_str().unwrap()));
    let second = controller.duration_ms();
    assert!(
        second > first,
        "expected longer duration after re-init: {first} -> {second}"
    );
    assert!(controller.seek_to_frame(1_500).is_some());
}

#[test]
fn test_release_then_seek_returns_none() {
    let dir = fixtures::fixture_dir();
    let path = fixtures::generate_test_video(dir.path(), "ctrl_release", 1.0);

    let mut controller = FastSeekController::new();
    assert!(controller.init(path.to_str().unwrap()));
    controller.release();

    assert!(controller.seek_to_frame(100).is_none());
    assert_eq!(controller.duration_ms(), 0);
    controller.release();
}

#[test]
fn test_repeated_seeks_yield_independent_buffers() {
    let dir = fixtures::fixture_dir();
    let path = fixtures::generate_test_video(dir.path(), "ctrl_independent", 1.0);

    let mut controller = FastSeekController::new();
    assert!(controller.init(path.to_str().unwrap()));

    let mut first = controller.seek_to_frame(200).expect("first image");
    let second = controller.seek_to_frame(200).expect("second image");

    let untouched = second.pixel(0, 0)[0];
    first.pixel_mut(0, 0)[0] = untouched.wrapping_add(1);
    assert_eq!(
        second.pixel(0, 0)[0],
        untouched,
        "buffers must not alias each other"
    );
}

#[test]
fn test_seek_config_serde_roundtrip() {
    let config = SeekConfig {
        max_width: 320,
        max_height: 180,
        dequeue_timeout_ms: 5,
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: SeekConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
}
