use fastseek_core::pixel::DecodeQuality;
use fastseek_media::controller::{FastSeekController, SeekConfig};
use fastseek_test_harness::assertions;
use fastseek_test_harness::fakes::{DecodeScript, ExhaustedSink, FakeBackend};

#[test]
fn test_seek_failure_yields_gradient() {
    // 60s source with seeking forced to fail: the caller still gets a
    // 426x240 opaque gradient rather than an error.
    let backend = FakeBackend::new().duration_ms(60_000).fail_seek();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));
    assert_eq!(controller.duration_ms(), 60_000);

    let buffer = controller.seek_to_frame(15_000).expect("placeholder");
    assertions::assert_dimensions(&buffer, 426, 240);
    assertions::assert_fully_opaque(&buffer);
    assertions::assert_horizontal_red_gradient(&buffer);
    assert_eq!(buffer.quality, DecodeQuality::Placeholder);
    assert!(buffer.pixel(0, 0)[0] < buffer.pixel(425, 0)[0]);
}

#[test]
fn test_decoder_that_never_outputs_falls_back() {
    let backend = FakeBackend::new().script(DecodeScript::NeverOutputs);
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    let buffer = controller.seek_to_frame(2_000).expect("placeholder");
    assert_eq!(buffer.quality, DecodeQuality::Placeholder);
    assertions::assert_dimensions(&buffer, 426, 240);
    assertions::assert_fully_opaque(&buffer);
    assert_eq!(probe.outstanding_outputs(), 0);
}

#[test]
fn test_seek_target_forwarded_in_microseconds() {
    let backend = FakeBackend::new();
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    assert!(controller.seek_to_frame(15_000).is_some());
    assert_eq!(probe.seek_targets(), vec![15_000_000]);

    assert!(controller.seek_to_frame(0).is_some());
    assert_eq!(probe.seek_targets(), vec![15_000_000, 0]);
}

#[test]
fn test_decoder_flushed_before_every_cycle() {
    let backend = FakeBackend::new();
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    assert!(controller.seek_to_frame(1_000).is_some());
    assert!(controller.seek_to_frame(1_000).is_some());
    assert_eq!(probe.flush_count(), 2);
}

#[test]
fn test_warmup_upgrades_placeholder_to_real() {
    let backend = FakeBackend::new().script(DecodeScript::WarmUpAfter(2));
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    let first = controller.seek_to_frame(3_000).expect("image");
    assert_eq!(first.quality, DecodeQuality::Placeholder);
    let second = controller.seek_to_frame(3_000).expect("image");
    assert_eq!(second.quality, DecodeQuality::Placeholder);

    // Third seek to the same spot: the decoder has warmed up.
    let third = controller.seek_to_frame(3_000).expect("image");
    assert_eq!(third.quality, DecodeQuality::Real);
    assertions::assert_dimensions(&third, 426, 240);
    assertions::assert_fully_opaque(&third);
}

#[test]
fn test_every_dequeued_output_is_released() {
    let backend = FakeBackend::new();
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    for ts in [0, 500, 1_000, 9_000] {
        let buffer = controller.seek_to_frame(ts).expect("image");
        assert_eq!(buffer.quality, DecodeQuality::Real);
    }
    assert_eq!(probe.outstanding_outputs(), 0);
}

#[test]
fn test_exhausted_source_falls_back() {
    // No samples at all: the cycle submits end-of-stream and the output side
    // only ever sees the non-displayable marker.
    let backend = FakeBackend::new().sample_count(0);
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    let buffer = controller.seek_to_frame(500).expect("placeholder");
    assert_eq!(buffer.quality, DecodeQuality::Placeholder);
    assert_eq!(probe.outstanding_outputs(), 0);
}

#[test]
fn test_exhausted_sink_yields_null_image() {
    let backend = FakeBackend::new();
    let mut controller =
        FastSeekController::with_backend(backend).with_sink(Box::new(ExhaustedSink));
    assert!(controller.init("scripted://clip"));

    assert!(controller.seek_to_frame(1_000).is_none());
}

#[test]
fn test_uninitialized_seek_returns_none() {
    let mut controller = FastSeekController::with_backend(FakeBackend::new());
    assert!(controller.seek_to_frame(1_000).is_none());
}

#[test]
fn test_custom_bounds_shape_the_placeholder() {
    let backend = FakeBackend::new().fail_seek();
    let config = SeekConfig {
        max_width: 200,
        max_height: 100,
        dequeue_timeout_ms: 10,
    };
    let mut controller = FastSeekController::with_backend(backend).with_config(config);
    assert!(controller.init("scripted://clip"));

    let buffer = controller.seek_to_frame(4_000).expect("placeholder");
    assertions::assert_dimensions(&buffer, 200, 100);
    assertions::assert_fully_opaque(&buffer);
}

#[test]
fn test_negative_timestamp_is_clamped() {
    let backend = FakeBackend::new();
    let probe = backend.clone();
    let mut controller = FastSeekController::with_backend(backend);
    assert!(controller.init("scripted://clip"));

    assert!(controller.seek_to_frame(-250).is_some());
    assert_eq!(probe.seek_targets(), vec![0]);
}
