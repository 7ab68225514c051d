//! Collaborator contracts the core consumes but does not implement: the
//! concrete video encoder, the PNG sink, rotation notifications and
//! out-of-band error reporting. All are external per the core's scope; the
//! `Null*` implementations below exist only so the core is independently
//! testable without a real codec.

use capture_clock::MonotonicInstant;
use capture_drawable::Drawable;

/// A reason a video segment was rotated, passed to [NotifyNextVideo].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// `break_interval` elapsed.
    Interval,
    /// The caller asked for an early rotation via `next_video`.
    External,
}

/// The concrete video encoder, external to the core (`mp4-writer`, an nvenc
/// pipeline, ffmpeg, etc. in a real deployment). Modeled on
/// `Mp4Writer<T: Write + Seek>`'s `open`/`push_frame`/`close` surface,
/// generalized into a trait object so the orchestrator never depends on a
/// specific codec.
pub trait Encoder {
    #[allow(clippy::too_many_arguments)]
    fn open(
        &mut self,
        filename: &str,
        codec_name: &str,
        codec_options: &str,
        width: u32,
        height: u32,
        frame_rate: u32,
        file_permissions: u32,
    ) -> Result<(), String>;

    fn push_frame(&mut self, image: &Drawable, monotonic_timestamp: MonotonicInstant) -> Result<(), String>;

    fn flush(&mut self) -> Result<(), String>;

    fn close(&mut self) -> Result<(), String>;
}

/// The PNG still-preview sink, external to the core.
pub trait PngSink {
    fn write_png(&mut self, filename: &str, image: &Drawable) -> Result<(), String>;
}

/// Observer notified whenever the sequencer rotates to a new segment.
pub trait NotifyNextVideo {
    fn notify(&mut self, now: MonotonicInstant, reason: RotationReason);
}

/// Out-of-band structured error reporting, consulted when an encoder or
/// filename-generation failure must be surfaced without unwinding the
/// caller (spec: "transient I/O errors ... surfaced through `AclReportApi`
/// but do not unwind the caller").
pub trait AclReportApi {
    fn report(&mut self, kind: &str, message: &str) {
        tracing::error!(kind, message, "unrecoverable capture error reported");
    }
}

/// An [AclReportApi] that only logs, for callers with nothing else to wire
/// up.
#[derive(Debug, Default)]
pub struct LoggingAclReportApi;

impl AclReportApi for LoggingAclReportApi {}

/// An [Encoder] that accepts every call and discards the data, used when the
/// host wants the capture core's timing behaviour without a real codec.
#[derive(Debug, Default)]
pub struct NullEncoder {
    open: bool,
}

impl Encoder for NullEncoder {
    fn open(
        &mut self,
        _filename: &str,
        _codec_name: &str,
        _codec_options: &str,
        _width: u32,
        _height: u32,
        _frame_rate: u32,
        _file_permissions: u32,
    ) -> Result<(), String> {
        self.open = true;
        Ok(())
    }

    fn push_frame(&mut self, _image: &Drawable, _monotonic_timestamp: MonotonicInstant) -> Result<(), String> {
        if self.open {
            Ok(())
        } else {
            Err("push_frame called on a closed encoder".into())
        }
    }

    fn flush(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), String> {
        self.open = false;
        Ok(())
    }
}

/// A [PngSink] that accepts every call and discards the data.
#[derive(Debug, Default)]
pub struct NullPngSink;

impl PngSink for NullPngSink {
    fn write_png(&mut self, _filename: &str, _image: &Drawable) -> Result<(), String> {
        Ok(())
    }
}
