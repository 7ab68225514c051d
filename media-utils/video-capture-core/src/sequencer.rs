//! File rotation for sequenced capture (component C5).

use capture_clock::{MonotonicInstant, RealInstant};
use capture_drawable::{Drawable, Rect};
use chrono::FixedOffset;
use frame_preparer::LazyDrawablePointer;

use crate::capture_ctx::{CaptureCtx, FrameMarkerConfig};
use crate::collaborators::{AclReportApi, Encoder, NotifyNextVideo, PngSink, RotationReason};
use crate::config::SequencedVideoParams;
use crate::filename_generator::FilenameGenerator;
use crate::Error;

/// Wraps a [CaptureCtx] with interval-based file rotation: on every
/// [Sequencer::periodic_snapshot], if `break_interval` has elapsed since the
/// current segment started, the encoder is rotated to a freshly numbered
/// file and a PNG preview of the last frame is emitted.
pub struct Sequencer {
    ctx: CaptureCtx,
    video_names: FilenameGenerator,
    png_names: FilenameGenerator,
    break_interval: std::time::Duration,
    segment_start: MonotonicInstant,
    next_video_is_first_call: bool,
}

impl Sequencer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: SequencedVideoParams,
        drawable_bounds: Rect,
        monotonic_now: MonotonicInstant,
        real_now: RealInstant,
        local_offset: FixedOffset,
        marker_config: Option<FrameMarkerConfig>,
        encoder: Box<dyn Encoder>,
    ) -> Result<Self, Error> {
        if params.break_interval.is_zero() {
            return Err(Error::ZeroBreakInterval);
        }

        let mut video_names = FilenameGenerator::new(params.filename_prefix.clone(), params.extension.clone());
        let png_names = FilenameGenerator::new(params.filename_prefix.clone(), params.png_extension.clone());
        let first_video_filename = video_names.next_name()?;

        let ctx = CaptureCtx::new(
            params.video,
            drawable_bounds,
            monotonic_now,
            real_now,
            local_offset,
            marker_config,
            encoder,
            &first_video_filename,
        )?;

        Ok(Self {
            ctx,
            video_names,
            png_names,
            break_interval: params.break_interval,
            segment_start: monotonic_now,
            next_video_is_first_call: true,
        })
    }

    pub fn ctx(&self) -> &CaptureCtx {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut CaptureCtx {
        &mut self.ctx
    }

    /// Drives one tick: first delegates to [CaptureCtx::snapshot], then
    /// rotates if the segment has run for at least `break_interval`.
    #[allow(clippy::too_many_arguments)]
    pub fn periodic_snapshot(
        &mut self,
        now: MonotonicInstant,
        cursor_x: i32,
        cursor_y: i32,
        drawable: &mut Drawable,
        pointer_provider: &mut dyn LazyDrawablePointer,
        png_sink: &mut dyn PngSink,
        notifier: &mut dyn NotifyNextVideo,
        acl: &mut dyn AclReportApi,
    ) -> Result<std::time::Duration, Error> {
        let wait = self.ctx.snapshot(now, cursor_x, cursor_y, drawable, pointer_provider, acl)?;

        if now.duration_since(self.segment_start) >= self.break_interval {
            self.rotate(now, RotationReason::Interval, png_sink, notifier, acl)?;
        }

        Ok(wait)
    }

    /// A caller-driven early rotation. The first call after construction is
    /// silently ignored, since the initial segment has just been opened.
    pub fn next_video(
        &mut self,
        now: MonotonicInstant,
        png_sink: &mut dyn PngSink,
        notifier: &mut dyn NotifyNextVideo,
        acl: &mut dyn AclReportApi,
    ) -> Result<(), Error> {
        if self.next_video_is_first_call {
            self.next_video_is_first_call = false;
            return Ok(());
        }
        self.rotate(now, RotationReason::External, png_sink, notifier, acl)
    }

    fn rotate(
        &mut self,
        now: MonotonicInstant,
        reason: RotationReason,
        png_sink: &mut dyn PngSink,
        notifier: &mut dyn NotifyNextVideo,
        acl: &mut dyn AclReportApi,
    ) -> Result<(), Error> {
        let video_filename = self.video_names.next_name()?;
        let png_filename = self.png_names.next_name()?;
        self.ctx.next_video(now, &video_filename, &png_filename, reason, png_sink, notifier, acl)?;
        self.segment_start = now;
        Ok(())
    }
}
