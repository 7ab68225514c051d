//! The capture orchestrator (component C4): holds pipeline state and
//! implements the `snapshot` / `frame_marker_event` / `next_video` state
//! machine described in spec section 4.4.

use std::time::Duration;

use capture_clock::{CaptureClock, MonotonicInstant, RealInstant};
use capture_drawable::{Drawable, Rect};
use chrono::FixedOffset;
use damage_tracker::DamageTracker;
use frame_preparer::{FramePreparer, LazyDrawablePointer, PrepareFlags};

use crate::collaborators::{AclReportApi, Encoder, NotifyNextVideo, PngSink, RotationReason};
use crate::config::VideoParams;
use crate::Error;

/// Policy for a bit past the end of [FrameMarkerConfig::bitset] (spec.md
/// §9, "Open question: behaviour when frame-marker bitset is exhausted").
/// The original is silent; the caller must pick one explicitly rather than
/// the core guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsetExhaustionPolicy {
    /// Treat a missing bit as 0: stop emitting once the bitset runs out.
    GateClosed,
    /// Treat a missing bit as 1: keep emitting once the bitset runs out.
    GateOpen,
}

/// The externally-provided recording of which historical frames were
/// authorised by a frame-marker end, used to reproduce bit-exact timing
/// when replaying a recorded session.
#[derive(Debug, Clone)]
pub struct FrameMarkerConfig {
    pub bitset: Vec<bool>,
    pub exhaustion: BitsetExhaustionPolicy,
}

impl FrameMarkerConfig {
    fn bit(&self, frame_index: u64) -> bool {
        self.bitset.get(frame_index as usize).copied().unwrap_or(match self.exhaustion {
            BitsetExhaustionPolicy::GateOpen => true,
            BitsetExhaustionPolicy::GateClosed => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Idle,
    AwaitingMarker,
}

/// Holds pipeline state for one capture session: the clock, damage tracker,
/// frame preparer, the (possibly absent) encoder, and the frame-marker
/// gating state machine.
pub struct CaptureCtx {
    clock: CaptureClock,
    damage: DamageTracker,
    preparer: FramePreparer,
    params: VideoParams,
    drawable_bounds: Rect,
    state: CaptureState,
    frame_index: u64,
    cursor: (i32, i32),
    marker_config: Option<FrameMarkerConfig>,
    encoder: Option<Box<dyn Encoder>>,
    last_capture_monotonic: Option<MonotonicInstant>,
    last_frame_snapshot: Option<Drawable>,
}

impl CaptureCtx {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: VideoParams,
        drawable_bounds: Rect,
        monotonic_now: MonotonicInstant,
        real_now: RealInstant,
        local_offset: FixedOffset,
        marker_config: Option<FrameMarkerConfig>,
        mut encoder: Box<dyn Encoder>,
        initial_video_filename: &str,
    ) -> Result<Self, Error> {
        let clock = CaptureClock::new(monotonic_now, real_now, params.frame_rate, local_offset)?;
        let preparer = FramePreparer::new(drawable_bounds, params.crop_rect)?;
        let damage = DamageTracker::new(drawable_bounds.width, drawable_bounds.height);

        encoder
            .open(
                initial_video_filename,
                &params.codec_name,
                &params.codec_options,
                drawable_bounds.width,
                drawable_bounds.height,
                params.frame_rate,
                params.file_permissions,
            )
            .map_err(Error::EncoderOpenFailed)?;

        Ok(Self {
            clock,
            damage,
            preparer,
            params,
            drawable_bounds,
            state: CaptureState::Idle,
            frame_index: 0,
            cursor: (0, 0),
            marker_config,
            encoder: Some(encoder),
            last_capture_monotonic: None,
            last_frame_snapshot: None,
        })
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn is_awaiting_marker(&self) -> bool {
        self.state == CaptureState::AwaitingMarker
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Drives one tick of the capture. See spec section 4.4 for the
    /// numbered algorithm this follows exactly.
    pub fn snapshot(
        &mut self,
        now: MonotonicInstant,
        cursor_x: i32,
        cursor_y: i32,
        drawable: &mut Drawable,
        pointer_provider: &mut dyn LazyDrawablePointer,
        acl: &mut dyn AclReportApi,
    ) -> Result<Duration, Error> {
        self.cursor = (cursor_x, cursor_y);

        if self.clock_went_backwards(now) {
            tracing::trace!(?now, "clock went backwards; treating as idempotent");
            return Ok(self.clock.wait_until_next_from(now));
        }

        if !self.clock.due(now) && !self.damage.has_damage() {
            return Ok(self.clock.wait_until_next_from(now));
        }

        if self.marker_config.is_some() {
            self.state = CaptureState::AwaitingMarker;
            return Ok(self.clock.frame_interval().as_duration());
        }

        self.emit(now, drawable, pointer_provider, acl);
        Ok(self.clock.wait_until_next_from(now))
    }

    /// Signals the end of an atomic rendering group. Only emits the pending
    /// frame if the current frame's bit in the marker bitset is set; see
    /// [FrameMarkerConfig].
    #[allow(clippy::too_many_arguments)]
    pub fn frame_marker_event(
        &mut self,
        now: MonotonicInstant,
        cursor_x: i32,
        cursor_y: i32,
        drawable: &mut Drawable,
        pointer_provider: &mut dyn LazyDrawablePointer,
        acl: &mut dyn AclReportApi,
    ) -> Result<Duration, Error> {
        self.cursor = (cursor_x, cursor_y);

        let Some(config) = self.marker_config.as_ref() else {
            return Ok(self.clock.wait_until_next_from(now));
        };

        if config.bit(self.frame_index) {
            self.emit(now, drawable, pointer_provider, acl);
            self.state = CaptureState::Idle;
        }
        Ok(self.clock.wait_until_next_from(now))
    }

    /// Forces the encoder to flush the current frame. Used at stream end
    /// and at sequenced rotation points.
    pub fn encoding_end_frame(&mut self) -> Result<(), Error> {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.flush().map_err(Error::EncoderWriteFailed)?;
        }
        Ok(())
    }

    pub fn synchronize_times(&mut self, m: MonotonicInstant, r: RealInstant) {
        self.clock.synchronize_times(m, r);
    }

    /// Updates the crop rectangle; forces the next frame to carry full
    /// damage (spec.md §4.4).
    pub fn set_cropping(&mut self, rect: Rect) -> Result<(), Error> {
        self.preparer.set_cropping(rect, self.drawable_bounds)?;
        self.params.crop_rect = rect;
        self.damage.force_full_damage();
        Ok(())
    }

    /// Recomputes `is_fullscreen` and the damage bounds after a drawable
    /// resize.
    pub fn update_fullscreen(&mut self, new_drawable_bounds: Rect) -> Result<(), Error> {
        self.preparer.set_cropping(self.preparer.crop_rect(), new_drawable_bounds)?;
        self.drawable_bounds = new_drawable_bounds;
        self.damage.set_area(new_drawable_bounds.width, new_drawable_bounds.height);
        Ok(())
    }

    pub fn is_fullscreen(&self) -> bool {
        self.preparer.is_fullscreen()
    }

    /// Closes the current encoder (if any), writes a still preview of the
    /// last emitted frame, opens a new encoder at `new_video_filename`, and
    /// notifies the observer. Called directly by a caller-driven early
    /// rotation, or by [crate::Sequencer] on an interval boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn next_video(
        &mut self,
        now: MonotonicInstant,
        new_video_filename: &str,
        new_png_filename: &str,
        reason: RotationReason,
        png_sink: &mut dyn PngSink,
        notifier: &mut dyn NotifyNextVideo,
        acl: &mut dyn AclReportApi,
    ) -> Result<(), Error> {
        let Some(encoder) = self.encoder.as_mut() else {
            // No encoder instance at all; nothing to rotate.
            return Ok(());
        };

        if let Err(e) = encoder.close() {
            acl.report("encoder_close_failed", &e);
        }

        if let Some(last_frame) = self.last_frame_snapshot.as_ref() {
            if let Err(e) = png_sink.write_png(new_png_filename, last_frame) {
                acl.report("png_write_failed", &e);
            }
        }

        // Reopen the same trait object at the new filename rather than
        // constructing a fresh one, per the "optional encoder, held or
        // absent across rotations" design note: rotation is `close();
        // open()`, not a new handle each segment.
        match encoder.open(
            new_video_filename,
            &self.params.codec_name,
            &self.params.codec_options,
            self.drawable_bounds.width,
            self.drawable_bounds.height,
            self.params.frame_rate,
            self.params.file_permissions,
        ) {
            Ok(()) => {
                self.damage.force_full_damage();
                notifier.notify(now, reason);
            }
            Err(e) => {
                acl.report("encoder_open_failed", &e);
                // §4.5: the slot is marked unavailable; subsequent snapshots
                // are dropped while damage keeps accumulating. Does not
                // unwind the caller (spec §7 propagation policy).
                self.encoder = None;
            }
        }
        Ok(())
    }

    fn clock_went_backwards(&mut self, now: MonotonicInstant) -> bool {
        matches!(self.last_capture_monotonic, Some(last) if now < last)
    }

    fn emit(
        &mut self,
        now: MonotonicInstant,
        drawable: &mut Drawable,
        pointer_provider: &mut dyn LazyDrawablePointer,
        acl: &mut dyn AclReportApi,
    ) {
        let Some(encoder) = self.encoder.as_mut() else {
            // Degraded state (spec.md §7: EncoderOpenFailed/WriteFailed);
            // emission is skipped but damage keeps accumulating.
            return;
        };

        let broken_down = self.clock.to_broken_down(now);
        let flags = PrepareFlags {
            draw_timestamp: self.params.image_by_interval.draws_timestamp(),
            draw_pointer: self.params.draw_pointer,
        };

        let push_result;
        let captured_frame;
        {
            let view = self.preparer.acquire_image_for_dump(drawable, self.cursor, &broken_down, flags, pointer_provider);
            push_result = encoder.push_frame(view.image(), now);
            captured_frame = view.image().clone();
        }
        self.preparer.release_image_for_dump(drawable);

        match push_result {
            Ok(()) => {
                self.last_frame_snapshot = Some(captured_frame);
                self.last_capture_monotonic = Some(now);
                self.clock.advance(now);
                self.damage.reset();
                self.frame_index += 1;
            }
            Err(e) => {
                // The segment is treated as closed; the encoder instance is
                // kept so the next rotation's close()/open() can recover it
                // (spec.md §7: "rotation attempted on the next
                // `break_interval` boundary"). Reported, not propagated
                // (spec §7 propagation policy: transient I/O errors do not
                // unwind the caller).
                acl.report("encoder_write_failed", &e);
            }
        }
    }
}
