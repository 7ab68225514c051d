//! Converts monotonic instants to wall-clock time and schedules the next
//! frame deadline at a fixed cadence.
//!
//! Frame timing stays wall-clock-free in the hot path (`due`/`advance`
//! consult only [MonotonicInstant]) to avoid jitter from NTP steps; the
//! real-time mapping is consulted only when a frame is actually stamped.

use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("frame_rate must be in 1..=120, got {0}")]
    InvalidFrameRate(u32),
}

/// A steady, never-decreasing time point with sub-microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn from_std(instant: Instant) -> Self {
        Self(instant)
    }

    /// Elapsed time since `earlier`, floored at zero if `self` is actually
    /// before `earlier`.
    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

/// A wall-clock time point, used only for overlay rendering and
/// broken-down-time computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealInstant(DateTime<Utc>);

impl RealInstant {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn to_utc(self) -> DateTime<Utc> {
        self.0
    }
}

/// Broken-down local time, per the injected timezone offset, stamped onto
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenDownTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl std::fmt::Display for BrokenDownTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn signed_duration_since(base: Instant, point: Instant) -> chrono::Duration {
    if point >= base {
        chrono::Duration::from_std(point - base).unwrap_or(chrono::Duration::MAX)
    } else {
        -chrono::Duration::from_std(base - point).unwrap_or(chrono::Duration::MAX)
    }
}

/// `1 / frame_rate` as a duration. Invariant: `frame_rate >= 1`; constant for
/// the lifetime of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval(Duration);

impl FrameInterval {
    pub fn from_frame_rate(frame_rate: u32) -> Result<Self, Error> {
        if !(1..=120).contains(&frame_rate) {
            return Err(Error::InvalidFrameRate(frame_rate));
        }
        Ok(Self(Duration::from_secs_f64(1.0 / frame_rate as f64)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

/// An affine mapping `real = monotonic + offset`, captured at initialisation
/// and refreshed on `synchronize`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicToReal {
    anchor_monotonic: MonotonicInstant,
    anchor_real: RealInstant,
}

impl MonotonicToReal {
    pub fn new(m: MonotonicInstant, r: RealInstant) -> Self {
        Self {
            anchor_monotonic: m,
            anchor_real: r,
        }
    }

    /// Re-anchors the mapping so that `to_real(m) == r`. Idempotent for the
    /// same pair: calling it again with the same `(m, r)` leaves the mapping
    /// observationally identical.
    pub fn synchronize(&mut self, m: MonotonicInstant, r: RealInstant) {
        self.anchor_monotonic = m;
        self.anchor_real = r;
    }

    pub fn to_real(&self, m: MonotonicInstant) -> RealInstant {
        let elapsed = signed_duration_since(self.anchor_monotonic.0, m.0);
        RealInstant(self.anchor_real.0 + elapsed)
    }
}

/// Emits frame deadlines and translates monotonic instants to wall-clock
/// time, at a fixed `frame_rate` cadence.
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    frame_interval: FrameInterval,
    next_trace_time: MonotonicInstant,
    mapping: MonotonicToReal,
    local_offset: FixedOffset,
}

impl CaptureClock {
    /// `local_offset` is injected at construction rather than read from
    /// process-wide state, so tests do not need to mutate the process
    /// timezone to exercise overlay rendering in a non-UTC zone.
    pub fn new(
        monotonic_now: MonotonicInstant,
        real_now: RealInstant,
        frame_rate: u32,
        local_offset: FixedOffset,
    ) -> Result<Self, Error> {
        let frame_interval = FrameInterval::from_frame_rate(frame_rate)?;
        Ok(Self {
            frame_interval,
            next_trace_time: monotonic_now,
            mapping: MonotonicToReal::new(monotonic_now, real_now),
            local_offset,
        })
    }

    pub fn frame_interval(&self) -> FrameInterval {
        self.frame_interval
    }

    pub fn synchronize_times(&mut self, m: MonotonicInstant, r: RealInstant) {
        self.mapping.synchronize(m, r);
    }

    pub fn to_real(&self, m: MonotonicInstant) -> RealInstant {
        self.mapping.to_real(m)
    }

    pub fn to_broken_down(&self, m: MonotonicInstant) -> BrokenDownTime {
        let utc = self.to_real(m).to_utc();
        let local = utc.with_timezone(&self.local_offset);
        BrokenDownTime {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
        }
    }

    pub fn due(&self, now: MonotonicInstant) -> bool {
        now >= self.next_trace_time
    }

    /// Sets `next_trace_time := next_trace_time + k * frame_interval`, where
    /// `k` is the smallest positive integer making the result `> now`.
    /// Prevents drift under long stalls: a backlog of missed frames never
    /// accumulates, only one tick's worth of delay.
    pub fn advance(&mut self, now: MonotonicInstant) {
        let interval = self.frame_interval.as_duration();
        let mut candidate = self.next_trace_time.0;
        loop {
            candidate += interval;
            if candidate > now.0 {
                break;
            }
        }
        self.next_trace_time = MonotonicInstant(candidate);
    }

    /// `next_trace_time - now`, floored at zero, measured against the
    /// supplied instant. [Self::wait_until_next] is the OS-clock-driven
    /// convenience wrapper a host event loop calls directly.
    pub fn wait_until_next_from(&self, now: MonotonicInstant) -> Duration {
        if self.next_trace_time.0 > now.0 {
            self.next_trace_time.0 - now.0
        } else {
            Duration::ZERO
        }
    }

    pub fn wait_until_next(&self) -> Duration {
        self.wait_until_next_from(MonotonicInstant::now())
    }

    pub fn next_trace_time(&self) -> MonotonicInstant {
        self.next_trace_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(start: Instant, frame_rate: u32) -> CaptureClock {
        CaptureClock::new(
            MonotonicInstant::from_std(start),
            RealInstant::from_utc(Utc::now()),
            frame_rate,
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn invalid_frame_rate_rejected_at_construction() {
        let start = Instant::now();
        assert!(matches!(
            CaptureClock::new(
                MonotonicInstant::from_std(start),
                RealInstant::now(),
                0,
                FixedOffset::east_opt(0).unwrap(),
            ),
            Err(Error::InvalidFrameRate(0))
        ));
        assert!(matches!(
            CaptureClock::new(
                MonotonicInstant::from_std(start),
                RealInstant::now(),
                121,
                FixedOffset::east_opt(0).unwrap(),
            ),
            Err(Error::InvalidFrameRate(121))
        ));
    }

    #[test]
    fn advance_is_never_behind_now_and_never_decreases() {
        let start = Instant::now();
        let mut clock = clock_at(start, 25);
        let mut now = MonotonicInstant::from_std(start);
        let mut prev_trace = clock.next_trace_time();
        for _ in 0..50 {
            now = MonotonicInstant::from_std(now.0 + Duration::from_millis(40));
            clock.advance(now);
            assert!(clock.next_trace_time() > now);
            assert!(clock.next_trace_time() >= prev_trace);
            prev_trace = clock.next_trace_time();
        }
    }

    #[test]
    fn advance_collapses_a_long_stall_into_one_tick() {
        let start = Instant::now();
        let mut clock = clock_at(start, 25);
        let stalled_now = MonotonicInstant::from_std(start + Duration::from_secs(10));
        clock.advance(stalled_now);
        // exactly one interval past "now", not ten seconds' worth of ticks.
        let delta = clock.next_trace_time().0 - stalled_now.0;
        assert!(delta <= clock.frame_interval().as_duration());
    }

    #[test]
    fn synchronize_times_is_idempotent() {
        let start = Instant::now();
        let mut clock = clock_at(start, 25);
        let m = MonotonicInstant::from_std(start + Duration::from_secs(5));
        let r = RealInstant::from_utc(Utc::now());
        clock.synchronize_times(m, r);
        let first = clock.to_real(m);
        clock.synchronize_times(m, r);
        let second = clock.to_real(m);
        assert_eq!(first, second);
        assert_eq!(first, r);
    }

    #[test]
    fn clock_step_forward_does_not_affect_monotonic_spacing() {
        let start = Instant::now();
        let mut clock = clock_at(start, 25);
        let later = MonotonicInstant::from_std(start + Duration::from_secs(1));
        clock.synchronize_times(later, RealInstant::from_utc(Utc::now() + chrono::Duration::hours(1)));
        // the interval itself is untouched by a real-time step.
        assert_eq!(clock.frame_interval().as_duration(), Duration::from_secs_f64(1.0 / 25.0));
    }
}
