//! Tick pacing.
//!
//! Every `AxisDrive::run(dt)` call tells the drive that `dt` has elapsed.
//! Code that steps an axis more than once per control tick (blocking moves,
//! the shutdown drain) has to wait out the period between increments when
//! it drives real hardware; otherwise steps go out at CPU speed.
//!
//! [`TickPacer`] sleeps to absolute deadlines: `clock_nanosleep` with
//! `TIMER_ABSTIME` on `CLOCK_MONOTONIC` under the `rt` feature, `Instant`
//! plus `std::thread::sleep` otherwise. A caller that falls more than one
//! period behind is re-anchored to the current time instead of bursting
//! through the missed deadlines.

use std::time::Duration;

/// How step increments relate to wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Increments run back to back; time exists only as `dt`.
    /// Used by tests, benches and replays.
    #[default]
    Simulated,
    /// Each increment waits for the next period boundary.
    WallClock,
}

/// Absolute-deadline sleeper for one tick period.
#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    pacing: Pacing,
    next_wake: Option<clock::Deadline>,
}

impl TickPacer {
    pub const fn new(period: Duration, pacing: Pacing) -> Self {
        Self {
            period,
            pacing,
            next_wake: None,
        }
    }

    #[inline]
    pub const fn pacing(&self) -> Pacing {
        self.pacing
    }

    #[inline]
    pub const fn period(&self) -> Duration {
        self.period
    }

    pub fn set_pacing(&mut self, pacing: Pacing) {
        self.pacing = pacing;
        self.next_wake = None;
    }

    /// Forget the previous deadline; the next wait lasts a full period.
    #[inline]
    pub fn restart(&mut self) {
        self.next_wake = None;
    }

    /// Block until the next period boundary.
    ///
    /// Returns how late the caller arrived at the deadline [ns], 0 when
    /// simulated or on time.
    pub fn wait(&mut self) -> nix::Result<i64> {
        if self.pacing == Pacing::Simulated {
            return Ok(0);
        }
        let now = clock::now()?;
        let mut deadline = clock::add(self.next_wake.unwrap_or(now), self.period);
        let late_ns = clock::late_ns(&now, &deadline);
        if late_ns > self.period.as_nanos() as i64 {
            deadline = clock::add(now, self.period);
        }
        clock::sleep_until(&deadline)?;
        self.next_wake = Some(deadline);
        Ok(late_ns.max(0))
    }
}

#[cfg(not(feature = "rt"))]
mod clock {
    use std::time::{Duration, Instant};

    pub type Deadline = Instant;

    #[inline]
    pub fn now() -> nix::Result<Instant> {
        Ok(Instant::now())
    }

    #[inline]
    pub fn add(t: Instant, d: Duration) -> Instant {
        t + d
    }

    /// now − deadline [ns], negative when early.
    pub fn late_ns(now: &Instant, deadline: &Instant) -> i64 {
        match now.checked_duration_since(*deadline) {
            Some(late) => late.as_nanos() as i64,
            None => -((*deadline - *now).as_nanos() as i64),
        }
    }

    pub fn sleep_until(deadline: &Instant) -> nix::Result<()> {
        if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            std::thread::sleep(remaining);
        }
        Ok(())
    }
}

#[cfg(feature = "rt")]
mod clock {
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    pub type Deadline = TimeSpec;

    const CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

    #[inline]
    pub fn now() -> nix::Result<TimeSpec> {
        clock_gettime(CLOCK)
    }

    #[inline]
    pub fn add(t: TimeSpec, d: Duration) -> TimeSpec {
        timespec_add_ns(t, d.as_nanos() as i64)
    }

    #[inline]
    pub fn late_ns(now: &TimeSpec, deadline: &TimeSpec) -> i64 {
        timespec_diff_ns(now, deadline)
    }

    pub fn sleep_until(deadline: &TimeSpec) -> nix::Result<()> {
        loop {
            match clock_nanosleep(CLOCK, ClockNanosleepFlags::TIMER_ABSTIME, deadline) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn timespec_add_ns(ts: TimeSpec, ns: i64) -> TimeSpec {
        let mut secs = ts.tv_sec();
        let mut nanos = ts.tv_nsec() + ns;
        while nanos >= 1_000_000_000 {
            secs += 1;
            nanos -= 1_000_000_000;
        }
        TimeSpec::new(secs, nanos)
    }

    /// a − b [ns].
    fn timespec_diff_ns(a: &TimeSpec, b: &TimeSpec) -> i64 {
        (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
    }
}
