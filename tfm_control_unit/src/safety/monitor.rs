//! Limit sensor monitor.
//!
//! Runs once per tick after mode dispatch and before the stepping phase, so
//! its decision is the last word on what the axes do this tick.
//!
//! - Any sensor tripped outside Home ⇒ Stop, every axis decelerates
//! - Runner sensor tripped ⇒ bounded Follower back-off first
//! - Sensors unreadable ⇒ treated as tripped, in every mode

use tfm_common::config::MechanicsConfig;
use tfm_common::hal::LimitInputs;
use tfm_common::state::{AxisId, LimitFlags, Mode};
use tracing::{debug, error, info, warn};

use crate::axes::MachineAxes;
use crate::state::{ModeController, TransitionCause};

/// Outcome of one safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// No sensor tripped.
    Clear,
    /// Sensors tripped while homing; no override.
    Exempt(LimitFlags),
    /// Sensors tripped; Stop forced.
    Tripped(LimitFlags),
    /// Inputs unreadable; Stop forced.
    SensorFault,
}

impl SafetyVerdict {
    /// True when the check overrode the active mode.
    #[inline]
    pub const fn forced_stop(&self) -> bool {
        matches!(self, Self::Tripped(_) | Self::SensorFault)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyMonitor {
    /// Sensors tripped at the previous check.
    latched: LimitFlags,
    sensor_fault: bool,
    /// Ticks on which Stop was forced.
    trips: u64,
}

impl SafetyMonitor {
    pub const fn new() -> Self {
        Self {
            latched: LimitFlags::empty(),
            sensor_fault: false,
            trips: 0,
        }
    }

    /// Sensors that were tripped at the last check.
    #[inline]
    pub const fn latched(&self) -> LimitFlags {
        self.latched
    }

    #[inline]
    pub const fn trips(&self) -> u64 {
        self.trips
    }

    /// Sample the sensors and override the mode if required.
    pub fn check(
        &mut self,
        modes: &mut ModeController,
        axes: &mut MachineAxes,
        limits: &mut dyn LimitInputs,
        mech: &MechanicsConfig,
    ) -> SafetyVerdict {
        let flags = match limits.sample() {
            Ok(flags) => {
                if self.sensor_fault {
                    info!("limit inputs readable again");
                    self.sensor_fault = false;
                }
                flags
            }
            Err(e) => {
                if !self.sensor_fault {
                    error!("{e}; forcing Stop");
                    self.sensor_fault = true;
                }
                modes.enter(Mode::Stop, TransitionCause::SensorFault, axes);
                axes.stop_all();
                self.trips += 1;
                return SafetyVerdict::SensorFault;
            }
        };

        self.track(flags);
        if !flags.any_tripped() {
            return SafetyVerdict::Clear;
        }
        if modes.mode() == Mode::Home {
            return SafetyVerdict::Exempt(flags);
        }

        axes.cancel_group();
        if flags.contains(LimitFlags::RUNNER) {
            axes.move_by(AxisId::Follower, mech.runner_backoff_steps());
            if let Err(e) = axes.run_blocking(AxisId::Follower) {
                error!("runner back-off aborted: {e}");
            }
        }
        modes.enter(Mode::Stop, TransitionCause::LimitTrip, axes);
        axes.stop_all();
        self.trips += 1;
        SafetyVerdict::Tripped(flags)
    }

    fn track(&mut self, flags: LimitFlags) {
        let rising = flags - self.latched;
        let falling = self.latched - flags;
        if !rising.is_empty() {
            warn!("limit tripped: {rising:?}");
        } else if !flags.is_empty() {
            debug!("limit still tripped: {flags:?}");
        }
        if !falling.is_empty() {
            info!("limit cleared: {falling:?}");
        }
        self.latched = flags;
    }
}
