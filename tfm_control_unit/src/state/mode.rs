//! Mode controller: the single active [`Mode`] and its per-tick behaviour.
//!
//! ## Dispatch Table
//!
//! | Mode              | Each tick                                              |
//! |-------------------|--------------------------------------------------------|
//! | Stop              | decelerate every axis                                  |
//! | Home              | seek upper limit at 2× jog; then back off, zero, Stop  |
//! | ColdDraw          | relative runner move → RunningToPosition               |
//! | FrLayup           | synchronized Follower + mandrels move                  |
//! | Twist             | blocking lower-mandrel move → RunningToPosition        |
//! | Coil              | synchronized move on all four axes                     |
//! | Jog*              | constant jog speed on one axis                         |
//! | Spin              | constant speed on both mandrels                        |
//! | RunningToPosition | nothing; axes keep stepping toward their targets       |
//!
//! Any mode change abandons a running synchronized move.

use tfm_common::config::MachineConfig;
use tfm_common::hal::LimitInputs;
use tfm_common::process::{DerivedGeometry, MachineParameters};
use tfm_common::state::{AxisId, LimitFlags, Mode};
use tracing::{debug, error, info, warn};

use super::targets;
use crate::axes::MachineAxes;

/// Why the mode changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Accepted operator command.
    Command,
    /// Limit sensor tripped outside Home.
    LimitTrip,
    /// Limit inputs could not be read.
    SensorFault,
    /// Home sequence finished.
    HomeComplete,
    /// One-shot move issued.
    MoveIssued,
    /// Targets for the mode are not finite.
    InvalidTarget,
    /// Blocking move exceeded its bound.
    MoveTimeout,
    Shutdown,
}

impl TransitionCause {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::LimitTrip => "limit trip",
            Self::SensorFault => "sensor fault",
            Self::HomeComplete => "home complete",
            Self::MoveIssued => "move issued",
            Self::InvalidTarget => "invalid target",
            Self::MoveTimeout => "move timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only inputs for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct MotionInputs<'a> {
    pub params: &'a MachineParameters,
    pub geometry: &'a DerivedGeometry,
    pub config: &'a MachineConfig,
}

/// Owner of the active mode.
#[derive(Debug, Clone, Default)]
pub struct ModeController {
    mode: Mode,
    transitions: u64,
}

impl ModeController {
    /// Start in `Stop`.
    pub const fn new() -> Self {
        Self {
            mode: Mode::Stop,
            transitions: 0,
        }
    }

    #[inline]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of mode changes so far.
    #[inline]
    pub const fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Make `mode` the active mode. Returns `true` if it changed.
    ///
    /// Leaving (or re-entering) a synchronized mode abandons its group
    /// move, so the next dispatch plans from the axes' current positions.
    pub fn enter(&mut self, mode: Mode, cause: TransitionCause, axes: &mut MachineAxes) -> bool {
        if self.mode.is_synchronized() && axes.group_active() {
            debug!("{:?}: abandoning synchronized move", self.mode);
            axes.cancel_group();
        }
        if mode == self.mode {
            return false;
        }
        info!("mode {:?} -> {:?} ({cause})", self.mode, mode);
        self.mode = mode;
        self.transitions += 1;
        true
    }

    /// Run the active mode's behaviour for one tick.
    pub fn dispatch(
        &mut self,
        inputs: &MotionInputs<'_>,
        axes: &mut MachineAxes,
        limits: &mut dyn LimitInputs,
    ) {
        let MotionInputs {
            params,
            geometry,
            config,
        } = *inputs;
        let mech = &config.mechanics;
        let jog = config.motion.jog_speed;

        match self.mode {
            Mode::Stop => axes.stop_all(),
            Mode::Home => self.home(config, axes, limits),
            Mode::ColdDraw => match targets::cold_draw_steps(params, geometry, mech) {
                Some(steps) => {
                    axes.move_by(AxisId::ColdDrawRunner, steps);
                    self.enter(Mode::RunningToPosition, TransitionCause::MoveIssued, axes);
                }
                None => self.reject_targets(axes),
            },
            Mode::FrLayup => match targets::fr_layup_targets(params, geometry, mech) {
                Some(t) => {
                    axes.group_move(&t);
                }
                None => self.reject_targets(axes),
            },
            Mode::Twist => match targets::twist_steps(params, geometry, mech) {
                Some(steps) => {
                    axes.move_by(AxisId::LowerMandrel, steps);
                    match axes.run_blocking(AxisId::LowerMandrel) {
                        Ok(_) => {
                            self.enter(Mode::RunningToPosition, TransitionCause::MoveIssued, axes);
                        }
                        Err(e) => {
                            error!("twist aborted: {e}");
                            axes.stop_all();
                            self.enter(Mode::Stop, TransitionCause::MoveTimeout, axes);
                        }
                    }
                }
                None => self.reject_targets(axes),
            },
            Mode::Coil => match targets::coil_targets(params, geometry, mech) {
                Some(t) => {
                    axes.group_move(&t);
                }
                None => self.reject_targets(axes),
            },
            Mode::JogFollowerUp => axes.set_speed(AxisId::Follower, jog),
            Mode::JogFollowerDown => axes.set_speed(AxisId::Follower, -jog),
            Mode::JogRunnerUp => axes.set_speed(AxisId::ColdDrawRunner, jog),
            Mode::JogRunnerDown => axes.set_speed(AxisId::ColdDrawRunner, -jog),
            Mode::Spin => {
                let spin = config.motion.spin_speed;
                axes.set_speed(AxisId::UpperMandrel, spin);
                axes.set_speed(AxisId::LowerMandrel, -spin / mech.upper_mandrel_reduction);
            }
            Mode::RunningToPosition => {}
        }
    }

    /// Two-phase home: seek the upper limit, then back off and zero.
    fn home(&mut self, config: &MachineConfig, axes: &mut MachineAxes, limits: &mut dyn LimitInputs) {
        let flags = match limits.sample() {
            Ok(flags) => flags,
            Err(e) => {
                error!("home aborted: {e}");
                axes.stop_all();
                self.enter(Mode::Stop, TransitionCause::SensorFault, axes);
                return;
            }
        };

        if !flags.contains(LimitFlags::UPPER) {
            axes.set_speed(AxisId::Follower, 2.0 * config.motion.jog_speed);
            return;
        }

        let mech = &config.mechanics;
        debug!("upper limit reached, backing off {} mm", mech.home_backoff_mm);
        axes.move_by(AxisId::Follower, -mech.home_backoff_steps());
        match axes.run_blocking(AxisId::Follower) {
            Ok(ticks) => {
                axes.zero_all();
                info!("home complete after {ticks} back-off ticks, all axes zeroed");
                self.enter(Mode::Stop, TransitionCause::HomeComplete, axes);
            }
            Err(e) => {
                error!("home back-off aborted: {e}");
                axes.stop_all();
                self.enter(Mode::Stop, TransitionCause::MoveTimeout, axes);
            }
        }
    }

    fn reject_targets(&mut self, axes: &mut MachineAxes) {
        warn!("{:?}: motion targets are not finite, stopping", self.mode);
        axes.stop_all();
        self.enter(Mode::Stop, TransitionCause::InvalidTarget, axes);
    }
}
