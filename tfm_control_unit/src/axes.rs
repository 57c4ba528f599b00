//! The four machine axes and their per-tick bookkeeping.
//!
//! `MachineAxes` wraps the drive bank and the synchronized group. It records
//! which axes were advanced during the current tick so the stepping phase
//! gives every other axis exactly one `run` increment.
//!
//! ## Blocking Moves
//!
//! [`MachineAxes::run_blocking`] steps a single axis until it arrives. It is
//! bounded by `max_blocking_ticks`; on timeout the axis is told to stop and
//! the caller gets [`BlockingMoveError::Timeout`]. Under
//! [`Pacing::WallClock`] every increment after the first waits one tick
//! period, so the bound is `max_blocking_ticks × cycle_time` of wall time.

use std::time::Duration;

use thiserror::Error;
use tfm_common::config::MachineConfig;
use tfm_common::consts::AXIS_COUNT;
use tfm_common::hal::{AxisBank, AxisDrive};
use tfm_common::state::AxisId;
use tfm_hal::{GroupProgress, SyncGroup};
use tracing::{debug, info};

use crate::pacing::{Pacing, TickPacer};

/// Errors from bounded single-axis waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockingMoveError {
    #[error("{axis} did not reach its target within {limit} ticks")]
    Timeout { axis: AxisId, limit: u32 },

    #[error("{axis}: tick clock failed: {source}")]
    Clock {
        axis: AxisId,
        #[source]
        source: nix::Error,
    },
}

pub struct MachineAxes {
    bank: AxisBank,
    group: SyncGroup,
    /// Axes already stepped this tick.
    advanced: [bool; AXIS_COUNT],
    dt: Duration,
    max_blocking_ticks: u32,
    pacer: TickPacer,
}

impl MachineAxes {
    /// Configure speed and acceleration limits and enable every drive.
    pub fn new(mut bank: AxisBank, config: &MachineConfig) -> Self {
        for axis in AxisId::ALL {
            let drive_cfg = config.axes.get(axis);
            let drive = &mut bank[axis.index()];
            drive.set_max_speed(drive_cfg.max_speed);
            drive.set_acceleration(drive_cfg.acceleration);
            drive.set_enabled(true);
            info!(
                "{axis}: max_speed={} steps/s, acceleration={} steps/s², pins={:?}",
                drive_cfg.max_speed, drive_cfg.acceleration, drive_cfg.pins
            );
        }
        Self {
            bank,
            group: SyncGroup::new(),
            advanced: [false; AXIS_COUNT],
            dt: config.cycle_time(),
            max_blocking_ticks: config.max_blocking_ticks,
            pacer: TickPacer::new(config.cycle_time(), Pacing::Simulated),
        }
    }

    /// Pacing of blocking moves. Starts out [`Pacing::Simulated`].
    #[inline]
    pub fn pacing(&self) -> Pacing {
        self.pacer.pacing()
    }

    pub fn set_pacing(&mut self, pacing: Pacing) {
        if pacing != self.pacer.pacing() {
            debug!("blocking moves paced {pacing:?}");
        }
        self.pacer.set_pacing(pacing);
    }

    /// Tick period used for every increment.
    #[inline]
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// Start a new tick: no axis has been advanced yet.
    #[inline]
    pub fn begin_tick(&mut self) {
        self.advanced = [false; AXIS_COUNT];
    }

    #[inline]
    pub fn was_advanced(&self, axis: AxisId) -> bool {
        self.advanced[axis.index()]
    }

    #[inline]
    pub fn axis(&self, axis: AxisId) -> &dyn AxisDrive {
        self.bank[axis.index()].as_ref()
    }

    #[inline]
    pub fn axis_mut(&mut self, axis: AxisId) -> &mut dyn AxisDrive {
        self.bank[axis.index()].as_mut()
    }

    pub fn set_speed(&mut self, axis: AxisId, steps_per_s: f64) {
        self.axis_mut(axis).set_speed(steps_per_s);
    }

    pub fn move_by(&mut self, axis: AxisId, steps: i64) {
        debug!("{axis}: relative move {steps} steps");
        self.axis_mut(axis).move_by(steps);
    }

    /// Decelerate every axis to a halt.
    pub fn stop_all(&mut self) {
        for drive in self.bank.iter_mut() {
            drive.stop();
        }
    }

    /// Redefine the current position of every axis as zero.
    pub fn zero_all(&mut self) {
        for drive in self.bank.iter_mut() {
            drive.set_current_position(0);
        }
    }

    /// Issue (or re-issue) a synchronized move and advance it one tick.
    pub fn group_move(&mut self, targets: &[(AxisId, i64)]) -> GroupProgress {
        self.group.move_to(targets);
        let progress = self.group.run(&mut self.bank, self.dt);
        if progress != GroupProgress::Idle {
            for axis in self.group.members() {
                self.advanced[axis.index()] = true;
            }
        }
        progress
    }

    /// Abandon the synchronized move, if any.
    #[inline]
    pub fn cancel_group(&mut self) {
        self.group.cancel();
    }

    #[inline]
    pub fn group_active(&self) -> bool {
        self.group.is_active()
    }

    /// Step `axis` until it reaches its target. Returns the ticks spent.
    pub fn run_blocking(&mut self, axis: AxisId) -> Result<u32, BlockingMoveError> {
        let dt = self.dt;
        let limit = self.max_blocking_ticks;
        self.advanced[axis.index()] = true;
        let drive = self.bank[axis.index()].as_mut();
        let pacer = &mut self.pacer;
        pacer.restart();
        let mut ticks = 0;
        while drive.run(dt) {
            ticks += 1;
            if ticks >= limit {
                drive.stop();
                return Err(BlockingMoveError::Timeout { axis, limit });
            }
            if let Err(source) = pacer.wait() {
                drive.stop();
                return Err(BlockingMoveError::Clock { axis, source });
            }
        }
        debug!("{axis}: blocking move done in {ticks} ticks");
        Ok(ticks)
    }

    /// Give every axis not yet advanced this tick one `run` increment.
    pub fn step_remaining(&mut self) {
        for axis in AxisId::ALL {
            if !self.advanced[axis.index()] {
                self.bank[axis.index()].run(self.dt);
                self.advanced[axis.index()] = true;
            }
        }
    }

    pub fn positions(&self) -> [i64; AXIS_COUNT] {
        AxisId::ALL.map(|axis| self.axis(axis).position())
    }

    pub fn speeds(&self) -> [f64; AXIS_COUNT] {
        AxisId::ALL.map(|axis| self.axis(axis).speed())
    }

    /// True once no axis moves or has distance left to go.
    pub fn is_idle(&self) -> bool {
        self.bank.iter().all(|drive| !drive.is_running())
    }
}

impl std::fmt::Debug for MachineAxes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineAxes")
            .field("positions", &self.positions())
            .field("speeds", &self.speeds())
            .field("group", &self.group)
            .finish()
    }
}
