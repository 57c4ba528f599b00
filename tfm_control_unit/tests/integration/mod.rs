//! Shared rig for the integration scenarios.

mod command_flow;
mod home;
mod safety_stop;
mod startup;
mod sync_motion;

use tfm_common::config::MachineConfig;
use tfm_common::state::{AxisId, LimitFlags};
use tfm_control_unit::cycle::{ControlContext, CycleRunner};
use tfm_control_unit::pacing::Pacing;
use tfm_hal::{LimitHandle, PositionTap, PositionTrip, SimLimitSwitches, TripSide, build_sim_bank};

/// The worked example from the process sheet.
pub const EXAMPLE_PARAMS: &str = "35,300,2.6,1.2,8,7,3";

/// Build a full frame for `opcode` with the example parameters.
pub fn frame(opcode: char) -> Vec<u8> {
    format!("{opcode},{EXAMPLE_PARAMS}Z").into_bytes()
}

pub struct Machine {
    pub runner: CycleRunner,
    pub limits: LimitHandle,
    pub taps: [PositionTap; 4],
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self::build(config, None, Pacing::Simulated)
    }

    /// Blocking moves wait out the tick period in wall time.
    pub fn paced(config: MachineConfig) -> Self {
        Self::build(config, None, Pacing::WallClock)
    }

    /// Upper endstop `steps` above the Follower's start position.
    pub fn with_upper_endstop(config: MachineConfig, steps: i64) -> Self {
        Self::build(config, Some(steps), Pacing::Simulated)
    }

    fn build(config: MachineConfig, upper: Option<i64>, pacing: Pacing) -> Self {
        let (bank, taps) = build_sim_bank(&config);
        let mut switches = SimLimitSwitches::new();
        if let Some(threshold) = upper {
            switches = switches.with_trip(PositionTrip {
                sensor: LimitFlags::UPPER,
                tap: taps[AxisId::Follower.index()].clone(),
                threshold,
                side: TripSide::AtOrAbove,
            });
        }
        let limits = switches.handle();
        let ctx = ControlContext::new(config, bank, Box::new(switches))
            .unwrap()
            .with_pacing(pacing);
        Self {
            runner: CycleRunner::new(ctx),
            limits,
            taps,
        }
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.runner.feed(bytes);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.runner.cycle();
        }
    }

    /// Tick until `done` holds; panics after `limit` ticks.
    pub fn tick_until(&mut self, limit: usize, mut done: impl FnMut(&Self) -> bool) -> usize {
        for n in 0..limit {
            if done(self) {
                return n;
            }
            self.runner.cycle();
        }
        panic!("condition not reached within {limit} ticks");
    }

    pub fn position(&self, axis: AxisId) -> i64 {
        self.runner.context().axes().axis(axis).position()
    }
}
