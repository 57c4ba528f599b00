//! # TFM HAL
//!
//! Simulation backend for the tube-forming machine's hardware boundary.
//!
//! # Module Structure
//!
//! - [`stepper`] - `SimStepper`, an acceleration-limited step generator
//! - [`sync_group`] - `SyncGroup`, simultaneous-arrival multi-axis moves
//! - [`limits`] - `SimLimitSwitches`, active-low endstop inputs
//!
//! The control unit sees only the `AxisDrive` and `LimitInputs` traits from
//! `tfm_common::hal`; a board backend can replace this crate without touching
//! the control logic.

pub mod limits;
pub mod stepper;
pub mod sync_group;

pub use crate::limits::{LimitHandle, PositionTrip, SimLimitSwitches, TripSide};
pub use crate::stepper::{PositionTap, SimStepper};
pub use crate::sync_group::{GroupProgress, SyncGroup};

use tfm_common::config::MachineConfig;
use tfm_common::hal::{AxisBank, AxisDrive};
use tfm_common::state::AxisId;

/// Build the four simulated drives from configuration, in [`AxisId`] order,
/// together with taps on their physical positions.
pub fn build_sim_bank(config: &MachineConfig) -> (AxisBank, [PositionTap; 4]) {
    let drives = AxisId::ALL.map(|axis| SimStepper::from_config(axis.name(), config.axes.get(axis)));
    let taps = [
        drives[0].tap(),
        drives[1].tap(),
        drives[2].tap(),
        drives[3].tap(),
    ];
    let bank = drives.map(|d| Box::new(d) as Box<dyn AxisDrive>);
    (bank, taps)
}
