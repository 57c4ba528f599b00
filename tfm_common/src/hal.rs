//! Hardware boundary traits and error types.
//!
//! This module defines:
//! - `AxisDrive` - acceleration/speed-limited single-axis step generator
//! - `LimitInputs` - the three limit sensor inputs
//! - `HalError` - errors reported by the hardware layer
//! - `AxisBank` - the fixed set of drives, indexed by `AxisId`
//!
//! Implementations live outside the control unit: `tfm_hal` ships a
//! simulation backend; a board backend wraps the physical pulse, direction
//! and enable lines.

use std::time::Duration;

use thiserror::Error;

use crate::consts::AXIS_COUNT;
use crate::state::LimitFlags;

/// Error types for hardware layer operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Limit sensor inputs could not be read.
    #[error("limit sensor read failed: {0}")]
    SensorFault(String),
}

/// Single-axis point motion primitive.
///
/// Positions are signed step counts. All motion progresses only through
/// [`AxisDrive::run`] or [`AxisDrive::step_to`]; every other method merely
/// updates the command state and returns immediately.
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `run()` | one step increment | **HARD** |
/// | `step_to()` | one step increment | **HARD** |
/// | everything else | O(1) | **HARD** |
pub trait AxisDrive {
    /// Current position [steps].
    fn position(&self) -> i64;

    /// Position the drive is heading to in positioning mode [steps].
    fn target(&self) -> i64;

    /// Current signed speed [steps/s].
    fn speed(&self) -> f64;

    fn max_speed(&self) -> f64;

    fn acceleration(&self) -> f64;

    fn set_max_speed(&mut self, steps_per_s: f64);

    fn set_acceleration(&mut self, steps_per_s2: f64);

    /// Drive the active-low enable line.
    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Absolute positioning move under the acceleration profile.
    fn move_to(&mut self, absolute: i64);

    /// Relative positioning move from the current position.
    fn move_by(&mut self, relative: i64) {
        let target = self.position().saturating_add(relative);
        self.move_to(target);
    }

    /// Constant-speed mode; takes effect immediately, clamped to `max_speed`.
    fn set_speed(&mut self, steps_per_s: f64);

    /// Decelerate to a halt at the configured acceleration.
    fn stop(&mut self);

    /// Redefine the current position without moving. Also clears speed.
    fn set_current_position(&mut self, position: i64);

    /// Advance one bounded increment. Returns `true` while still moving.
    fn run(&mut self, dt: Duration) -> bool;

    /// Externally paced increment used by synchronized groups: place the
    /// axis at `position` and report `speed` as its current speed.
    fn step_to(&mut self, position: i64, speed: f64);

    /// Remaining distance in positioning mode [steps].
    fn distance_to_go(&self) -> i64 {
        self.target() - self.position()
    }

    /// True while the axis moves or has distance left to go.
    fn is_running(&self) -> bool {
        self.speed() != 0.0 || self.distance_to_go() != 0
    }
}

/// The four machine axes, indexed by [`crate::state::AxisId::index`].
pub type AxisBank = [Box<dyn AxisDrive>; AXIS_COUNT];

/// Limit sensor inputs.
///
/// Every call reads the inputs afresh; implementations must not return a
/// value cached from an earlier call.
pub trait LimitInputs {
    fn sample(&mut self) -> Result<LimitFlags, HalError>;
}
