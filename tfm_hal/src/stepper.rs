//! Simulated stepper drive.
//!
//! `SimStepper` implements [`AxisDrive`] with an integer step position and a
//! triangular velocity profile:
//! - Positioning: accelerate toward the target, cruise at `max_speed`,
//!   decelerate so the axis arrives with the speed it can shed in one tick
//! - Velocity: constant speed set by `set_speed`, no ramp
//!
//! Fractional steps carry over between ticks so slow speeds still advance.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tfm_common::config::AxisDriveConfig;
use tfm_common::hal::AxisDrive;
use tracing::{debug, trace};

/// Read-only view of a drive's physical position.
///
/// The physical position is not affected by `set_current_position`, so
/// simulated endstops keep their place after homing re-zeroes the axis.
#[derive(Debug, Clone, Default)]
pub struct PositionTap(Rc<Cell<i64>>);

impl PositionTap {
    /// Physical position [steps].
    #[inline]
    pub fn get(&self) -> i64 {
        self.0.get()
    }

    #[inline]
    fn publish(&self, physical: i64) {
        self.0.set(physical);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveMode {
    Positioning,
    Velocity,
}

/// Stepper drive simulator.
#[derive(Debug)]
pub struct SimStepper {
    name: &'static str,
    /// Logical position [steps].
    position: i64,
    /// Physical position minus logical position.
    origin: i64,
    target: i64,
    /// Signed speed [steps/s].
    speed: f64,
    max_speed: f64,
    acceleration: f64,
    enabled: bool,
    mode: DriveMode,
    /// Decelerating toward the target `stop` picked.
    stopping: bool,
    /// Sub-step travel not yet emitted.
    residual: f64,
    tap: PositionTap,
}

impl SimStepper {
    /// Create a disabled drive at position 0.
    pub fn new(name: &'static str, max_speed: f64, acceleration: f64) -> Self {
        Self {
            name,
            position: 0,
            origin: 0,
            target: 0,
            speed: 0.0,
            max_speed,
            acceleration,
            enabled: false,
            mode: DriveMode::Positioning,
            stopping: false,
            residual: 0.0,
            tap: PositionTap::default(),
        }
    }

    /// Create a drive from its configuration section.
    pub fn from_config(name: &'static str, config: &AxisDriveConfig) -> Self {
        Self::new(name, config.max_speed, config.acceleration)
    }

    /// Shared handle to the physical position.
    pub fn tap(&self) -> PositionTap {
        self.tap.clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Emit `travel` steps (plus any carried fraction) and return the new
    /// position without committing it.
    fn integrate(&mut self, travel: f64) -> i64 {
        let total = travel + self.residual;
        let whole = total.trunc();
        self.residual = total - whole;
        self.position.saturating_add(whole as i64)
    }

    fn commit(&mut self, position: i64) {
        self.position = position;
        self.tap.publish(position.saturating_add(self.origin));
    }

    fn update_velocity(&mut self, dt: f64) -> bool {
        if self.speed == 0.0 {
            return false;
        }
        let next = self.integrate(self.speed * dt);
        self.commit(next);
        self.target = next;
        true
    }

    fn update_positioning(&mut self, dt: f64) -> bool {
        let error = (self.target - self.position) as f64;
        let max_dv = self.acceleration * dt;

        if error.abs() < 0.5 && self.speed.abs() <= max_dv {
            self.settle();
            return false;
        }

        // Triangular profile: brake once the stopping distance, plus one
        // tick of travel, reaches the target.
        let stopping_distance =
            self.speed * self.speed / (2.0 * self.acceleration) + self.speed.abs() * dt;
        let approaching = self.speed * error > 0.0;
        let desired = if error == 0.0 {
            0.0
        } else if approaching && error.abs() <= stopping_distance {
            error.signum() * (2.0 * self.acceleration * error.abs()).sqrt().min(self.max_speed)
        } else {
            error.signum() * self.max_speed
        };

        self.speed += (desired - self.speed).clamp(-max_dv, max_dv);
        self.speed = self.speed.clamp(-self.max_speed, self.max_speed);

        let next = self.integrate(self.speed * dt);
        let crossed = error != 0.0
            && ((error > 0.0 && next >= self.target) || (error < 0.0 && next <= self.target));
        if crossed {
            self.commit(self.target);
            self.settle();
            trace!("{}: arrived at {}", self.name, self.target);
            return false;
        }
        self.commit(next);
        true
    }

    fn settle(&mut self) {
        self.speed = 0.0;
        self.residual = 0.0;
        self.stopping = false;
    }
}

impl AxisDrive for SimStepper {
    fn position(&self) -> i64 {
        self.position
    }

    fn target(&self) -> i64 {
        self.target
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn max_speed(&self) -> f64 {
        self.max_speed
    }

    fn acceleration(&self) -> f64 {
        self.acceleration
    }

    fn set_max_speed(&mut self, steps_per_s: f64) {
        self.max_speed = steps_per_s.abs();
    }

    fn set_acceleration(&mut self, steps_per_s2: f64) {
        if steps_per_s2 > 0.0 {
            self.acceleration = steps_per_s2;
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            debug!("{} {}", self.name, if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        if !enabled {
            self.speed = 0.0;
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn move_to(&mut self, absolute: i64) {
        self.mode = DriveMode::Positioning;
        self.stopping = false;
        self.target = absolute;
    }

    fn set_speed(&mut self, steps_per_s: f64) {
        self.mode = DriveMode::Velocity;
        self.stopping = false;
        self.speed = steps_per_s.clamp(-self.max_speed, self.max_speed);
        self.target = self.position;
    }

    fn stop(&mut self) {
        // Repeated calls keep the braking target picked by the first one.
        if self.stopping && self.mode == DriveMode::Positioning {
            return;
        }
        self.mode = DriveMode::Positioning;
        if self.speed == 0.0 {
            self.target = self.position;
            return;
        }
        let stopping = (self.speed * self.speed / (2.0 * self.acceleration)).ceil() as i64;
        let offset = if self.speed > 0.0 { stopping } else { -stopping };
        self.target = self.position.saturating_add(offset);
        self.stopping = true;
    }

    fn set_current_position(&mut self, position: i64) {
        let physical = self.position.saturating_add(self.origin);
        self.origin = physical.saturating_sub(position);
        self.position = position;
        self.target = position;
        self.settle();
        self.mode = DriveMode::Positioning;
    }

    fn run(&mut self, dt: Duration) -> bool {
        if !self.enabled {
            return false;
        }
        let dt = dt.as_secs_f64();
        match self.mode {
            DriveMode::Velocity => self.update_velocity(dt),
            DriveMode::Positioning => self.update_positioning(dt),
        }
    }

    fn step_to(&mut self, position: i64, speed: f64) {
        if !self.enabled {
            return;
        }
        self.mode = DriveMode::Positioning;
        self.commit(position);
        self.target = position;
        self.speed = speed;
        self.residual = 0.0;
        self.stopping = false;
    }

    fn is_running(&self) -> bool {
        self.speed != 0.0 || (self.mode == DriveMode::Positioning && self.target != self.position)
    }
}
