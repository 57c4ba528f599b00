//! Simulated limit sensors.
//!
//! Three active-low inputs with pull-ups. A sensor reads tripped when its
//! level is forced low through a [`LimitHandle`] or when a [`PositionTrip`]
//! sees its axis beyond a physical threshold.

use std::cell::Cell;
use std::rc::Rc;

use heapless::Vec;
use tfm_common::hal::{HalError, LimitInputs};
use tfm_common::state::LimitFlags;
use tracing::trace;

use crate::stepper::PositionTap;

#[derive(Debug)]
struct Levels {
    upper: Cell<bool>,
    lower: Cell<bool>,
    runner: Cell<bool>,
    fault: Cell<bool>,
}

impl Default for Levels {
    fn default() -> Self {
        // Pulled up: every sensor reads clear.
        Self {
            upper: Cell::new(true),
            lower: Cell::new(true),
            runner: Cell::new(true),
            fault: Cell::new(false),
        }
    }
}

/// Test and simulation handle that drives the sensor levels.
#[derive(Debug, Clone)]
pub struct LimitHandle(Rc<Levels>);

impl LimitHandle {
    /// Force the given sensors tripped (`true`) or released (`false`).
    pub fn set_tripped(&self, flags: LimitFlags, tripped: bool) {
        if flags.contains(LimitFlags::UPPER) {
            self.0.upper.set(!tripped);
        }
        if flags.contains(LimitFlags::LOWER) {
            self.0.lower.set(!tripped);
        }
        if flags.contains(LimitFlags::RUNNER) {
            self.0.runner.set(!tripped);
        }
    }

    /// Make every subsequent `sample` fail until cleared.
    pub fn set_fault(&self, fault: bool) {
        self.0.fault.set(fault);
    }
}

/// Which side of the threshold trips the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripSide {
    AtOrAbove,
    AtOrBelow,
}

/// Endstop that trips from an axis' physical position.
#[derive(Debug, Clone)]
pub struct PositionTrip {
    pub sensor: LimitFlags,
    pub tap: PositionTap,
    /// Physical position of the endstop [steps].
    pub threshold: i64,
    pub side: TripSide,
}

impl PositionTrip {
    fn tripped(&self) -> bool {
        let position = self.tap.get();
        match self.side {
            TripSide::AtOrAbove => position >= self.threshold,
            TripSide::AtOrBelow => position <= self.threshold,
        }
    }
}

/// Simulated sensor block implementing [`LimitInputs`].
#[derive(Debug)]
pub struct SimLimitSwitches {
    levels: Rc<Levels>,
    trips: Vec<PositionTrip, 3>,
}

impl SimLimitSwitches {
    pub fn new() -> Self {
        Self {
            levels: Rc::new(Levels::default()),
            trips: Vec::new(),
        }
    }

    /// Handle for driving the levels from outside the control loop.
    pub fn handle(&self) -> LimitHandle {
        LimitHandle(Rc::clone(&self.levels))
    }

    /// Attach a position-driven endstop. At most one per sensor; a
    /// later trip for the same sensor replaces the earlier one.
    pub fn with_trip(mut self, trip: PositionTrip) -> Self {
        self.trips.retain(|t| t.sensor != trip.sensor);
        let _ = self.trips.push(trip);
        self
    }
}

impl Default for SimLimitSwitches {
    fn default() -> Self {
        Self::new()
    }
}

impl LimitInputs for SimLimitSwitches {
    fn sample(&mut self) -> Result<LimitFlags, HalError> {
        if self.levels.fault.get() {
            return Err(HalError::SensorFault("simulated input fault".to_string()));
        }
        let mut upper = self.levels.upper.get();
        let mut lower = self.levels.lower.get();
        let mut runner = self.levels.runner.get();
        for trip in self.trips.iter().filter(|t| t.tripped()) {
            if trip.sensor.contains(LimitFlags::UPPER) {
                upper = false;
            }
            if trip.sensor.contains(LimitFlags::LOWER) {
                lower = false;
            }
            if trip.sensor.contains(LimitFlags::RUNNER) {
                runner = false;
            }
        }
        let flags = LimitFlags::from_active_low(upper, lower, runner);
        if flags.any_tripped() {
            trace!("limit sample: {:?}", flags);
        }
        Ok(flags)
    }
}
