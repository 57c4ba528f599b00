//! Machine mode, axis identifiers and limit sensor flags.
//!
//! All enums use `#[repr(u8)]` for a compact layout. `Mode` is the single
//! active operating mode of the machine; exactly one is active at a time.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::AXIS_COUNT;

// ─── Mode ───────────────────────────────────────────────────────────

/// Operating mode of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Mode {
    /// Decelerate every axis to a halt.
    #[default]
    Stop = 0,
    /// Seek the upper limit, back off, zero all axes.
    Home = 1,
    /// One relative move on the cold-draw runner.
    ColdDraw = 2,
    /// Fibre-reinforcement lay-up: synchronized Follower + mandrels.
    FrLayup = 3,
    /// One relative twist on the lower mandrel.
    Twist = 4,
    /// Helical coil: synchronized move on all four axes.
    Coil = 5,
    JogFollowerUp = 6,
    JogFollowerDown = 7,
    JogRunnerUp = 8,
    JogRunnerDown = 9,
    /// Continuous rotation of both mandrels.
    Spin = 10,
    /// A one-shot move was issued; axes keep stepping toward their targets.
    RunningToPosition = 11,
}

impl Mode {
    /// Modes that re-issue a synchronized group move every tick.
    #[inline]
    pub const fn is_synchronized(&self) -> bool {
        matches!(self, Self::FrLayup | Self::Coil)
    }
}

// ─── Axes ───────────────────────────────────────────────────────────

/// Physical axis of the machine. Maps to array index via [`AxisId::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AxisId {
    /// Carriage translating along the tube (Z).
    Follower = 0,
    UpperMandrel = 1,
    LowerMandrel = 2,
    /// Pulls/feeds tube length during draw and coil.
    ColdDrawRunner = 3,
}

impl AxisId {
    /// All axes in index order.
    pub const ALL: [AxisId; AXIS_COUNT] = [
        Self::Follower,
        Self::UpperMandrel,
        Self::LowerMandrel,
        Self::ColdDrawRunner,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Follower => "follower",
            Self::UpperMandrel => "upper_mandrel",
            Self::LowerMandrel => "lower_mandrel",
            Self::ColdDrawRunner => "cold_draw_runner",
        }
    }
}

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Limit Sensors ──────────────────────────────────────────────────

bitflags! {
    /// Tripped limit sensors for one sample. Empty means all clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LimitFlags: u8 {
        /// Follower upper endstop (homing reference).
        const UPPER  = 0x01;
        /// Follower lower endstop.
        const LOWER  = 0x02;
        /// Cold-draw runner endstop.
        const RUNNER = 0x04;
    }
}

impl LimitFlags {
    /// Build flags from raw input levels of active-low, pulled-up sensors.
    ///
    /// A `false` (low) level means the sensor is tripped.
    #[inline]
    pub fn from_active_low(upper_level: bool, lower_level: bool, runner_level: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::UPPER, !upper_level);
        flags.set(Self::LOWER, !lower_level);
        flags.set(Self::RUNNER, !runner_level);
        flags
    }

    /// True if any sensor is tripped.
    #[inline]
    pub const fn any_tripped(&self) -> bool {
        !self.is_empty()
    }
}
