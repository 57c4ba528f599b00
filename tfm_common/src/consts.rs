//! Workspace-wide constants.
//!
//! Single source of truth for the command frame format and the built-in
//! machine defaults. Every mechanical value here can be overridden from the
//! machine TOML; these are only the fallbacks used by `#[serde(default)]`.

use static_assertions::const_assert;

// ─── Axes ───────────────────────────────────────────────────────────

/// Number of actuated axes (Follower, UpperMandrel, LowerMandrel, ColdDrawRunner).
pub const AXIS_COUNT: usize = 4;

// ─── Command Frame ──────────────────────────────────────────────────

/// Frame terminator sentinel.
pub const FRAME_TERMINATOR: char = 'Z';

/// Field delimiter inside a frame.
pub const FRAME_DELIMITER: char = ',';

/// Opcode + seven numeric parameters.
pub const FRAME_FIELD_COUNT: usize = 8;

/// Capacity of the transport-side frame buffer [bytes].
pub const FRAME_BUFFER_CAPACITY: usize = 256;

const_assert!(FRAME_BUFFER_CAPACITY >= 64);

// ─── Cycle ──────────────────────────────────────────────────────────

/// Default control tick period [µs].
pub const CYCLE_TIME_US: u32 = 1000;
pub const CYCLE_TIME_US_MIN: u32 = 50;
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Default bound on a blocking single-axis move [ticks].
pub const MAX_BLOCKING_TICKS_DEFAULT: u32 = 30_000;

/// Default status snapshot interval [cycles].
pub const DIAGNOSTIC_INTERVAL_DEFAULT: u32 = 1000;

// ─── Mechanics ──────────────────────────────────────────────────────

/// Follower lead-screw resolution [steps/mm].
pub const LEAD_STEPS_PER_MM: f64 = 400.0;

/// Mandrel motor resolution [steps/rev] (200 full steps × 16 microsteps).
pub const STEPS_PER_REVOLUTION: f64 = 3200.0;

/// Upper mandrel gear reduction relative to the lower mandrel.
pub const UPPER_MANDREL_REDUCTION: f64 = 2.0;

/// Cold-draw runner resolution [steps/mm].
pub const COLD_DRAW_REDUCTION: f64 = 100.0;

/// Tube length held in the fixtures and never coiled [mm].
pub const TUBE_LENGTH_BUFFER_MM: f64 = 120.0;

/// Coils left unwound at the end of a coiling pass.
pub const COIL_BUFFER: f64 = 3.0;

/// Follower back-off after the upper limit trips during Home [mm].
pub const HOME_BACKOFF_MM: f64 = 10.0;

/// Follower back-off after the runner limit trips [mm].
pub const RUNNER_BACKOFF_MM: f64 = 1.0;

// ─── Motion ─────────────────────────────────────────────────────────

/// Jog speed [steps/s].
pub const JOG_SPEED: f64 = 1600.0;

/// Upper mandrel spin speed [steps/s].
pub const SPIN_SPEED: f64 = 1600.0;

/// Default per-axis maximum speed [steps/s].
pub const AXIS_MAX_SPEED: f64 = 4000.0;

/// Default per-axis acceleration [steps/s²].
pub const AXIS_ACCELERATION: f64 = 8000.0;
