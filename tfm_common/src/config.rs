//! Machine configuration loaded from TOML.
//!
//! Pin assignments and mechanical constants are injected at startup through
//! [`MachineConfig`] instead of being compiled in. Every field has a
//! `#[serde(default)]`, so an empty file yields the built-in machine.
//!
//! # TOML Example
//!
//! ```toml
//! cycle_time_us = 1000
//! frame_policy = "strict"
//!
//! [mechanics]
//! lead_steps_per_mm = 400.0
//! tube_length_buffer_mm = 120.0
//!
//! [axes.follower]
//! max_speed = 5000.0
//! acceleration = 10000.0
//! pins = { pulse = 2, direction = 5, enable = 8 }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    AXIS_ACCELERATION, AXIS_MAX_SPEED, COIL_BUFFER, COLD_DRAW_REDUCTION, CYCLE_TIME_US,
    CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, DIAGNOSTIC_INTERVAL_DEFAULT, HOME_BACKOFF_MM, JOG_SPEED,
    LEAD_STEPS_PER_MM, MAX_BLOCKING_TICKS_DEFAULT, RUNNER_BACKOFF_MM, SPIN_SPEED,
    STEPS_PER_REVOLUTION, TUBE_LENGTH_BUFFER_MM, UPPER_MANDREL_REDUCTION,
};
use crate::state::AxisId;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// File exists but could not be read.
    #[error("failed to read configuration: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// How the parser treats malformed numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    /// Missing or non-numeric fields read as 0; extra fields are ignored.
    #[default]
    Lenient,
    /// Frames with a wrong field count or a non-numeric field are rejected.
    Strict,
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete machine configuration.
///
/// Immutable once the control loop has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    /// Control tick period [µs].
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Upper bound on a blocking single-axis move [ticks].
    #[serde(default = "default_max_blocking_ticks")]
    pub max_blocking_ticks: u32,

    /// Status snapshot interval [cycles].
    #[serde(default = "default_diagnostic_interval")]
    pub diagnostic_interval: u32,

    #[serde(default)]
    pub frame_policy: FramePolicy,

    #[serde(default)]
    pub mechanics: MechanicsConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub axes: AxesConfig,

    #[serde(default)]
    pub limits: LimitPins,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}
fn default_max_blocking_ticks() -> u32 {
    MAX_BLOCKING_TICKS_DEFAULT
}
fn default_diagnostic_interval() -> u32 {
    DIAGNOSTIC_INTERVAL_DEFAULT
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            max_blocking_ticks: MAX_BLOCKING_TICKS_DEFAULT,
            diagnostic_interval: DIAGNOSTIC_INTERVAL_DEFAULT,
            frame_policy: FramePolicy::default(),
            mechanics: MechanicsConfig::default(),
            motion: MotionConfig::default(),
            axes: AxesConfig::default(),
            limits: LimitPins::default(),
        }
    }
}

impl MachineConfig {
    /// Parse and validate from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Tick period as a `Duration`.
    #[inline]
    pub fn cycle_time(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.cycle_time_us as u64)
    }

    /// Validate parameter bounds and pin assignments.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(ConfigError::ValidationError(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            )));
        }
        if self.max_blocking_ticks == 0 {
            return Err(ConfigError::ValidationError(
                "max_blocking_ticks must be > 0".to_string(),
            ));
        }
        if self.diagnostic_interval == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostic_interval must be > 0".to_string(),
            ));
        }
        self.mechanics.validate()?;
        self.motion.validate()?;
        for axis in AxisId::ALL {
            self.axes.get(axis).validate(axis)?;
        }
        self.validate_speeds()?;
        self.validate_pins()
    }

    /// Constant-speed modes must fit under the drive limits; a drive would
    /// otherwise clamp them silently.
    fn validate_speeds(&self) -> Result<(), ConfigError> {
        let jog = self.motion.jog_speed;
        let spin = self.motion.spin_speed;
        let checks = [
            ("2 * motion.jog_speed (home seek)", 2.0 * jog, AxisId::Follower),
            ("motion.jog_speed", jog, AxisId::ColdDrawRunner),
            ("motion.spin_speed", spin, AxisId::UpperMandrel),
            (
                "motion.spin_speed / mechanics.upper_mandrel_reduction",
                spin / self.mechanics.upper_mandrel_reduction,
                AxisId::LowerMandrel,
            ),
        ];
        for (what, speed, axis) in checks {
            let max = self.axes.get(axis).max_speed;
            if speed > max {
                return Err(ConfigError::ValidationError(format!(
                    "{what} = {speed} exceeds axes.{axis}.max_speed = {max}"
                )));
            }
        }
        Ok(())
    }

    /// Every output and input pin must be assigned exactly once.
    fn validate_pins(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let outputs = AxisId::ALL.iter().flat_map(|&axis| {
            let p = self.axes.get(axis).pins;
            [
                (axis.name(), "pulse", p.pulse),
                (axis.name(), "direction", p.direction),
                (axis.name(), "enable", p.enable),
            ]
        });
        let inputs = [
            ("limits", "upper", self.limits.upper),
            ("limits", "lower", self.limits.lower),
            ("limits", "runner", self.limits.runner),
        ];
        for (owner, role, pin) in outputs.chain(inputs) {
            if !seen.insert(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "pin {pin} assigned twice ({owner}.{role})"
                )));
            }
        }
        Ok(())
    }
}

// ─── Mechanics ──────────────────────────────────────────────────────

/// Mechanical constants used by the kinematics and target tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanicsConfig {
    /// Follower lead-screw resolution [steps/mm].
    #[serde(default = "default_lead_steps_per_mm")]
    pub lead_steps_per_mm: f64,
    /// Mandrel motor resolution [steps/rev].
    #[serde(default = "default_steps_per_revolution")]
    pub steps_per_revolution: f64,
    /// Upper mandrel gear reduction.
    #[serde(default = "default_upper_mandrel_reduction")]
    pub upper_mandrel_reduction: f64,
    /// Cold-draw runner resolution [steps/mm].
    #[serde(default = "default_cold_draw_reduction")]
    pub cold_draw_reduction: f64,
    /// Tube length kept in the fixtures [mm].
    #[serde(default = "default_tube_length_buffer_mm")]
    pub tube_length_buffer_mm: f64,
    /// Coils left at the end of a coiling pass.
    #[serde(default = "default_coil_buffer")]
    pub coil_buffer: f64,
    /// Follower back-off distance after homing [mm].
    #[serde(default = "default_home_backoff_mm")]
    pub home_backoff_mm: f64,
    /// Follower back-off distance after a runner limit trip [mm].
    #[serde(default = "default_runner_backoff_mm")]
    pub runner_backoff_mm: f64,
}

fn default_lead_steps_per_mm() -> f64 {
    LEAD_STEPS_PER_MM
}
fn default_steps_per_revolution() -> f64 {
    STEPS_PER_REVOLUTION
}
fn default_upper_mandrel_reduction() -> f64 {
    UPPER_MANDREL_REDUCTION
}
fn default_cold_draw_reduction() -> f64 {
    COLD_DRAW_REDUCTION
}
fn default_tube_length_buffer_mm() -> f64 {
    TUBE_LENGTH_BUFFER_MM
}
fn default_coil_buffer() -> f64 {
    COIL_BUFFER
}
fn default_home_backoff_mm() -> f64 {
    HOME_BACKOFF_MM
}
fn default_runner_backoff_mm() -> f64 {
    RUNNER_BACKOFF_MM
}

impl Default for MechanicsConfig {
    fn default() -> Self {
        Self {
            lead_steps_per_mm: LEAD_STEPS_PER_MM,
            steps_per_revolution: STEPS_PER_REVOLUTION,
            upper_mandrel_reduction: UPPER_MANDREL_REDUCTION,
            cold_draw_reduction: COLD_DRAW_REDUCTION,
            tube_length_buffer_mm: TUBE_LENGTH_BUFFER_MM,
            coil_buffer: COIL_BUFFER,
            home_backoff_mm: HOME_BACKOFF_MM,
            runner_backoff_mm: RUNNER_BACKOFF_MM,
        }
    }
}

impl MechanicsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("lead_steps_per_mm", self.lead_steps_per_mm),
            ("steps_per_revolution", self.steps_per_revolution),
            ("upper_mandrel_reduction", self.upper_mandrel_reduction),
            ("cold_draw_reduction", self.cold_draw_reduction),
            ("home_backoff_mm", self.home_backoff_mm),
            ("runner_backoff_mm", self.runner_backoff_mm),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "mechanics.{name} must be a positive number, got {value}"
                )));
            }
        }
        let non_negative = [
            ("tube_length_buffer_mm", self.tube_length_buffer_mm),
            ("coil_buffer", self.coil_buffer),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "mechanics.{name} must be >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Home back-off distance in Follower steps.
    #[inline]
    pub fn home_backoff_steps(&self) -> i64 {
        (self.home_backoff_mm * self.lead_steps_per_mm).round() as i64
    }

    /// Runner-trip back-off distance in Follower steps.
    #[inline]
    pub fn runner_backoff_steps(&self) -> i64 {
        (self.runner_backoff_mm * self.lead_steps_per_mm).round() as i64
    }
}

// ─── Motion ─────────────────────────────────────────────────────────

/// Constant-speed mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Jog speed for Follower and runner [steps/s]. Home seeks at twice this.
    #[serde(default = "default_jog_speed")]
    pub jog_speed: f64,
    /// Upper mandrel speed in Spin [steps/s].
    #[serde(default = "default_spin_speed")]
    pub spin_speed: f64,
}

fn default_jog_speed() -> f64 {
    JOG_SPEED
}
fn default_spin_speed() -> f64 {
    SPIN_SPEED
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            jog_speed: JOG_SPEED,
            spin_speed: SPIN_SPEED,
        }
    }
}

impl MotionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("jog_speed", self.jog_speed), ("spin_speed", self.spin_speed)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "motion.{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Axes ───────────────────────────────────────────────────────────

/// Output pins of one stepper driver. Enable is active-low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrivePins {
    pub pulse: u8,
    pub direction: u8,
    pub enable: u8,
}

/// Per-axis drive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisDriveConfig {
    /// Maximum speed [steps/s].
    #[serde(default = "default_axis_max_speed")]
    pub max_speed: f64,
    /// Acceleration [steps/s²].
    #[serde(default = "default_axis_acceleration")]
    pub acceleration: f64,
    pub pins: DrivePins,
}

fn default_axis_max_speed() -> f64 {
    AXIS_MAX_SPEED
}
fn default_axis_acceleration() -> f64 {
    AXIS_ACCELERATION
}

impl AxisDriveConfig {
    fn with_pins(pulse: u8, direction: u8, enable: u8) -> Self {
        Self {
            max_speed: AXIS_MAX_SPEED,
            acceleration: AXIS_ACCELERATION,
            pins: DrivePins {
                pulse,
                direction,
                enable,
            },
        }
    }

    fn validate(&self, axis: AxisId) -> Result<(), ConfigError> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "axes.{axis}.max_speed must be > 0, got {}",
                self.max_speed
            )));
        }
        if !(self.acceleration.is_finite() && self.acceleration > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "axes.{axis}.acceleration must be > 0, got {}",
                self.acceleration
            )));
        }
        Ok(())
    }
}

/// Drive configuration of all four axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxesConfig {
    #[serde(default = "default_follower")]
    pub follower: AxisDriveConfig,
    #[serde(default = "default_upper_mandrel")]
    pub upper_mandrel: AxisDriveConfig,
    #[serde(default = "default_lower_mandrel")]
    pub lower_mandrel: AxisDriveConfig,
    #[serde(default = "default_cold_draw_runner")]
    pub cold_draw_runner: AxisDriveConfig,
}

fn default_follower() -> AxisDriveConfig {
    AxisDriveConfig::with_pins(2, 5, 8)
}
fn default_upper_mandrel() -> AxisDriveConfig {
    AxisDriveConfig::with_pins(3, 6, 9)
}
fn default_lower_mandrel() -> AxisDriveConfig {
    AxisDriveConfig::with_pins(4, 7, 10)
}
fn default_cold_draw_runner() -> AxisDriveConfig {
    AxisDriveConfig::with_pins(12, 13, 14)
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            follower: default_follower(),
            upper_mandrel: default_upper_mandrel(),
            lower_mandrel: default_lower_mandrel(),
            cold_draw_runner: default_cold_draw_runner(),
        }
    }
}

impl AxesConfig {
    #[inline]
    pub fn get(&self, axis: AxisId) -> &AxisDriveConfig {
        match axis {
            AxisId::Follower => &self.follower,
            AxisId::UpperMandrel => &self.upper_mandrel,
            AxisId::LowerMandrel => &self.lower_mandrel,
            AxisId::ColdDrawRunner => &self.cold_draw_runner,
        }
    }
}

/// Limit sensor input pins (active-low, pull-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitPins {
    pub upper: u8,
    pub lower: u8,
    pub runner: u8,
}

impl Default for LimitPins {
    fn default() -> Self {
        Self {
            upper: 22,
            lower: 23,
            runner: 24,
        }
    }
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate a machine configuration file.
pub fn load_config(path: &Path) -> Result<MachineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::Io(format!("{}: {e}", path.display()))
        }
    })?;
    tracing::debug!("parsing machine config {}", path.display());
    MachineConfig::from_toml(&content)
}
