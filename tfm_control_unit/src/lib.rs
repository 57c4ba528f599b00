//! # TFM Control Unit Library
//!
//! Tick-driven motion coordinator for a four-axis tube-forming machine
//! (cold draw, fibre-reinforced lay-up, twist, helical coil). Operator
//! commands arrive as terminated text frames; each tick ingests at most one
//! frame, dispatches the active mode, lets the safety monitor override it,
//! and advances every axis by one bounded increment.
//!
//! ## Module Map
//!
//! - [`command`] - frame tokenizer and command parser
//! - [`kinematics`] - process geometry from operator parameters
//! - [`state`] - mode controller and per-mode step targets
//! - [`safety`] - limit sensor monitor
//! - [`axes`] - drive bank, synchronized group, blocking moves
//! - [`transport`] - byte input and frame assembly
//! - [`pacing`] - wall-clock or simulated pacing of step increments
//! - [`cycle`] - control context, cycle runner, RT setup
//!
//! ## Threading
//!
//! All machine state is owned by the control thread. Only the transport's
//! reader thread runs alongside it, and it shares nothing but a channel.

pub mod axes;
pub mod command;
pub mod cycle;
pub mod kinematics;
pub mod pacing;
pub mod safety;
pub mod state;
pub mod transport;
