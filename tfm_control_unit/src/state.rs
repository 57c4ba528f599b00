//! Mode controller module root.
//!
//! `mode` owns the active mode and its per-tick dispatch; `targets` turns
//! parameters and geometry into per-axis step targets.

pub mod mode;
pub mod targets;

pub use mode::{ModeController, MotionInputs, TransitionCause};
