//! Safety module root.
//!
//! Limit sensor sampling and the end-of-tick Stop override.

pub mod monitor;

pub use monitor::{SafetyMonitor, SafetyVerdict};
