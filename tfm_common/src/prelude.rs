//! Common re-exports.
//!
//! ```rust
//! use tfm_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, FramePolicy, MachineConfig, MechanicsConfig};
pub use crate::consts::AXIS_COUNT;
pub use crate::hal::{AxisBank, AxisDrive, HalError, LimitInputs};
pub use crate::process::{DerivedGeometry, MachineParameters};
pub use crate::state::{AxisId, LimitFlags, Mode};
