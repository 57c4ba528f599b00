//! Operator-supplied process parameters and the geometry derived from them.

use serde::{Deserialize, Serialize};

/// Parameters carried by one accepted command frame.
///
/// Replaced wholesale on every accepted frame; a field absent from the frame
/// reads as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineParameters {
    /// Twist angle of the fibre lay [deg].
    pub twist_angle_deg: f64,
    /// Tube length before drawing [mm].
    pub initial_length_mm: f64,
    /// Outer tube diameter [mm].
    pub tube_diameter_mm: f64,
    /// Final length / initial length.
    pub draw_ratio: f64,
    /// Fibre-reinforcement winding pitch [mm].
    pub fr_pitch_mm: f64,
    /// Coil pitch [mm].
    pub coil_pitch_mm: f64,
    /// Coiling mandrel diameter [mm].
    pub mandrel_diam_mm: f64,
}

/// Geometry cached once per accepted frame.
///
/// Values may be non-finite when the parameters are degenerate (zero pitch
/// and diameter); motion targets built from them are rejected downstream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedGeometry {
    /// Tube length after cold drawing [mm].
    pub final_tube_length_mm: f64,
    /// Number of helical coils in the muscle.
    pub num_coils: f64,
    /// Axial length of the coiled section [mm].
    pub muscle_length_mm: f64,
    /// Helix angle of the coil [rad].
    pub coil_angle_rad: f64,
}

impl DerivedGeometry {
    /// True if every field is a finite number.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.final_tube_length_mm.is_finite()
            && self.num_coils.is_finite()
            && self.muscle_length_mm.is_finite()
            && self.coil_angle_rad.is_finite()
    }
}
