//! Process geometry from operator parameters.
//!
//! Pure functions; the control loop calls [`derive_geometry`] once per
//! accepted command and caches the result for every tick of that command.
//!
//! ```text
//! final_tube_length = draw_ratio · initial_length
//! helix_turn        = sqrt(coil_pitch² + (π · (mandrel_diam + tube_diam))²)
//! num_coils         = (final_tube_length − tube_length_buffer) / helix_turn − coil_buffer
//! muscle_length     = num_coils · coil_pitch
//! coil_angle        = atan2(coil_pitch, π · (mandrel_diam + tube_diam))
//! ```

use std::f64::consts::PI;

use tfm_common::config::MechanicsConfig;
use tfm_common::process::{DerivedGeometry, MachineParameters};

/// Circumference of the coil centre line [mm].
#[inline]
fn coil_circumference(params: &MachineParameters) -> f64 {
    PI * (params.mandrel_diam_mm + params.tube_diameter_mm)
}

/// Tube length consumed by one helical coil turn [mm].
#[inline]
pub fn helix_turn_length(params: &MachineParameters) -> f64 {
    params.coil_pitch_mm.hypot(coil_circumference(params))
}

pub fn derive_geometry(params: &MachineParameters, mech: &MechanicsConfig) -> DerivedGeometry {
    let final_tube_length_mm = params.draw_ratio * params.initial_length_mm;
    let num_coils = (final_tube_length_mm - mech.tube_length_buffer_mm) / helix_turn_length(params)
        - mech.coil_buffer;
    DerivedGeometry {
        final_tube_length_mm,
        num_coils,
        muscle_length_mm: num_coils * params.coil_pitch_mm,
        coil_angle_rad: params.coil_pitch_mm.atan2(coil_circumference(params)),
    }
}

/// Mandrel turns needed to twist the drawn tube to `twist_angle_deg`.
pub fn twist_turns(params: &MachineParameters, geometry: &DerivedGeometry) -> f64 {
    params.twist_angle_deg.to_radians().sin() * geometry.final_tube_length_mm
        / (2.0 * PI * params.tube_diameter_mm)
}

/// Runner travel for the cold draw [mm].
#[inline]
pub fn cold_draw_length_mm(params: &MachineParameters, geometry: &DerivedGeometry) -> f64 {
    geometry.final_tube_length_mm - params.initial_length_mm
}

/// Tube length laid up by the fibre-reinforcement pass [mm].
#[inline]
pub fn fr_length_mm(geometry: &DerivedGeometry, mech: &MechanicsConfig) -> f64 {
    geometry.final_tube_length_mm - mech.tube_length_buffer_mm
}

/// Tube length left uncoiled after the coil pass [mm].
pub fn uncoiled_length_mm(
    params: &MachineParameters,
    geometry: &DerivedGeometry,
    mech: &MechanicsConfig,
) -> f64 {
    geometry.final_tube_length_mm
        - geometry.muscle_length_mm
        - mech.tube_length_buffer_mm
        - mech.coil_buffer * helix_turn_length(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> MachineParameters {
        MachineParameters {
            twist_angle_deg: 35.0,
            initial_length_mm: 300.0,
            tube_diameter_mm: 2.6,
            draw_ratio: 1.2,
            fr_pitch_mm: 8.0,
            coil_pitch_mm: 7.0,
            mandrel_diam_mm: 3.0,
        }
    }

    #[test]
    fn reference_geometry() {
        let g = derive_geometry(&example(), &MechanicsConfig::default());
        assert!((g.final_tube_length_mm - 360.0).abs() < 1e-9);
        assert!((g.num_coils - 9.67).abs() < 0.01, "num_coils = {}", g.num_coils);
        assert!((g.muscle_length_mm - 67.7).abs() < 0.1, "muscle = {}", g.muscle_length_mm);
        assert!((g.coil_angle_rad - 0.3776).abs() < 2e-3, "angle = {}", g.coil_angle_rad);
    }

    #[test]
    fn deterministic() {
        let mech = MechanicsConfig::default();
        assert_eq!(derive_geometry(&example(), &mech), derive_geometry(&example(), &mech));
    }

    #[test]
    fn buffers_come_from_config() {
        let mech = MechanicsConfig {
            tube_length_buffer_mm: 0.0,
            coil_buffer: 0.0,
            ..MechanicsConfig::default()
        };
        let p = example();
        let g = derive_geometry(&p, &mech);
        assert!((g.num_coils - 360.0 / helix_turn_length(&p)).abs() < 1e-9);
    }

    #[test]
    fn twist_turns_reference() {
        let p = example();
        let g = derive_geometry(&p, &MechanicsConfig::default());
        // sin(35°) · 360 / (2π · 2.6)
        let expected = 35.0_f64.to_radians().sin() * 360.0 / (2.0 * PI * 2.6);
        assert!((twist_turns(&p, &g) - expected).abs() < 1e-12);
        assert!((twist_turns(&p, &g) - 12.6398).abs() < 1e-3);
    }

    #[test]
    fn lengths() {
        let p = example();
        let mech = MechanicsConfig::default();
        let g = derive_geometry(&p, &mech);
        assert!((cold_draw_length_mm(&p, &g) - 60.0).abs() < 1e-9);
        assert!((fr_length_mm(&g, &mech) - 240.0).abs() < 1e-9);
        let helix = helix_turn_length(&p);
        let expected = 360.0 - g.muscle_length_mm - 120.0 - 3.0 * helix;
        assert!((uncoiled_length_mm(&p, &g, &mech) - expected).abs() < 1e-9);
    }

    #[test]
    fn all_zero_parameters_give_non_finite_geometry() {
        let g = derive_geometry(&MachineParameters::default(), &MechanicsConfig::default());
        assert_eq!(g.final_tube_length_mm, 0.0);
        assert!(!g.is_finite());
    }
}
