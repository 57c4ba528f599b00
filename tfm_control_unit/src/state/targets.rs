//! Step targets for each motion mode.
//!
//! | Mode     | Axis           | Target [steps]                                        |
//! |----------|----------------|-------------------------------------------------------|
//! | FrLayup  | Follower       | −fr_length · lead                                     |
//! | FrLayup  | UpperMandrel   | reduction · spr · fr_length / fr_pitch                |
//! | FrLayup  | LowerMandrel   | −spr · fr_length / fr_pitch                           |
//! | Coil     | Follower       | −muscle_length · lead                                 |
//! | Coil     | UpperMandrel   | reduction · spr · muscle_length / coil_pitch          |
//! | Coil     | LowerMandrel   | −(1 − cos(coil_angle)) · spr · muscle_length / coil_pitch |
//! | Coil     | ColdDrawRunner | −uncoiled_length · cold_draw_reduction                |
//!
//! Every builder returns `None` when a target is not a finite, representable
//! step count (zero pitch, zero diameter and the like).

use tfm_common::config::MechanicsConfig;
use tfm_common::process::{DerivedGeometry, MachineParameters};
use tfm_common::state::AxisId;

use crate::kinematics::{cold_draw_length_mm, fr_length_mm, twist_turns, uncoiled_length_mm};

/// Round a step count; `None` if it is not finite or does not fit `i64`.
#[inline]
fn to_steps(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or beyond it overflows.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let rounded = value.round();
    (rounded.is_finite() && rounded.abs() < LIMIT).then_some(rounded as i64)
}

pub fn fr_layup_targets(
    params: &MachineParameters,
    geometry: &DerivedGeometry,
    mech: &MechanicsConfig,
) -> Option<[(AxisId, i64); 3]> {
    let fr_length = fr_length_mm(geometry, mech);
    let turns = fr_length / params.fr_pitch_mm;
    Some([
        (AxisId::Follower, to_steps(-fr_length * mech.lead_steps_per_mm)?),
        (
            AxisId::UpperMandrel,
            to_steps(mech.upper_mandrel_reduction * mech.steps_per_revolution * turns)?,
        ),
        (AxisId::LowerMandrel, to_steps(-mech.steps_per_revolution * turns)?),
    ])
}

pub fn coil_targets(
    params: &MachineParameters,
    geometry: &DerivedGeometry,
    mech: &MechanicsConfig,
) -> Option<[(AxisId, i64); 4]> {
    let muscle = geometry.muscle_length_mm;
    let turns = muscle / params.coil_pitch_mm;
    let lower_per_turn = (1.0 - geometry.coil_angle_rad.cos()) * mech.steps_per_revolution;
    Some([
        (AxisId::Follower, to_steps(-muscle * mech.lead_steps_per_mm)?),
        (
            AxisId::UpperMandrel,
            to_steps(mech.upper_mandrel_reduction * mech.steps_per_revolution * turns)?,
        ),
        (AxisId::LowerMandrel, to_steps(-lower_per_turn * turns)?),
        (
            AxisId::ColdDrawRunner,
            to_steps(-uncoiled_length_mm(params, geometry, mech) * mech.cold_draw_reduction)?,
        ),
    ])
}

/// Relative runner move for the cold draw.
pub fn cold_draw_steps(
    params: &MachineParameters,
    geometry: &DerivedGeometry,
    mech: &MechanicsConfig,
) -> Option<i64> {
    to_steps(cold_draw_length_mm(params, geometry) * mech.cold_draw_reduction)
}

/// Relative lower-mandrel move for the twist.
pub fn twist_steps(
    params: &MachineParameters,
    geometry: &DerivedGeometry,
    mech: &MechanicsConfig,
) -> Option<i64> {
    to_steps(twist_turns(params, geometry) * mech.steps_per_revolution)
}
