//! Synchronized and one-shot moves.

use std::time::{Duration, Instant};

use super::{Machine, frame};
use tfm_common::config::MachineConfig;
use tfm_common::state::{AxisId, Mode};
use tfm_control_unit::state::targets::{coil_targets, fr_layup_targets};

#[test]
fn fr_layup_members_arrive_together() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('C'));
    m.ticks(1);
    let ctx = m.runner.context();
    let targets = fr_layup_targets(ctx.params(), ctx.geometry(), &ctx.config().mechanics).unwrap();
    assert_eq!(
        targets,
        [
            (AxisId::Follower, -96_000),
            (AxisId::UpperMandrel, 192_000),
            (AxisId::LowerMandrel, -96_000)
        ]
    );

    // Upper mandrel needs 192000 / 4 = 48000 ticks; the others follow it.
    m.ticks(23_999);
    assert_eq!(m.position(AxisId::Follower), -48_000);
    assert_eq!(m.position(AxisId::UpperMandrel), 96_000);
    assert_eq!(m.position(AxisId::LowerMandrel), -48_000);

    m.ticks(23_999);
    for (axis, target) in targets {
        assert_ne!(m.position(axis), target, "{axis} arrived early");
    }
    m.ticks(1);
    for (axis, target) in targets {
        assert_eq!(m.position(axis), target, "{axis}");
    }
    assert_eq!(m.position(AxisId::ColdDrawRunner), 0);
    assert!(m.runner.context().axes().is_idle());

    // Mode stays active; re-issued targets hold the axes in place.
    m.ticks(100);
    assert_eq!(m.runner.context().mode(), Mode::FrLayup);
    assert_eq!(m.position(AxisId::UpperMandrel), 192_000);
}

#[test]
fn coil_drives_all_four_axes() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('E'));
    m.ticks(1);
    let ctx = m.runner.context();
    let targets = coil_targets(ctx.params(), ctx.geometry(), &ctx.config().mechanics).unwrap();

    let arrived = |m: &Machine| targets.iter().all(|&(axis, t)| m.position(axis) == t);
    let mut partial = false;
    m.tick_until(40_000, |m| {
        let count = targets.iter().filter(|&&(axis, t)| m.position(axis) == t).count();
        partial |= count > 0 && count < targets.len();
        arrived(m)
    });
    assert!(!partial, "members arrived on different ticks");
    assert_eq!(m.runner.context().mode(), Mode::Coil);
}

#[test]
fn interrupted_move_resumes_to_same_targets() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('C'));
    m.ticks(1_000);
    m.send(&frame('F'));
    m.tick_until(2_000, |m| m.runner.context().axes().is_idle());
    assert_eq!(m.runner.context().mode(), Mode::Stop);
    let paused = m.position(AxisId::UpperMandrel);
    assert!(paused > 4_000 && paused < 192_000);

    m.send(&frame('C'));
    m.tick_until(60_000, |m| m.position(AxisId::UpperMandrel) == 192_000);
    assert_eq!(m.position(AxisId::Follower), -96_000);
    assert_eq!(m.position(AxisId::LowerMandrel), -96_000);
}

#[test]
fn cold_draw_runs_to_position() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('B'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::RunningToPosition);
    m.tick_until(5_000, |m| m.runner.context().axes().is_idle());
    assert_eq!(m.position(AxisId::ColdDrawRunner), 6_000);
    for axis in [AxisId::Follower, AxisId::UpperMandrel, AxisId::LowerMandrel] {
        assert_eq!(m.position(axis), 0);
    }
}

#[test]
fn twist_completes_within_its_tick() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('D'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::RunningToPosition);
    assert_eq!(m.position(AxisId::LowerMandrel), 40_447);
    assert_eq!(m.runner.context().cycle(), 1);
}

#[test]
fn paced_twist_takes_its_travel_time() {
    let mut m = Machine::paced(MachineConfig::default());
    // sin 5° · 100 mm / (2π · 50 mm) turns ⇒ 89 lower-mandrel steps.
    m.send(b"D,5,100,50,1,8,7,3Z");
    let start = Instant::now();
    m.ticks(1);
    let elapsed = start.elapsed();

    assert_eq!(m.runner.context().mode(), Mode::RunningToPosition);
    let steps = m.position(AxisId::LowerMandrel);
    assert_eq!(steps, 89);
    // Triangular profile at 8000 steps/s²: 2·sqrt(89/8000) ≈ 0.21 s.
    let travel = Duration::from_secs_f64(2.0 * (steps as f64 / 8000.0).sqrt());
    assert!(elapsed >= travel.mul_f64(0.8), "{elapsed:?} < {travel:?}");
    assert!(elapsed < travel * 5, "{elapsed:?}");
}

#[test]
fn degenerate_parameters_stop() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(b"K,0,0,0,0,0,0,0Z");
    m.ticks(10);
    assert_eq!(m.runner.context().mode(), Mode::Spin);
    m.send(b"C,0,0,0,0,0,0,0Z");
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Stop);
}
