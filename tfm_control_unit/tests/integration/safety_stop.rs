//! Limit sensor override.

use super::{Machine, frame};
use tfm_common::config::MachineConfig;
use tfm_common::state::{AxisId, LimitFlags, Mode};
use tfm_control_unit::safety::SafetyVerdict;

/// Largest braking distance at full speed: 4000² / (2 · 8000).
const MAX_BRAKING: i64 = 1000;

#[test]
fn any_trip_outside_home_stops_same_tick() {
    let modes = [
        ('B', Mode::ColdDraw),
        ('C', Mode::FrLayup),
        ('E', Mode::Coil),
        ('G', Mode::JogFollowerUp),
        ('H', Mode::JogFollowerDown),
        ('I', Mode::JogRunnerUp),
        ('J', Mode::JogRunnerDown),
        ('K', Mode::Spin),
    ];
    for (opcode, mode) in modes {
        let mut m = Machine::new(MachineConfig::default());
        m.send(&frame(opcode));
        m.ticks(200);
        assert_ne!(m.runner.context().mode(), Mode::Stop, "{mode:?} never started");

        m.limits.set_tripped(LimitFlags::LOWER, true);
        let verdict = m.runner.cycle();
        assert_eq!(verdict, SafetyVerdict::Tripped(LimitFlags::LOWER), "{mode:?}");
        assert_eq!(m.runner.context().mode(), Mode::Stop, "{mode:?}");
        for axis in AxisId::ALL {
            let drive = m.runner.context().axes().axis(axis);
            assert!(drive.distance_to_go().abs() <= MAX_BRAKING, "{mode:?}: {axis} not braking");
        }
        assert!(!m.runner.context().axes().group_active());

        m.limits.set_tripped(LimitFlags::LOWER, false);
        m.tick_until(2_000, |m| m.runner.context().axes().is_idle());
    }
}

#[test]
fn runner_trip_during_coil_backs_off_follower() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('E'));
    m.ticks(500);
    assert_eq!(m.runner.context().mode(), Mode::Coil);
    let before = m.position(AxisId::Follower);
    assert!(before < 0, "coil drives the follower down");

    m.limits.set_tripped(LimitFlags::RUNNER, true);
    m.ticks(1);
    let after = m.position(AxisId::Follower);
    assert_eq!(m.runner.context().mode(), Mode::Stop);
    // One more group increment (at most 4 steps), then the 400-step back-off.
    assert!((before + 396..=before + 400).contains(&after), "{before} -> {after}");
    assert_eq!(m.runner.context().axes().axis(AxisId::Follower).speed(), 0.0);

    m.limits.set_tripped(LimitFlags::RUNNER, false);
    m.tick_until(2_000, |m| m.runner.context().axes().is_idle());
}

#[test]
fn upper_endstop_stops_jog() {
    let mut m = Machine::with_upper_endstop(MachineConfig::default(), 2_000);
    m.send(&frame('G'));
    m.tick_until(5_000, |m| m.runner.context().mode() == Mode::Stop);
    m.tick_until(1_000, |m| m.runner.context().axes().is_idle());
    let pos = m.position(AxisId::Follower);
    // 1600 steps/s brakes within 160 steps.
    assert!((2_000..=2_162).contains(&pos), "follower at {pos}");
}

#[test]
fn sensor_fault_forces_stop() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('K'));
    m.ticks(100);
    m.limits.set_fault(true);
    assert_eq!(m.runner.cycle(), SafetyVerdict::SensorFault);
    assert_eq!(m.runner.context().mode(), Mode::Stop);

    // Commands are still accepted but stopped again while inputs are dead.
    m.send(&frame('K'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Stop);

    m.limits.set_fault(false);
    m.send(&frame('K'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Spin);
}

#[test]
fn home_ignores_tripped_lower_limit() {
    let mut m = Machine::new(MachineConfig::default());
    m.limits.set_tripped(LimitFlags::LOWER, true);
    m.send(&frame('A'));
    let verdict = m.runner.cycle();
    assert_eq!(verdict, SafetyVerdict::Exempt(LimitFlags::LOWER));
    assert_eq!(m.runner.context().mode(), Mode::Home);
}
