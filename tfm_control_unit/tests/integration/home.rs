//! Home sequence: seek the upper endstop, back off, zero every axis.

use super::{Machine, frame};
use tfm_common::config::MachineConfig;
use tfm_common::state::{AxisId, Mode};

const ENDSTOP: i64 = 20_000;
const BACKOFF: i64 = 4_000;

#[test]
fn home_seeks_backs_off_and_zeroes() {
    let mut m = Machine::with_upper_endstop(MachineConfig::default(), ENDSTOP);
    m.send(&frame('A'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Home);

    let mut last = m.position(AxisId::Follower);
    let mut ticks = 0;
    while m.runner.context().mode() == Mode::Home {
        let speed = m.runner.context().axes().axis(AxisId::Follower).speed();
        assert_eq!(speed, 3200.0, "phase A seeks at twice jog speed");
        let pos = m.position(AxisId::Follower);
        assert!(pos >= last, "follower moved down while seeking");
        last = pos;
        m.ticks(1);
        ticks += 1;
        assert!(ticks < 10_000, "endstop never reached");
    }

    assert_eq!(m.runner.context().mode(), Mode::Stop);
    assert_eq!(m.runner.context().axes().positions(), [0; 4]);
    assert!(m.runner.context().axes().is_idle());

    // Physically the follower sits one back-off below where the switch tripped.
    let physical = m.taps[AxisId::Follower.index()].get();
    assert!(
        (ENDSTOP - BACKOFF..ENDSTOP - BACKOFF + 4).contains(&physical),
        "follower at {physical}"
    );
}

#[test]
fn home_on_endstop_backs_off_in_one_tick() {
    let mut m = Machine::with_upper_endstop(MachineConfig::default(), 0);
    m.send(&frame('A'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Stop);
    assert_eq!(m.runner.context().axes().positions(), [0; 4]);
    assert_eq!(m.taps[AxisId::Follower.index()].get(), -BACKOFF);
}

#[test]
fn rehoming_returns_to_same_reference() {
    let mut m = Machine::with_upper_endstop(MachineConfig::default(), ENDSTOP);
    m.send(&frame('A'));
    m.tick_until(10_000, |m| m.runner.context().command_epoch() == 1 && m.runner.context().mode() == Mode::Stop);
    let first = m.taps[AxisId::Follower.index()].get();

    // Jog away, then home again.
    m.send(&frame('H'));
    m.ticks(2_000);
    m.send(&frame('A'));
    m.tick_until(20_000, |m| m.runner.context().command_epoch() == 3 && m.runner.context().mode() == Mode::Stop);
    let second = m.taps[AxisId::Follower.index()].get();

    assert!((first - second).abs() <= 4, "{first} vs {second}");
    assert_eq!(m.position(AxisId::Follower), 0);
}

#[test]
fn home_only_moves_follower_before_zeroing() {
    let mut m = Machine::with_upper_endstop(MachineConfig::default(), 400);
    m.send(&frame('A'));
    m.ticks(50);
    for axis in [AxisId::UpperMandrel, AxisId::LowerMandrel, AxisId::ColdDrawRunner] {
        assert_eq!(m.taps[axis.index()].get(), 0, "{axis} moved during home");
    }
}
