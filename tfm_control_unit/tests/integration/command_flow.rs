//! Operator frames through the full ingest path.

use super::{Machine, frame};
use tfm_common::config::{FramePolicy, MachineConfig};
use tfm_common::state::{AxisId, Mode};

#[test]
fn unknown_opcode_resolves_to_stop() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('K'));
    m.ticks(10);
    assert_eq!(m.runner.context().mode(), Mode::Spin);

    // Leading `Z` terminates an empty record first, then the rest follows.
    m.send(b"Z,35,300,2.6,1.2,8,7,3Z");
    m.ticks(2);
    assert_eq!(m.runner.context().mode(), Mode::Stop);
    assert_eq!(m.runner.context().command_epoch(), 3);
}

#[test]
fn frame_split_across_reads() {
    let mut m = Machine::new(MachineConfig::default());
    for chunk in [&b"C,35,30"[..], b"0,2.6,1.", b"2,8,7,3", b"Z"] {
        assert_eq!(m.runner.context().mode(), Mode::Stop);
        m.send(chunk);
        m.ticks(1);
    }
    assert_eq!(m.runner.context().mode(), Mode::FrLayup);
    assert_eq!(m.runner.context().params().draw_ratio, 1.2);
}

#[test]
fn parameters_replaced_wholesale() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('F'));
    m.ticks(1);
    assert_eq!(m.runner.context().params().coil_pitch_mm, 7.0);

    // Short lenient frame: absent fields read as zero.
    m.send(b"F,10Z");
    m.ticks(1);
    let params = m.runner.context().params();
    assert_eq!(params.twist_angle_deg, 10.0);
    assert_eq!(params.initial_length_mm, 0.0);
    assert_eq!(params.coil_pitch_mm, 0.0);
}

#[test]
fn strict_policy_rejects_malformed_frames() {
    let config = MachineConfig {
        frame_policy: FramePolicy::Strict,
        ..MachineConfig::default()
    };
    let mut m = Machine::new(config);
    m.send(&frame('K'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Spin);

    m.send(b"F,35,x,2.6,1.2,8,7,3Z");
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Spin);
    assert_eq!(m.runner.context().command_epoch(), 1);

    m.send(b"F,1Z");
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Spin);
}

#[test]
fn runaway_input_is_discarded() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&[b'9'; 1000]);
    m.ticks(1);
    assert!(m.runner.backlog() <= 256);

    // The leftover junk garbles the next opcode, which fails safe to Stop.
    m.send(&frame('G'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::Stop);
    assert_eq!(m.runner.backlog(), 0);

    m.send(&frame('G'));
    m.ticks(1);
    assert_eq!(m.runner.context().mode(), Mode::JogFollowerUp);
}

#[test]
fn jog_reverses_and_stops() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('I'));
    m.ticks(500);
    let up = m.position(AxisId::ColdDrawRunner);
    assert!(up > 700);

    m.send(&frame('J'));
    m.ticks(500);
    assert!(m.position(AxisId::ColdDrawRunner) < up);

    m.send(&frame('F'));
    m.tick_until(1_000, |m| m.runner.context().axes().is_idle());
    assert_eq!(m.runner.context().axes().speeds(), [0.0; 4]);
}

#[test]
fn spin_turns_mandrels_in_opposite_directions() {
    let mut m = Machine::new(MachineConfig::default());
    m.send(&frame('K'));
    m.ticks(1_000);
    let upper = m.position(AxisId::UpperMandrel);
    let lower = m.position(AxisId::LowerMandrel);
    assert!((1_599..=1_600).contains(&upper), "upper at {upper}");
    assert!((-800..=-799).contains(&lower), "lower at {lower}");
}
