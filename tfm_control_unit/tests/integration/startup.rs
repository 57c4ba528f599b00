//! Configuration loading and initial machine state.

use super::{Machine, frame};
use tempfile::TempDir;
use tfm_common::config::{ConfigError, MachineConfig, load_config};
use tfm_common::state::{AxisId, Mode};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("machine.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn machine_starts_stopped_with_configured_drives() {
    let dir = TempDir::new().unwrap();
    let mut config = MachineConfig::default();
    config.axes.cold_draw_runner.max_speed = 2000.0;
    config.motion.jog_speed = 800.0;
    let path = write_config(&dir, &toml::to_string(&config).unwrap());

    let loaded = load_config(&path).unwrap();
    let mut m = Machine::new(loaded);
    let ctx = m.runner.context();
    assert_eq!(ctx.mode(), Mode::Stop);
    assert!(ctx.axes().is_idle());
    for axis in AxisId::ALL {
        assert!(ctx.axes().axis(axis).is_enabled(), "{axis} not enabled");
    }
    assert_eq!(ctx.axes().axis(AxisId::ColdDrawRunner).max_speed(), 2000.0);

    m.send(&frame('I'));
    m.ticks(1);
    assert_eq!(m.runner.context().axes().axis(AxisId::ColdDrawRunner).speed(), 800.0);
}

#[test]
fn mechanics_come_from_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
cycle_time_us = 1000

[mechanics]
cold_draw_reduction = 50.0
"#,
    );
    let mut m = Machine::new(load_config(&path).unwrap());
    m.send(&frame('B'));
    m.tick_until(5_000, |m| {
        m.runner.context().mode() == Mode::RunningToPosition && m.runner.context().axes().is_idle()
    });
    assert_eq!(m.position(AxisId::ColdDrawRunner), 3_000);
}

#[test]
fn invalid_cycle_time_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "cycle_time_us = 10\n");
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)), "{err:?}");
}

#[test]
fn unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "cycle_time = 1000\n");
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
