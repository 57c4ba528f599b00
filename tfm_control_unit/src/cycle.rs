//! Deterministic control cycle.
//!
//! One tick:
//! 1. Ingest: move buffered bytes into the frame assembler, accept at most
//!    one terminated frame (parameters replaced, geometry derived once).
//! 2. Dispatch the active mode.
//! 3. Safety check; may override whatever dispatch commanded.
//! 4. Give every axis not advanced this tick one step increment.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to the configured core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`.
//!
//! Without the `rt` feature every step is a no-op and pacing uses
//! `std::thread::sleep`; see [`crate::pacing`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tfm_common::config::{ConfigError, MachineConfig};
use tfm_common::consts::AXIS_COUNT;
use tfm_common::hal::{AxisBank, LimitInputs};
use tfm_common::process::{DerivedGeometry, MachineParameters};
use tfm_common::state::Mode;
use tracing::{debug, info, warn};

use crate::axes::MachineAxes;
use crate::command::{Command, CommandParser};
use crate::kinematics::derive_geometry;
use crate::pacing::{Pacing, TickPacer};
use crate::safety::{SafetyMonitor, SafetyVerdict};
use crate::state::{ModeController, MotionInputs, TransitionCause};
use crate::transport::{FrameAssembler, PushOutcome};

/// Log every n-th overrun after the first.
const OVERRUN_LOG_EVERY: u64 = 1000;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles that took longer than the tick period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors & RT Setup ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tick clock failed: {0}")]
    Clock(#[from] nix::Error),
}

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop does not fault pages in later.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into a local array.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Run the RT setup sequence. Call once, before [`CycleRunner::run`].
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Control Context ────────────────────────────────────────────────

/// Status snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub cycle: u64,
    pub mode: Mode,
    /// Accepted commands so far.
    pub epoch: u64,
    pub positions: [i64; AXIS_COUNT],
    pub speeds: [f64; AXIS_COUNT],
    pub geometry: DerivedGeometry,
}

/// Everything one tick reads or mutates. Owned by the control thread.
pub struct ControlContext {
    config: MachineConfig,
    modes: ModeController,
    params: MachineParameters,
    geometry: DerivedGeometry,
    command_epoch: u64,
    cycle: u64,
    axes: MachineAxes,
    limits: Box<dyn LimitInputs>,
    safety: SafetyMonitor,
}

impl ControlContext {
    /// Validate `config`, then configure and enable the drives.
    ///
    /// The machine starts in `Stop` with all-zero parameters.
    pub fn new(
        config: MachineConfig,
        bank: AxisBank,
        limits: Box<dyn LimitInputs>,
    ) -> Result<Self, CycleError> {
        config.validate()?;
        let axes = MachineAxes::new(bank, &config);
        let params = MachineParameters::default();
        let geometry = derive_geometry(&params, &config.mechanics);
        Ok(Self {
            config,
            modes: ModeController::new(),
            params,
            geometry,
            command_epoch: 0,
            cycle: 0,
            axes,
            limits,
            safety: SafetyMonitor::new(),
        })
    }

    /// Builder form of [`ControlContext::set_pacing`].
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.set_pacing(pacing);
        self
    }

    /// Pace blocking moves in wall time or in simulated time.
    pub fn set_pacing(&mut self, pacing: Pacing) {
        self.axes.set_pacing(pacing);
    }

    #[inline]
    pub fn pacing(&self) -> Pacing {
        self.axes.pacing()
    }

    /// Apply an accepted command: new parameters, new geometry, new mode.
    pub fn accept(&mut self, cmd: Command) {
        self.params = cmd.params;
        self.geometry = derive_geometry(&self.params, &self.config.mechanics);
        self.command_epoch += 1;
        debug!(
            epoch = self.command_epoch,
            "command {:?}: {:?} -> {:?}", cmd.mode, self.params, self.geometry
        );
        if !self.geometry.is_finite() {
            debug!("derived geometry is not finite");
        }
        self.modes.enter(cmd.mode, TransitionCause::Command, &mut self.axes);
    }

    /// Dispatch, safety check, stepping.
    pub fn tick(&mut self) -> SafetyVerdict {
        self.axes.begin_tick();
        let inputs = MotionInputs {
            params: &self.params,
            geometry: &self.geometry,
            config: &self.config,
        };
        self.modes.dispatch(&inputs, &mut self.axes, self.limits.as_mut());
        let verdict = self.safety.check(
            &mut self.modes,
            &mut self.axes,
            self.limits.as_mut(),
            &self.config.mechanics,
        );
        self.axes.step_remaining();
        self.cycle += 1;
        verdict
    }

    /// Force `Stop` outside the command path.
    pub fn stop(&mut self, cause: TransitionCause) {
        self.modes.enter(Mode::Stop, cause, &mut self.axes);
        self.axes.stop_all();
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[inline]
    pub fn params(&self) -> &MachineParameters {
        &self.params
    }

    #[inline]
    pub fn geometry(&self) -> &DerivedGeometry {
        &self.geometry
    }

    #[inline]
    pub fn command_epoch(&self) -> u64 {
        self.command_epoch
    }

    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[inline]
    pub fn axes(&self) -> &MachineAxes {
        &self.axes
    }

    #[inline]
    pub fn modes(&self) -> &ModeController {
        &self.modes
    }

    #[inline]
    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            cycle: self.cycle,
            mode: self.modes.mode(),
            epoch: self.command_epoch,
            positions: self.axes.positions(),
            speeds: self.axes.speeds(),
            geometry: self.geometry,
        }
    }
}

impl std::fmt::Debug for ControlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlContext")
            .field("mode", &self.modes.mode())
            .field("epoch", &self.command_epoch)
            .field("cycle", &self.cycle)
            .field("axes", &self.axes)
            .finish_non_exhaustive()
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the context plus the ingest path and paces ticks.
#[derive(Debug)]
pub struct CycleRunner {
    ctx: ControlContext,
    assembler: FrameAssembler,
    parser: CommandParser,
    /// Bytes received but not yet moved into the assembler.
    pending: VecDeque<u8>,
    stats: CycleStats,
    cycle_time: Duration,
    diagnostic_interval: u64,
}

impl CycleRunner {
    pub fn new(ctx: ControlContext) -> Self {
        let config = ctx.config();
        let parser = CommandParser::new(config.frame_policy);
        let cycle_time = config.cycle_time();
        let diagnostic_interval = u64::from(config.diagnostic_interval);
        Self {
            ctx,
            assembler: FrameAssembler::new(),
            parser,
            pending: VecDeque::with_capacity(1024),
            stats: CycleStats::new(),
            cycle_time,
            diagnostic_interval,
        }
    }

    /// Queue received bytes for ingestion.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// One full tick: ingest at most one command, then dispatch, safety
    /// check and stepping.
    pub fn cycle(&mut self) -> SafetyVerdict {
        while let Some(byte) = self.pending.pop_front() {
            if self.assembler.push(byte) == PushOutcome::Terminated {
                break;
            }
        }
        if let Some(frame) = self.parser.parse(self.assembler.as_str()) {
            self.assembler.consume(frame.consumed);
            if let Ok(cmd) = frame.result {
                self.ctx.accept(cmd);
            }
        }

        let verdict = self.ctx.tick();

        if self.diagnostic_interval > 0 && self.ctx.cycle() % self.diagnostic_interval == 0 {
            debug!(
                avg_cycle_ns = self.stats.avg_cycle_ns(),
                max_cycle_ns = self.stats.max_cycle_ns,
                overruns = self.stats.overruns,
                "{:?}",
                self.ctx.snapshot()
            );
        }
        verdict
    }

    /// Tick until `running` clears, then bring the machine to rest.
    ///
    /// Ticks, blocking moves and the shutdown drain are all paced in wall
    /// time.
    pub fn run(&mut self, running: &AtomicBool, input: &Receiver<Vec<u8>>) -> Result<(), CycleError> {
        info!(
            "entering control loop (cycle_time={}µs, policy={:?})",
            self.cycle_time.as_micros(),
            self.parser.policy()
        );
        self.ctx.set_pacing(Pacing::WallClock);

        let mut pacer = TickPacer::new(self.cycle_time, Pacing::WallClock);
        let mut input_open = true;
        while running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            input_open = self.drain_input(input, input_open);
            self.cycle();

            let duration_ns = cycle_start.elapsed().as_nanos() as i64;
            let latency_ns = pacer.wait()?;
            self.record(duration_ns, latency_ns);
        }

        self.shutdown();
        Ok(())
    }

    /// Move everything received so far into the pending queue.
    fn drain_input(&mut self, input: &Receiver<Vec<u8>>, open: bool) -> bool {
        if !open {
            return false;
        }
        loop {
            match input.try_recv() {
                Ok(bytes) => self.feed(&bytes),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    info!("command input closed; holding current mode until shutdown");
                    return false;
                }
            }
        }
    }

    fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > self.cycle_time.as_nanos() as i64 {
            self.stats.overruns += 1;
            let n = self.stats.overruns;
            if n == 1 || n % OVERRUN_LOG_EVERY == 0 {
                warn!(
                    "cycle overrun: {duration_ns}ns > {}ns budget ({n} total)",
                    self.cycle_time.as_nanos()
                );
            }
        }
    }

    /// Enter Stop and tick until every axis is at rest, bounded by
    /// `max_blocking_ticks`. Ticks are paced like blocking moves.
    pub fn shutdown(&mut self) {
        self.ctx.stop(TransitionCause::Shutdown);
        let limit = self.ctx.config().max_blocking_ticks;
        let mut pacer = TickPacer::new(self.cycle_time, self.ctx.pacing());
        let mut ticks = 0;
        while !self.ctx.axes().is_idle() && ticks < limit {
            self.ctx.tick();
            ticks += 1;
            if let Err(e) = pacer.wait() {
                warn!("shutdown pacing failed: {e}; stopping drain");
                break;
            }
        }
        if self.ctx.axes().is_idle() {
            info!("axes at rest after {ticks} shutdown ticks");
        } else {
            warn!("axes still moving after {limit} shutdown ticks");
        }
        info!(
            cycles = self.stats.cycle_count,
            avg_cycle_ns = self.stats.avg_cycle_ns(),
            max_cycle_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            "control loop stopped"
        );
    }

    #[inline]
    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Bytes received but not yet parsed.
    pub fn backlog(&self) -> usize {
        self.pending.len() + self.assembler.len()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
