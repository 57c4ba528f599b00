//! Synchronized multi-axis move.
//!
//! A `SyncGroup` moves a set of axes to individual targets so that every
//! member arrives on the same tick. The move is planned on the first `run`
//! after the targets change:
//!
//! ```text
//! ticks = max_i ceil(|target_i - start_i| / (max_speed_i · dt))
//! pos_i(k) = start_i + (target_i - start_i) · k / ticks     (k = 1..=ticks)
//! ```
//!
//! The slowest member sets the duration, every other member is slowed down
//! proportionally. Intermediate positions are truncated toward the start, so
//! no member reaches its target before tick `ticks`.

use std::time::Duration;

use heapless::Vec;
use tfm_common::consts::AXIS_COUNT;
use tfm_common::hal::AxisBank;
use tfm_common::state::AxisId;
use tracing::{debug, trace};

/// Progress reported by [`SyncGroup::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupProgress {
    /// No targets set.
    Idle,
    /// Members advanced this tick and have not all arrived.
    Moving,
    /// Every member is at its target.
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Member {
    axis: AxisId,
    target: i64,
    start: i64,
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    ticks: u64,
    tick: u64,
}

/// Synchronized group of up to [`AXIS_COUNT`] axes.
#[derive(Debug, Default)]
pub struct SyncGroup {
    members: Vec<Member, AXIS_COUNT>,
    plan: Option<Plan>,
}

impl SyncGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set absolute targets for the group.
    ///
    /// Issuing the same set of targets again leaves the running move
    /// untouched. Duplicate axes keep the last target.
    pub fn move_to(&mut self, targets: &[(AxisId, i64)]) {
        if self.same_targets(targets) {
            return;
        }
        self.members.clear();
        self.plan = None;
        for &(axis, target) in targets {
            if let Some(existing) = self.members.iter_mut().find(|m| m.axis == axis) {
                existing.target = target;
                continue;
            }
            // Capacity equals the number of distinct axes.
            let _ = self.members.push(Member {
                axis,
                target,
                start: 0,
            });
        }
        debug!("sync group targets: {:?}", self.targets().collect::<std::vec::Vec<_>>());
    }

    fn same_targets(&self, targets: &[(AxisId, i64)]) -> bool {
        !self.members.is_empty()
            && self.members.len() == targets.len()
            && targets
                .iter()
                .all(|&(axis, target)| self.members.iter().any(|m| m.axis == axis && m.target == target))
    }

    /// Drop the targets. Members keep whatever speed they reported last;
    /// the caller commands them next.
    pub fn cancel(&mut self) {
        if !self.members.is_empty() {
            trace!("sync group cancelled");
        }
        self.members.clear();
        self.plan = None;
    }

    /// Member axes of the current move.
    pub fn members(&self) -> impl Iterator<Item = AxisId> + '_ {
        self.members.iter().map(|m| m.axis)
    }

    /// `(axis, target)` pairs of the current move.
    pub fn targets(&self) -> impl Iterator<Item = (AxisId, i64)> + '_ {
        self.members.iter().map(|m| (m.axis, m.target))
    }

    pub fn is_active(&self) -> bool {
        !self.members.is_empty()
    }

    fn plan(&mut self, axes: &AxisBank, dt: f64) -> Plan {
        let mut ticks: u64 = 0;
        for m in self.members.iter_mut() {
            let axis = &axes[m.axis.index()];
            m.start = axis.position();
            let distance = m.target.abs_diff(m.start) as f64;
            if distance == 0.0 {
                continue;
            }
            let per_tick = (axis.max_speed() * dt).max(f64::MIN_POSITIVE);
            ticks = ticks.max((distance / per_tick).ceil() as u64);
        }
        debug!("sync group planned over {ticks} ticks");
        Plan { ticks, tick: 0 }
    }

    /// Advance every member by one tick.
    pub fn run(&mut self, axes: &mut AxisBank, dt: Duration) -> GroupProgress {
        if self.members.is_empty() {
            return GroupProgress::Idle;
        }
        let dt_s = dt.as_secs_f64();
        let mut plan = match self.plan {
            Some(plan) => plan,
            None => self.plan(axes, dt_s),
        };
        if plan.tick >= plan.ticks {
            self.plan = Some(plan);
            return GroupProgress::Arrived;
        }

        plan.tick += 1;
        let last = plan.tick == plan.ticks;
        for m in self.members.iter() {
            let axis = &mut axes[m.axis.index()];
            let distance = (m.target - m.start) as i128;
            let offset = distance * plan.tick as i128 / plan.ticks as i128;
            let position = m.start + offset as i64;
            let speed = if last {
                0.0
            } else {
                (position - axis.position()) as f64 / dt_s
            };
            axis.step_to(position, speed);
        }
        self.plan = Some(plan);

        if last {
            debug!("sync group arrived after {} ticks", plan.ticks);
            GroupProgress::Arrived
        } else {
            GroupProgress::Moving
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stepper::SimStepper;
    use tfm_common::hal::AxisDrive;

    const DT: Duration = Duration::from_millis(1);

    fn bank(max_speeds: [f64; AXIS_COUNT]) -> AxisBank {
        AxisId::ALL.map(|axis| {
            let mut s = SimStepper::new(axis.name(), max_speeds[axis.index()], 8000.0);
            s.set_enabled(true);
            Box::new(s) as Box<dyn AxisDrive>
        })
    }

    #[test]
    fn idle_without_targets() {
        let mut axes = bank([4000.0; AXIS_COUNT]);
        let mut group = SyncGroup::new();
        assert_eq!(group.run(&mut axes, DT), GroupProgress::Idle);
    }

    #[test]
    fn members_arrive_on_same_tick() {
        let mut axes = bank([4000.0, 2000.0, 4000.0, 1000.0]);
        let mut group = SyncGroup::new();
        let targets = [
            (AxisId::Follower, -2400),
            (AxisId::UpperMandrel, 1333),
            (AxisId::LowerMandrel, -77),
            (AxisId::ColdDrawRunner, 500),
        ];
        group.move_to(&targets);

        let mut ticks = 0;
        loop {
            let progress = group.run(&mut axes, DT);
            ticks += 1;
            let at_target = targets
                .iter()
                .filter(|(axis, target)| axes[axis.index()].position() == *target)
                .count();
            if progress == GroupProgress::Arrived {
                assert_eq!(at_target, targets.len());
                break;
            }
            assert_eq!(at_target, 0, "member arrived early at tick {ticks}");
            assert!(ticks < 10_000);
        }
        // Upper mandrel is slowest: 1333 steps at 2 steps/tick.
        assert_eq!(ticks, 667);
        for axis in AxisId::ALL {
            assert_eq!(axes[axis.index()].speed(), 0.0);
        }
    }

    #[test]
    fn members_never_exceed_max_speed() {
        let mut axes = bank([4000.0, 2000.0, 4000.0, 4000.0]);
        let mut group = SyncGroup::new();
        group.move_to(&[(AxisId::Follower, 3000), (AxisId::UpperMandrel, 3000)]);
        while group.run(&mut axes, DT) == GroupProgress::Moving {
            assert!(axes[AxisId::Follower.index()].speed().abs() <= 2000.0 + 1e-9);
            assert!(axes[AxisId::UpperMandrel.index()].speed().abs() <= 2000.0 + 1e-9);
        }
    }

    #[test]
    fn reissuing_same_targets_is_idempotent() {
        let mut axes = bank([4000.0; AXIS_COUNT]);
        let mut group = SyncGroup::new();
        let targets = [(AxisId::Follower, 40), (AxisId::LowerMandrel, -20)];
        let mut ticks = 0;
        loop {
            group.move_to(&targets);
            ticks += 1;
            if group.run(&mut axes, DT) == GroupProgress::Arrived {
                break;
            }
        }
        assert_eq!(ticks, 10);
        group.move_to(&targets);
        assert_eq!(group.run(&mut axes, DT), GroupProgress::Arrived);
        assert_eq!(axes[AxisId::Follower.index()].position(), 40);
    }

    #[test]
    fn new_targets_replan_from_current_position() {
        let mut axes = bank([4000.0; AXIS_COUNT]);
        let mut group = SyncGroup::new();
        group.move_to(&[(AxisId::Follower, 400)]);
        for _ in 0..5 {
            group.run(&mut axes, DT);
        }
        assert_eq!(axes[AxisId::Follower.index()].position(), 20);

        group.move_to(&[(AxisId::Follower, 0)]);
        while group.run(&mut axes, DT) == GroupProgress::Moving {}
        assert_eq!(axes[AxisId::Follower.index()].position(), 0);
    }

    #[test]
    fn zero_distance_group_arrives_immediately() {
        let mut axes = bank([4000.0; AXIS_COUNT]);
        let mut group = SyncGroup::new();
        group.move_to(&[(AxisId::Follower, 0), (AxisId::UpperMandrel, 0)]);
        assert_eq!(group.run(&mut axes, DT), GroupProgress::Arrived);
    }

    #[test]
    fn cancel_clears_members() {
        let mut group = SyncGroup::new();
        group.move_to(&[(AxisId::Follower, 10)]);
        assert!(group.is_active());
        assert_eq!(group.members().collect::<std::vec::Vec<_>>(), [AxisId::Follower]);
        group.cancel();
        assert!(!group.is_active());
    }
}
