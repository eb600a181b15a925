//! Progressive alert escalation.
//!
//! The slouch budget is mapped onto an ordered milestone table. Crossing a
//! milestone upward activates the alert once; staying inside a band never
//! re-triggers. Reminder milestones repeat a level without raising it.
//!
//! De-escalation, in priority order:
//! 1. Leaving Critical (computed level drops below it) is a recovery: the
//!    budget is halved, a one-shot recovery cue plays, the Critical flag clears.
//! 2. Below Critical, the alert relaxes once `|pitch| < threshold - hysteresis`.
//! 3. At Critical, it relaxes only when posture is no longer bad at all.
//! 4. Budget under the first milestone with good posture clears everything.
//!
//! Otherwise the escalation level is a high-water mark: decaying into a lower
//! band does not lower it.

use std::fmt;

use serde::Serialize;

use crate::budget::SlouchBudget;
use crate::error::BuildError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    None = 0,
    Gentle = 1,
    Warning = 2,
    Urgent = 3,
    Critical = 4,
}

impl AlertLevel {
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Gentle => "gentle",
            AlertLevel::Warning => "warning",
            AlertLevel::Urgent => "urgent",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub at_ms: u64,
    pub level: AlertLevel,
}

const fn ms(at_ms: u64, level: AlertLevel) -> Milestone {
    Milestone { at_ms, level }
}

const PROGRESSIVE: [Milestone; 7] = [
    ms(5_000, AlertLevel::Gentle),
    ms(30_000, AlertLevel::Warning),
    ms(60_000, AlertLevel::Urgent),
    ms(120_000, AlertLevel::Urgent),
    ms(180_000, AlertLevel::Urgent),
    ms(240_000, AlertLevel::Urgent),
    ms(300_000, AlertLevel::Critical),
];

const TESTING: [Milestone; 4] = [
    ms(5_000, AlertLevel::Gentle),
    ms(10_000, AlertLevel::Warning),
    ms(15_000, AlertLevel::Urgent),
    ms(20_000, AlertLevel::Critical),
];

/// Ordered milestone boundaries: strictly increasing `at_ms`, non-decreasing
/// levels, no `None` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneTable {
    entries: Vec<Milestone>,
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self::progressive()
    }
}

impl MilestoneTable {
    /// 5s Gentle, 30s Warning, 60s Urgent, 2/3/4 min Urgent reminders, 5 min Critical.
    pub fn progressive() -> Self {
        Self {
            entries: PROGRESSIVE.to_vec(),
        }
    }

    /// Compressed bench-test schedule. Only used when configured explicitly.
    pub fn testing() -> Self {
        Self {
            entries: TESTING.to_vec(),
        }
    }

    pub fn new(entries: Vec<Milestone>) -> std::result::Result<Self, BuildError> {
        if entries.is_empty() {
            return Err(BuildError::InvalidConfig("milestone table is empty"));
        }
        if entries.iter().any(|m| m.level == AlertLevel::None) {
            return Err(BuildError::InvalidConfig("milestone level cannot be none"));
        }
        if entries.iter().any(|m| m.at_ms == 0) {
            return Err(BuildError::InvalidConfig("milestone at_ms must be > 0"));
        }
        for pair in entries.windows(2) {
            if pair[1].at_ms <= pair[0].at_ms {
                return Err(BuildError::InvalidConfig(
                    "milestones must be strictly increasing",
                ));
            }
            if pair[1].level < pair[0].level {
                return Err(BuildError::InvalidConfig("milestone levels must not decrease"));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Milestone] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Milestone> {
        self.entries.get(index)
    }

    /// Boundary of the first milestone; below it there is no alert at all.
    pub fn first_at_ms(&self) -> u64 {
        self.entries.first().map_or(u64::MAX, |m| m.at_ms)
    }

    pub fn last_at_ms(&self) -> u64 {
        self.entries.last().map_or(0, |m| m.at_ms)
    }

    /// Index of the highest milestone whose boundary `cumulative_ms` has reached.
    pub fn index_for(&self, cumulative_ms: u64) -> Option<usize> {
        self.entries
            .partition_point(|m| m.at_ms <= cumulative_ms)
            .checked_sub(1)
    }

    pub fn level_at(&self, index: Option<usize>) -> AlertLevel {
        index
            .and_then(|i| self.entries.get(i))
            .map_or(AlertLevel::None, |m| m.level)
    }

    /// Step function from budget to severity.
    pub fn level_for(&self, cumulative_ms: u64) -> AlertLevel {
        self.level_at(self.index_for(cumulative_ms))
    }

    /// The milestone the budget would cross next, if any.
    pub fn next_after(&self, cumulative_ms: u64) -> Option<&Milestone> {
        self.entries.iter().find(|m| m.at_ms > cumulative_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertState {
    pub level: AlertLevel,
    /// Highest milestone index reached by the current escalation.
    pub milestone: Option<usize>,
    pub active: bool,
    pub activated_at_ms: u64,
    pub was_critical_recently: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    /// Upward milestone crossing. `reminder` is set when the level did not rise.
    Activated {
        level: AlertLevel,
        milestone: usize,
        reminder: bool,
    },
    /// Actuator released; escalation level kept.
    Deactivated { level: AlertLevel },
    /// Left Critical; budget halved from `from_ms` to `to_ms`.
    Recovered { from_ms: u64, to_ms: u64 },
    /// Escalation fully cleared.
    Reset,
}

impl AlertEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AlertEvent::Activated {
                reminder: false, ..
            } => "activated",
            AlertEvent::Activated { reminder: true, .. } => "reminder",
            AlertEvent::Deactivated { .. } => "deactivated",
            AlertEvent::Recovered { .. } => "recovered",
            AlertEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertEscalation {
    table: MilestoneTable,
    threshold_deg: f32,
    hysteresis_deg: f32,
    state: AlertState,
}

impl AlertEscalation {
    pub fn new(table: MilestoneTable, threshold_deg: f32, hysteresis_deg: f32) -> Self {
        Self {
            table,
            threshold_deg,
            hysteresis_deg,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn table(&self) -> &MilestoneTable {
        &self.table
    }

    pub fn threshold_deg(&self) -> f32 {
        self.threshold_deg
    }

    /// Drop all escalation state (new session).
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }

    /// Evaluate one cycle against the already-updated budget. May halve the
    /// budget (recovery). Returns the transition that happened, if any.
    pub fn evaluate(
        &mut self,
        budget: &mut SlouchBudget,
        abs_pitch_deg: f32,
        in_bad_posture: bool,
        now_ms: u64,
    ) -> Option<AlertEvent> {
        let computed = self.table.index_for(budget.cumulative_ms());
        let computed_level = self.table.level_at(computed);

        if self.state.was_critical_recently && computed_level < AlertLevel::Critical {
            let from_ms = budget.cumulative_ms();
            let to_ms = budget.halve();
            let index = self.table.index_for(to_ms);
            self.state = AlertState {
                level: self.table.level_at(index),
                milestone: index,
                active: false,
                activated_at_ms: self.state.activated_at_ms,
                was_critical_recently: false,
            };
            return Some(AlertEvent::Recovered { from_ms, to_ms });
        }

        if let Some(index) = computed
            && Some(index) > self.state.milestone
        {
            let previous = self.state.level;
            let level = computed_level;
            self.state.level = level;
            self.state.milestone = Some(index);
            self.state.active = true;
            self.state.activated_at_ms = now_ms;
            if level == AlertLevel::Critical {
                self.state.was_critical_recently = true;
            }
            return Some(AlertEvent::Activated {
                level,
                milestone: index,
                reminder: level == previous,
            });
        }

        let mut released = None;
        if self.state.active {
            let relax = if self.state.level == AlertLevel::Critical {
                !in_bad_posture
            } else {
                abs_pitch_deg < self.threshold_deg - self.hysteresis_deg
            };
            if relax {
                self.state.active = false;
                released = Some(AlertEvent::Deactivated {
                    level: self.state.level,
                });
            }
        }

        if !in_bad_posture
            && budget.cumulative_ms() < self.table.first_at_ms()
            && self.state != AlertState::default()
        {
            self.state = AlertState::default();
            return Some(AlertEvent::Reset);
        }

        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esc() -> AlertEscalation {
        AlertEscalation::new(MilestoneTable::progressive(), 15.0, 2.0)
    }

    #[test]
    fn level_for_steps_at_boundaries() {
        let t = MilestoneTable::progressive();
        assert_eq!(t.level_for(0), AlertLevel::None);
        assert_eq!(t.level_for(4_999), AlertLevel::None);
        assert_eq!(t.level_for(5_000), AlertLevel::Gentle);
        assert_eq!(t.level_for(29_999), AlertLevel::Gentle);
        assert_eq!(t.level_for(30_000), AlertLevel::Warning);
        assert_eq!(t.level_for(60_000), AlertLevel::Urgent);
        assert_eq!(t.level_for(150_000), AlertLevel::Urgent);
        assert_eq!(t.level_for(299_999), AlertLevel::Urgent);
        assert_eq!(t.level_for(300_000), AlertLevel::Critical);
        assert_eq!(t.level_for(u64::MAX), AlertLevel::Critical);
    }

    #[test]
    fn next_after_reports_upcoming_boundary() {
        let t = MilestoneTable::progressive();
        assert_eq!(t.next_after(0).map(|m| m.at_ms), Some(5_000));
        assert_eq!(t.next_after(5_000).map(|m| m.at_ms), Some(30_000));
        assert_eq!(t.next_after(300_000), None);
    }

    #[test]
    fn table_rejects_bad_shapes() {
        assert!(MilestoneTable::new(vec![]).is_err());
        assert!(MilestoneTable::new(vec![ms(10, AlertLevel::None)]).is_err());
        assert!(
            MilestoneTable::new(vec![ms(10, AlertLevel::Warning), ms(10, AlertLevel::Critical)])
                .is_err()
        );
        assert!(
            MilestoneTable::new(vec![ms(10, AlertLevel::Warning), ms(20, AlertLevel::Gentle)])
                .is_err()
        );
        assert!(MilestoneTable::new(vec![ms(0, AlertLevel::Gentle)]).is_err());
    }

    #[test]
    fn activation_fires_once_per_crossing() {
        let mut e = esc();
        let mut b = SlouchBudget::new(900_000);
        let mut events = Vec::new();
        for i in 1..=100u64 {
            b.update(true, false, 100);
            if let Some(ev) = e.evaluate(&mut b, 20.0, true, i * 100) {
                events.push(ev);
            }
        }
        assert_eq!(
            events,
            vec![AlertEvent::Activated {
                level: AlertLevel::Gentle,
                milestone: 0,
                reminder: false
            }]
        );
        assert!(e.state().active);
        assert_eq!(e.state().activated_at_ms, 5_000);
    }

    #[test]
    fn reminder_marks_retrigger_without_raising_level() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 119_900);
        e.state = AlertState {
            level: AlertLevel::Urgent,
            milestone: Some(2),
            active: false,
            activated_at_ms: 0,
            was_critical_recently: false,
        };
        b.update(true, false, 100);
        let ev = e.evaluate(&mut b, 20.0, true, 1);
        assert_eq!(
            ev,
            Some(AlertEvent::Activated {
                level: AlertLevel::Urgent,
                milestone: 3,
                reminder: true
            })
        );
        assert_eq!(ev.map(|e| e.name()), Some("reminder"));
        assert!(e.state().active);
    }

    #[test]
    fn hysteresis_releases_below_threshold_minus_band() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 5_000);
        assert!(matches!(
            e.evaluate(&mut b, 20.0, true, 0),
            Some(AlertEvent::Activated { .. })
        ));
        // 14° is good posture but inside the hysteresis band: stays active.
        b.update(false, false, 100);
        b.update(true, false, 100);
        assert_eq!(e.evaluate(&mut b, 14.0, false, 100), None);
        assert!(e.state().active);
        // 12.9° is below 15 - 2.
        assert_eq!(
            e.evaluate(&mut b, 12.9, false, 200),
            Some(AlertEvent::Deactivated {
                level: AlertLevel::Gentle
            })
        );
        assert!(!e.state().active);
        assert_eq!(b.cumulative_ms(), 5_000);
        assert_eq!(e.state().level, AlertLevel::Gentle);
    }

    #[test]
    fn critical_needs_full_correction() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 400_000);
        e.evaluate(&mut b, 20.0, true, 0);
        assert_eq!(e.state().level, AlertLevel::Critical);
        // Small pitch but still flagged bad (e.g. threshold momentarily exceeded
        // by roll-coupled noise): no relief from hysteresis.
        assert_eq!(e.evaluate(&mut b, 10.0, true, 100), None);
        assert!(e.state().active);
        assert_eq!(
            e.evaluate(&mut b, 10.0, false, 200),
            Some(AlertEvent::Deactivated {
                level: AlertLevel::Critical
            })
        );
    }

    #[test]
    fn leaving_critical_halves_budget_once() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 300_000);
        e.evaluate(&mut b, 20.0, true, 0);
        assert!(e.state().was_critical_recently);
        b.update(false, false, 100);
        assert_eq!(b.cumulative_ms(), 299_900);
        let ev = e.evaluate(&mut b, 0.0, false, 100);
        assert_eq!(
            ev,
            Some(AlertEvent::Recovered {
                from_ms: 299_900,
                to_ms: 149_950
            })
        );
        assert_eq!(b.cumulative_ms(), 149_950);
        assert!(!e.state().was_critical_recently);
        assert!(!e.state().active);
        assert_eq!(e.state().level, AlertLevel::Urgent);
        assert_eq!(e.state().milestone, Some(3));
        // Next good cycle: no second recovery.
        b.update(false, false, 100);
        assert_eq!(e.evaluate(&mut b, 0.0, false, 200), None);
    }

    #[test]
    fn decay_below_first_milestone_resets() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 31_000);
        e.evaluate(&mut b, 20.0, true, 0);
        assert_eq!(e.state().level, AlertLevel::Warning);
        b.update(false, false, 27_000);
        // 4 s left: below the first milestone while posture is good.
        assert_eq!(e.evaluate(&mut b, 0.0, false, 1), Some(AlertEvent::Reset));
        assert_eq!(*e.state(), AlertState::default());
        // Budget untouched by the reset itself.
        assert_eq!(b.cumulative_ms(), 4_000);
    }

    #[test]
    fn no_reset_while_still_slouched() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 5_000);
        e.evaluate(&mut b, 20.0, true, 0);
        // Moving while slouched decays under the first milestone.
        b.update(true, true, 2_000);
        assert_eq!(e.evaluate(&mut b, 20.0, true, 1), None);
        assert_eq!(e.state().level, AlertLevel::Gentle);
    }

    #[test]
    fn level_is_a_high_water_mark_between_bands() {
        let mut e = esc();
        let mut b = SlouchBudget::with_cumulative(900_000, 30_000);
        e.evaluate(&mut b, 20.0, true, 0);
        b.update(false, false, 20_000);
        e.evaluate(&mut b, 0.0, false, 1);
        assert_eq!(e.state().level, AlertLevel::Warning);
        // Climbing back over 30 s does not re-trigger Warning.
        b.update(true, false, 20_000);
        assert_eq!(e.evaluate(&mut b, 20.0, true, 2), None);
    }
}
