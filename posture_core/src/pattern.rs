//! Actuator patterns as explicit phase tables.
//!
//! A cue resolves once to a static table of (tone, duration) phases. The
//! phase to render is a pure function of the time since the cue started,
//! so pattern timing is testable without a device.

use crate::alert::AlertLevel;

/// What the actuator should be playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Alert(AlertLevel),
    /// One-shot positive feedback after leaving Critical.
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    /// `None` is silence.
    pub tone_hz: Option<u32>,
    pub duration_ms: u64,
}

const fn on(hz: u32, duration_ms: u64) -> Phase {
    Phase {
        tone_hz: Some(hz),
        duration_ms,
    }
}

const fn off(duration_ms: u64) -> Phase {
    Phase {
        tone_hz: None,
        duration_ms,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAt {
    Tone(u32),
    Silent,
    /// A one-shot pattern has played out.
    Finished,
}

const GENTLE: [Phase; 2] = [on(2_000, 200), off(2_800)];
const WARNING: [Phase; 4] = [on(2_500, 150), off(150), on(2_500, 150), off(2_550)];
const URGENT: [Phase; 6] = [
    on(2_800, 200),
    off(100),
    on(2_800, 200),
    off(100),
    on(2_800, 200),
    off(1_000),
];
const CRITICAL: [Phase; 2] = [on(3_200, 400), off(100)];
// C6, E6, G6.
const RECOVERY: [Phase; 3] = [on(1_047, 150), on(1_319, 150), on(1_568, 300)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub phases: &'static [Phase],
    pub looping: bool,
}

impl Pattern {
    /// `None` for `Cue::Alert(AlertLevel::None)`: nothing to play.
    pub fn for_cue(cue: Cue) -> Option<Self> {
        let (phases, looping): (&'static [Phase], bool) = match cue {
            Cue::Alert(AlertLevel::None) => return None,
            Cue::Alert(AlertLevel::Gentle) => (&GENTLE, true),
            Cue::Alert(AlertLevel::Warning) => (&WARNING, true),
            Cue::Alert(AlertLevel::Urgent) => (&URGENT, true),
            Cue::Alert(AlertLevel::Critical) => (&CRITICAL, true),
            Cue::Recovery => (&RECOVERY, false),
        };
        Some(Self { phases, looping })
    }

    pub fn period_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms).sum()
    }

    /// Number of tone phases per period.
    pub fn pulses(&self) -> usize {
        self.phases.iter().filter(|p| p.tone_hz.is_some()).count()
    }

    pub fn phase_at(&self, elapsed_ms: u64) -> PhaseAt {
        let period = self.period_ms();
        if period == 0 {
            return PhaseAt::Finished;
        }
        let mut t = if self.looping {
            elapsed_ms % period
        } else if elapsed_ms >= period {
            return PhaseAt::Finished;
        } else {
            elapsed_ms
        };
        for phase in self.phases {
            if t < phase.duration_ms {
                return phase.tone_hz.map_or(PhaseAt::Silent, PhaseAt::Tone);
            }
            t -= phase.duration_ms;
        }
        PhaseAt::Finished
    }
}
