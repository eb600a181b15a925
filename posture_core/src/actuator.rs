//! Alert actuator seam.
//!
//! The monitor decides *what* cue plays and for how long it has been
//! playing; an `AlertActuator` turns that into device output.

use posture_traits::Buzzer;

use crate::pattern::{Cue, Pattern, PhaseAt};

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

pub trait AlertActuator {
    /// Called every cycle while `cue` is playing. `elapsed_ms` counts from
    /// the moment the cue started.
    fn render(&mut self, cue: Cue, elapsed_ms: u64) -> Result<(), BoxErr>;
    /// Stop all output.
    fn off(&mut self) -> Result<(), BoxErr>;
}

impl<T: AlertActuator + ?Sized> AlertActuator for Box<T> {
    fn render(&mut self, cue: Cue, elapsed_ms: u64) -> Result<(), BoxErr> {
        (**self).render(cue, elapsed_ms)
    }
    fn off(&mut self) -> Result<(), BoxErr> {
        (**self).off()
    }
}

/// Renders phase-table patterns onto a tone buzzer. Device calls happen
/// only when the output changes.
pub struct BuzzerActuator<B: Buzzer> {
    buzzer: B,
    current: Option<(Cue, Pattern)>,
    sounding: Option<u32>,
}

impl<B: Buzzer> BuzzerActuator<B> {
    pub fn new(buzzer: B) -> Self {
        Self {
            buzzer,
            current: None,
            sounding: None,
        }
    }

    pub fn into_inner(self) -> B {
        self.buzzer
    }

    /// Frequency currently driven, if any.
    pub fn sounding(&self) -> Option<u32> {
        self.sounding
    }

    fn pattern_for(&mut self, cue: Cue) -> Option<Pattern> {
        match self.current {
            Some((c, p)) if c == cue => Some(p),
            _ => {
                let p = Pattern::for_cue(cue)?;
                tracing::debug!(?cue, period_ms = p.period_ms(), "pattern selected");
                self.current = Some((cue, p));
                Some(p)
            }
        }
    }

    fn drive(&mut self, want: Option<u32>) -> Result<(), BoxErr> {
        if want == self.sounding {
            return Ok(());
        }
        match want {
            Some(hz) => self.buzzer.tone(hz)?,
            None => self.buzzer.silence()?,
        }
        self.sounding = want;
        Ok(())
    }
}

impl<B: Buzzer> AlertActuator for BuzzerActuator<B> {
    fn render(&mut self, cue: Cue, elapsed_ms: u64) -> Result<(), BoxErr> {
        let want = match self.pattern_for(cue).map(|p| p.phase_at(elapsed_ms)) {
            Some(PhaseAt::Tone(hz)) => Some(hz),
            _ => None,
        };
        self.drive(want)
    }

    fn off(&mut self) -> Result<(), BoxErr> {
        self.current = None;
        if self.sounding.take().is_some() {
            self.buzzer.silence()?;
        }
        Ok(())
    }
}
