//! Phase sequencing per research mode.

use super::state::{ResearchMode, ResearchPhase};
use crate::error::{ResearchError, Result};

use ResearchPhase::*;

const QUICK: &[ResearchPhase] = &[Scope, Retrieve, Package];
const STANDARD: &[ResearchPhase] = &[Scope, Plan, Retrieve, Triangulate, Synthesize, Package];
const DEEP: &[ResearchPhase] = &[
    Scope,
    Plan,
    Retrieve,
    Triangulate,
    Synthesize,
    Critique,
    Refine,
    Package,
];

/// Outcome of asking the sequencer where a session goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move forward to the next phase in the mode's list.
    Advance(ResearchPhase),
    /// ULTRADEEP only: return from REFINE to RETRIEVE for another cycle.
    LoopBack(ResearchPhase),
}

impl Transition {
    pub fn phase(&self) -> ResearchPhase {
        match self {
            Transition::Advance(p) | Transition::LoopBack(p) => *p,
        }
    }
}

/// Maps a mode to its ordered phases and validates transitions.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSequencer {
    mode: ResearchMode,
    iteration_cap: u32,
}

impl PhaseSequencer {
    /// `iteration_cap` bounds ULTRADEEP loop-backs; other modes ignore it.
    pub fn new(mode: ResearchMode, iteration_cap: u32) -> Self {
        Self {
            mode,
            iteration_cap,
        }
    }

    pub fn mode(&self) -> ResearchMode {
        self.mode
    }

    pub fn iteration_cap(&self) -> u32 {
        self.iteration_cap
    }

    /// The ordered phase list for a mode.
    pub fn phases_for(mode: ResearchMode) -> &'static [ResearchPhase] {
        match mode {
            ResearchMode::Quick => QUICK,
            ResearchMode::Standard => STANDARD,
            ResearchMode::Deep | ResearchMode::UltraDeep => DEEP,
        }
    }

    pub fn phases(&self) -> &'static [ResearchPhase] {
        Self::phases_for(self.mode)
    }

    pub fn contains(&self, phase: ResearchPhase) -> bool {
        self.phases().contains(&phase)
    }

    /// Index of `phase` in this mode's list.
    pub fn position(&self, phase: ResearchPhase) -> Result<usize> {
        self.phases()
            .iter()
            .position(|p| *p == phase)
            .ok_or_else(|| self.not_in_mode(phase))
    }

    /// Fails with `PhaseNotInMode` if the phase does not belong to this mode.
    pub fn ensure_contains(&self, phase: ResearchPhase) -> Result<()> {
        self.position(phase).map(|_| ())
    }

    pub fn is_terminal(&self, phase: ResearchPhase) -> bool {
        phase == Package
    }

    /// Decide the phase after `current`.
    ///
    /// `refine_cycles` is the number of loop-backs already taken in this
    /// session. PACKAGE has no successor.
    pub fn next_phase(&self, current: ResearchPhase, refine_cycles: u32) -> Result<Transition> {
        let index = self.position(current)?;

        if self.is_terminal(current) {
            return Err(ResearchError::InvalidTransition {
                from: current.to_string(),
            });
        }

        if current == Refine && self.can_loop_back(refine_cycles) {
            return Ok(Transition::LoopBack(Retrieve));
        }

        let next = self.phases()[index + 1];
        Ok(Transition::Advance(next))
    }

    /// Whether an ULTRADEEP session at REFINE may run another cycle.
    pub fn can_loop_back(&self, refine_cycles: u32) -> bool {
        self.mode == ResearchMode::UltraDeep && refine_cycles < self.iteration_cap
    }

    fn not_in_mode(&self, phase: ResearchPhase) -> ResearchError {
        ResearchError::PhaseNotInMode {
            phase: phase.to_string(),
            mode: self.mode.to_string(),
        }
    }
}
