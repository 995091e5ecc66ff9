//! Observation model
//!
//! Every state belongs to one of three observation classes. The first
//! `1/observation_lambda` of each beat (always including phase 0) is the beat
//! region; in downbeat mode the beat region of beat 0 is the downbeat region.
//! All other states are "no beat".
//!
//! Per frame only three log-densities are computed:
//!
//! | class    | beat-only activation `a` | downbeat activations `(b, d)` |
//! |----------|--------------------------|-------------------------------|
//! | NoBeat   | `ln((1 - a) / (λ - 1))`  | `ln((1 - b - d) / (λ - 1))`   |
//! | Beat     | `ln(a)`                  | `ln(b)`                       |
//! | Downbeat | -                        | `ln(d)`                       |
//!
//! Activations are clamped to `[EPSILON, 1 - EPSILON]` first, so zero or
//! out-of-range values only skew the likelihoods.

use super::state_space::StateSpace;
use crate::config::Mode;
use crate::io::activations::{ActivationSequence, Frames};

/// Clamp bound keeping every log-density finite
pub const EPSILON: f64 = 1e-7;

/// Observation class of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObservationClass {
    /// Outside the beat region
    NoBeat = 0,
    /// Beat region of a non-first beat (or any beat in beat-only mode)
    Beat = 1,
    /// Beat region of the first beat of a bar
    Downbeat = 2,
}

/// Maps states to observation classes and frames to log-densities
#[derive(Debug, Clone)]
pub struct ObservationModel {
    mode: Mode,
    observation_lambda: f32,
    classes: Vec<ObservationClass>,
}

fn clamp_activation(x: f32) -> f64 {
    let x = if x.is_nan() { 0.0 } else { x as f64 };
    x.clamp(EPSILON, 1.0 - EPSILON)
}

impl ObservationModel {
    /// Assign an observation class to every state
    pub fn build(space: &StateSpace, observation_lambda: f32) -> Self {
        let mode = space.mode();
        let lambda = observation_lambda as f64;

        let classes = (0..space.num_states())
            .map(|index| {
                let state = space.state(index);
                let in_beat_region = (state.phase as f64) * lambda < state.interval as f64;
                match (in_beat_region, mode, state.beat) {
                    (false, _, _) => ObservationClass::NoBeat,
                    (true, Mode::Downbeats, 0) => ObservationClass::Downbeat,
                    (true, _, _) => ObservationClass::Beat,
                }
            })
            .collect();

        Self {
            mode,
            observation_lambda,
            classes,
        }
    }

    /// Detection mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Observation class of a state
    pub fn class(&self, state: usize) -> ObservationClass {
        self.classes[state]
    }

    /// Log-densities of one frame, indexed by `ObservationClass as usize`
    ///
    /// The caller guarantees the channel count matches the mode.
    pub fn log_densities(&self, activations: &ActivationSequence, frame: usize) -> [f64; 3] {
        let no_beat_share = (self.observation_lambda as f64 - 1.0).ln();
        match activations.frames() {
            Frames::Beat(values) => {
                let a = clamp_activation(values[frame]);
                let beat = a.ln();
                [(1.0 - a).ln() - no_beat_share, beat, beat]
            }
            Frames::BeatDownbeat(values) => {
                let b = clamp_activation(values[frame][0]);
                let d = clamp_activation(values[frame][1]);
                let rest = (1.0 - b - d).max(EPSILON);
                [rest.ln() - no_beat_share, b.ln(), d.ln()]
            }
        }
    }

    /// Fill `scores` with the log-likelihood of `frame` for every state
    pub fn frame_log_likelihoods(
        &self,
        activations: &ActivationSequence,
        frame: usize,
        scores: &mut [f64],
    ) {
        let densities = self.log_densities(activations, frame);
        for (score, &class) in scores.iter_mut().zip(&self.classes) {
            *score = densities[class as usize];
        }
    }

    /// Log-likelihood of a single state at a frame
    pub fn log_likelihood(&self, activations: &ActivationSequence, frame: usize, state: usize) -> f64 {
        self.log_densities(activations, frame)[self.classes[state] as usize]
    }
}
