//! Tracking model
//!
//! A [`Model`] bundles the state space, transition model and observation model
//! built from one [`TrackerConfig`]. It is immutable after construction and
//! can be shared between threads to decode independent activation sequences.

use super::observation::ObservationModel;
use super::state_space::StateSpace;
use super::transition::{Edges, TransitionModel};
use crate::config::TrackerConfig;
use crate::error::DecodeError;
use crate::features::decoder::viterbi::{Emission, StateGraph};
use crate::io::activations::ActivationSequence;

/// Frame rates closer than this are considered equal
const FPS_TOLERANCE: f32 = 1e-3;

/// Immutable beat/downbeat tracking model
#[derive(Debug, Clone)]
pub struct Model {
    config: TrackerConfig,
    space: StateSpace,
    transitions: TransitionModel,
    observations: ObservationModel,
}

impl Model {
    /// Build the model described by a configuration
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` if the configuration is
    /// invalid or produces a state without outgoing transitions.
    pub fn build(config: &TrackerConfig) -> Result<Self, DecodeError> {
        let space = StateSpace::build(config)?;
        let transitions = TransitionModel::build(&space, config.transition_lambda);
        let observations = ObservationModel::build(&space, config.observation_lambda);

        if let Some(dead) = transitions
            .outgoing_log_mass()
            .iter()
            .position(|mass| !mass.is_finite())
        {
            return Err(DecodeError::InvalidConfiguration(format!(
                "state {:?} has no outgoing transition",
                space.state(dead)
            )));
        }

        log::debug!(
            "Built model: {} states, {} transitions ({:.1} per state)",
            space.num_states(),
            transitions.num_edges(),
            transitions.num_edges() as f32 / space.num_states() as f32
        );

        Ok(Self {
            config: config.clone(),
            space,
            transitions,
            observations,
        })
    }

    /// Configuration this model was built from
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// State space
    pub fn state_space(&self) -> &StateSpace {
        &self.space
    }

    /// Transition model
    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    /// Observation model
    pub fn observations(&self) -> &ObservationModel {
        &self.observations
    }

    /// Frame rate the model was built for
    pub fn fps(&self) -> f32 {
        self.config.fps
    }

    /// Bytes of backtracking storage a decode of `num_frames` frames allocates
    ///
    /// One byte per frame and state. The default downbeat model has about
    /// 26,000 states, so five minutes at 100 fps take roughly 780 MB; narrow
    /// the BPM range, lower `num_tempi` or decode fewer signatures to shrink it.
    pub fn backpointer_bytes(&self, num_frames: usize) -> usize {
        num_frames.saturating_mul(self.space.num_states())
    }

    /// Check that an activation sequence fits this model
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::EmptyActivationSequence` for zero frames and
    /// `DecodeError::InvalidInput` for a channel count or frame rate mismatch.
    pub fn check_activations(&self, activations: &ActivationSequence) -> Result<(), DecodeError> {
        if activations.is_empty() {
            return Err(DecodeError::EmptyActivationSequence);
        }

        let expected = self.config.mode.channels();
        if activations.channels() != expected {
            return Err(DecodeError::InvalidInput(format!(
                "{} mode expects {} activation channel(s), got {}",
                self.config.mode.name(),
                expected,
                activations.channels()
            )));
        }

        if (activations.fps() - self.config.fps).abs() > FPS_TOLERANCE {
            return Err(DecodeError::InvalidInput(format!(
                "activations sampled at {} fps, model built for {} fps",
                activations.fps(),
                self.config.fps
            )));
        }

        let out_of_range = activations.out_of_range_count();
        if out_of_range > 0 {
            log::warn!(
                "{} activation values outside [0, 1]; clamping before decoding",
                out_of_range
            );
        }

        Ok(())
    }

    /// Frame scorer for an activation sequence
    pub fn emission<'a>(&'a self, activations: &'a ActivationSequence) -> ModelEmission<'a> {
        ModelEmission {
            observations: &self.observations,
            activations,
        }
    }
}

impl StateGraph for Model {
    fn num_states(&self) -> usize {
        self.space.num_states()
    }

    fn edges_into(&self, state: usize) -> Edges<'_> {
        self.transitions.edges_into(state)
    }

    fn is_beat(&self, state: usize) -> bool {
        self.space.is_beat(state)
    }

    fn is_downbeat(&self, state: usize) -> bool {
        self.space.is_downbeat(state)
    }
}

/// Observation model applied to one activation sequence
#[derive(Debug, Clone, Copy)]
pub struct ModelEmission<'a> {
    observations: &'a ObservationModel,
    activations: &'a ActivationSequence,
}

impl Emission for ModelEmission<'_> {
    fn num_frames(&self) -> usize {
        self.activations.len()
    }

    fn frame_log_likelihoods(&self, frame: usize, scores: &mut [f64]) {
        self.observations
            .frame_log_likelihoods(self.activations, frame, scores);
    }
}
