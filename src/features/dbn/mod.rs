//! Dynamic Bayesian network for beat and downbeat tracking
//!
//! - State space: discrete (tempo, beat, phase) states
//! - Transition model: phase advance and tempo changes at beat boundaries
//! - Observation model: activation log-likelihoods per state class
//! - Model: the three above, built once per configuration

pub mod model;
pub mod observation;
pub mod state_space;
pub mod transition;

pub use model::Model;
