//! Input modules
//!
//! Activation sequences produced by the external neural network.

pub mod activations;
