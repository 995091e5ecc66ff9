//! Beat tracking modules
//!
//! - Dynamic Bayesian network (state space, transitions, observations)
//! - Viterbi decoding and beat extraction

pub mod dbn;
pub mod decoder;
