//! Path decoding
//!
//! - Viterbi search over the tracking model
//! - Beat/downbeat extraction from the decoded path

pub mod extractor;
pub mod viterbi;

pub use extractor::extract_beats;
pub use viterbi::{viterbi, viterbi_with_cancel, Emission, StateGraph, ViterbiPath};
