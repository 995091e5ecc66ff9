//! # Stratum Beats
//!
//! Beat and downbeat decoding for DJ applications: turns framewise neural
//! network activations into beat timestamps, downbeats and a tempo estimate.
//!
//! ## Features
//!
//! - **Beat tracking**: dynamic Bayesian network over (tempo, phase) states
//! - **Downbeat tracking**: bar-level states for one or more time signatures
//! - **Viterbi decoding**: globally optimal path in log space, deterministic ties
//! - **Model reuse**: immutable models, cached per configuration, shared across threads
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum_beats::{build_model, decode, ActivationSequence, TrackerConfig};
//!
//! // Beat activations from the neural network, 100 frames per second
//! let activations = ActivationSequence::from_beats(vec![0.0f32; 1000], 100.0)?;
//!
//! let model = build_model(&TrackerConfig::beats())?;
//! let result = decode(&model, &activations)?;
//!
//! println!("BPM: {:.1}, {} beats", result.estimated_bpm, result.beat_count);
//! # Ok::<(), stratum_beats::DecodeError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Activations → State Space → Transition Model → Viterbi Decoder → Extractor → DecodeResult
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;

// Re-export main types
pub use analysis::cache::ModelCache;
pub use analysis::result::{BeatEvent, BeatGrid, DecodeResult};
pub use config::{Mode, TrackerConfig};
pub use error::DecodeError;
pub use features::dbn::Model;
pub use features::decoder::ViterbiPath;
pub use io::activations::ActivationSequence;

use features::decoder::{extract_beats, viterbi, viterbi_with_cancel};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Build a tracking model
///
/// The model is immutable and can be reused for any number of activation
/// sequences sampled at the configured frame rate.
///
/// # Errors
///
/// Returns `DecodeError::InvalidConfiguration` if the configuration is invalid
/// (e.g. `min_bpm >= max_bpm`, `fps <= 0`, a zero beats-per-bar value).
///
/// # Example
///
/// ```
/// use stratum_beats::{build_model, DecodeError, TrackerConfig};
///
/// let config = TrackerConfig::beats().with_bpm_range(200.0, 100.0);
/// assert!(matches!(build_model(&config), Err(DecodeError::InvalidConfiguration(_))));
/// ```
pub fn build_model(config: &TrackerConfig) -> Result<Model, DecodeError> {
    let start_time = Instant::now();
    let model = Model::build(config)?;
    log::debug!(
        "Built {} model in {:.2} ms",
        config.mode.name(),
        start_time.elapsed().as_secs_f32() * 1000.0
    );
    Ok(model)
}

/// Decode the most likely state path for an activation sequence
///
/// The returned path has exactly one state per activation frame.
///
/// # Memory
///
/// Decoding allocates one byte of backtracking storage per frame and state
/// ([`Model::backpointer_bytes`]). Long tracks against the default downbeat
/// model need hundreds of megabytes; a narrower BPM range or fewer tempo
/// buckets reduces this proportionally.
///
/// # Errors
///
/// - `DecodeError::EmptyActivationSequence` for zero frames
/// - `DecodeError::InvalidInput` for a channel count or frame rate mismatch
/// - `DecodeError::NoValidPath` if the model admits no path (a model bug)
pub fn decode_path(model: &Model, activations: &ActivationSequence) -> Result<ViterbiPath, DecodeError> {
    model.check_activations(activations)?;
    log::debug!(
        "Decoding {} frames ({:.1} MB backpointers)",
        activations.len(),
        model.backpointer_bytes(activations.len()) as f32 / 1_000_000.0
    );
    viterbi(model, &model.emission(activations))
}

/// Decode beats (and downbeats) from an activation sequence
///
/// Memory use is dominated by the Viterbi backtracking table, see
/// [`decode_path`].
///
/// # Errors
///
/// See [`decode_path`].
///
/// # Example
///
/// ```
/// use stratum_beats::{build_model, decode, ActivationSequence, TrackerConfig};
///
/// let config = TrackerConfig::beats().with_bpm_range(100.0, 140.0);
/// let model = build_model(&config)?;
///
/// // A beat every 50 frames (120 BPM at 100 fps)
/// let values: Vec<f32> = (0..500).map(|t| if t % 50 == 0 { 1.0 } else { 0.0 }).collect();
/// let activations = ActivationSequence::from_beats(values, 100.0)?;
///
/// let result = decode(&model, &activations)?;
/// assert_eq!(result.beat_count, 10);
/// # Ok::<(), stratum_beats::DecodeError>(())
/// ```
pub fn decode(model: &Model, activations: &ActivationSequence) -> Result<DecodeResult, DecodeError> {
    let start_time = Instant::now();
    let path = decode_path(model, activations)?;
    let result = extract_beats(model, activations, &path, model.config().correct);
    log::debug!(
        "Decoded {} frames into {} beats in {:.2} ms",
        activations.len(),
        result.beat_count,
        start_time.elapsed().as_secs_f32() * 1000.0
    );
    Ok(result)
}

/// Decode beats, checking `cancel` once per frame
///
/// # Errors
///
/// As [`decode`], plus `DecodeError::Cancelled` once `cancel` is set.
pub fn decode_with_cancel(
    model: &Model,
    activations: &ActivationSequence,
    cancel: &AtomicBool,
) -> Result<DecodeResult, DecodeError> {
    model.check_activations(activations)?;
    let path = viterbi_with_cancel(model, &model.emission(activations), cancel)?;
    Ok(extract_beats(model, activations, &path, model.config().correct))
}
