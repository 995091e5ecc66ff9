//! Parallel decoding of many activation sequences
//!
//! Parallelism is across sequences: the shared [`Model`] is read-only and every
//! decode allocates its own Viterbi tables. Each individual decode stays
//! single-threaded.

use crate::analysis::result::DecodeResult;
use crate::error::DecodeError;
use crate::features::dbn::Model;
use crate::io::activations::ActivationSequence;
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

/// Decode every sequence with the same model, in parallel
///
/// Results are returned in input order; one failing sequence does not affect
/// the others.
pub fn decode_batch(
    model: &Model,
    sequences: &[ActivationSequence],
) -> Vec<Result<DecodeResult, DecodeError>> {
    log::debug!("Batch decoding {} sequences", sequences.len());
    sequences
        .par_iter()
        .map(|activations| crate::decode(model, activations))
        .collect()
}

/// Decode every sequence in parallel, stopping all of them once `cancel` is set
///
/// Sequences still running (or not yet started) when `cancel` is raised
/// report `DecodeError::Cancelled`.
pub fn decode_batch_with_cancel(
    model: &Model,
    sequences: &[ActivationSequence],
    cancel: &AtomicBool,
) -> Vec<Result<DecodeResult, DecodeError>> {
    sequences
        .par_iter()
        .map(|activations| crate::decode_with_cancel(model, activations, cancel))
        .collect()
}

/// Decode on a dedicated thread pool with a fixed number of workers
///
/// # Errors
///
/// Returns `DecodeError::InvalidInput` if the thread pool cannot be created.
pub fn decode_batch_with_threads(
    model: &Model,
    sequences: &[ActivationSequence],
    threads: usize,
) -> Result<Vec<Result<DecodeResult, DecodeError>>, DecodeError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| DecodeError::InvalidInput(format!("cannot build thread pool: {}", e)))?;
    Ok(pool.install(|| decode_batch(model, sequences)))
}
