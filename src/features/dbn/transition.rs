//! Transition model
//!
//! Within a beat the phase advances by exactly one frame per step with
//! probability 1. At the last phase of a beat the model moves to phase 0 of
//! the next beat in the bar, and may switch to a neighbouring tempo bucket.
//!
//! Tempo changes are penalized in log space by
//!
//! ```text
//! penalty = transition_lambda * |interval_to / interval_from - 1|
//! ```
//!
//! and the weights `exp(-penalty)` of the (at most three) targets of a beat
//! boundary are normalized to sum to 1. Larger lambdas therefore make tempo
//! changes less likely; `transition_lambda = 0` makes all neighbours equally
//! likely.
//!
//! Edges are stored in compressed sparse rows keyed by destination state, which
//! is the access pattern of the Viterbi recurrence.

use super::state_space::{StateSpace, TempoBuckets};

/// Incoming edges of one destination state
#[derive(Debug, Clone, Copy)]
pub struct Edges<'a> {
    /// Source state indices, ordered by ascending tempo bucket
    pub sources: &'a [u32],
    /// Log-probabilities, parallel to `sources`
    pub log_probs: &'a [f64],
}

impl<'a> Edges<'a> {
    /// Number of incoming edges
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True if the state has no incoming edges
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over `(source, log_probability)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.sources
            .iter()
            .zip(self.log_probs.iter())
            .map(|(&s, &p)| (s as usize, p))
    }
}

/// Sparse, read-only transition model
#[derive(Debug, Clone)]
pub struct TransitionModel {
    /// `pointers[d]..pointers[d + 1]` indexes the incoming edges of state `d`
    pointers: Vec<usize>,
    sources: Vec<u32>,
    log_probs: Vec<f64>,
}

/// Log-probabilities of the tempo buckets reachable from `from` at a beat
/// boundary, as `(target_tempo, log_probability)` in ascending tempo order
pub fn tempo_change_log_probs(
    buckets: &TempoBuckets,
    from: usize,
    transition_lambda: f32,
) -> Vec<(usize, f64)> {
    let lambda = transition_lambda as f64;
    let from_interval = buckets.interval(from) as f64;
    let lo = from.saturating_sub(1);
    let hi = (from + 1).min(buckets.len() - 1);

    let penalties: Vec<(usize, f64)> = (lo..=hi)
        .map(|to| {
            let ratio = buckets.interval(to) as f64 / from_interval;
            (to, lambda * (ratio - 1.0).abs())
        })
        .collect();

    // log of the normalizer sum(exp(-penalty)); the zero-penalty self edge keeps it >= 0
    let log_norm = penalties
        .iter()
        .map(|&(_, p)| (-p).exp())
        .sum::<f64>()
        .ln();

    penalties
        .into_iter()
        .map(|(to, p)| (to, -p - log_norm))
        .collect()
}

impl TransitionModel {
    /// Build all transitions of a state space
    pub fn build(space: &StateSpace, transition_lambda: f32) -> Self {
        let buckets = space.buckets();
        let num_states = space.num_states();

        let boundary: Vec<Vec<(usize, f64)>> = (0..buckets.len())
            .map(|from| tempo_change_log_probs(buckets, from, transition_lambda))
            .collect();

        let mut pointers = Vec::with_capacity(num_states + 1);
        let mut sources = Vec::with_capacity(num_states + 2 * buckets.len());
        let mut log_probs = Vec::with_capacity(num_states + 2 * buckets.len());
        pointers.push(0);

        for dest in 0..num_states {
            let state = space.state(dest);
            if state.phase > 0 {
                sources.push((dest - 1) as u32);
                log_probs.push(0.0);
            } else {
                let prev_beat = (state.beat + state.beats_per_bar - 1) % state.beats_per_bar;
                let lo = state.tempo.saturating_sub(1);
                let hi = (state.tempo + 1).min(buckets.len() - 1);
                for from in lo..=hi {
                    let last_phase = buckets.interval(from) - 1;
                    let source = space.index_of(state.signature, from, prev_beat, last_phase);
                    let log_prob = boundary[from]
                        .iter()
                        .find(|&&(to, _)| to == state.tempo)
                        .map(|&(_, p)| p)
                        .unwrap_or(f64::NEG_INFINITY);
                    sources.push(source as u32);
                    log_probs.push(log_prob);
                }
            }
            pointers.push(sources.len());
        }

        log::debug!(
            "Built transition model: {} states, {} edges, lambda={}",
            num_states,
            sources.len(),
            transition_lambda
        );

        Self {
            pointers,
            sources,
            log_probs,
        }
    }

    /// Number of destination states
    pub fn num_states(&self) -> usize {
        self.pointers.len() - 1
    }

    /// Total number of edges
    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }

    /// Incoming edges of a state
    pub fn edges_into(&self, state: usize) -> Edges<'_> {
        let range = self.pointers[state]..self.pointers[state + 1];
        Edges {
            sources: &self.sources[range.clone()],
            log_probs: &self.log_probs[range],
        }
    }

    /// Largest number of incoming edges of any state
    pub fn max_in_degree(&self) -> usize {
        self.pointers
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Log of the total outgoing probability mass of every state
    ///
    /// A state without outgoing edges has `-inf`.
    pub fn outgoing_log_mass(&self) -> Vec<f64> {
        let mut mass = vec![0.0f64; self.num_states()];
        for (&source, &log_prob) in self.sources.iter().zip(&self.log_probs) {
            mass[source as usize] += log_prob.exp();
        }
        mass.into_iter().map(f64::ln).collect()
    }
}
