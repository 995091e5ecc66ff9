//! Viterbi decoding
//!
//! Finds the most likely state sequence through a sparse state graph given
//! framewise observation log-likelihoods:
//!
//! ```text
//! score[0][s] = obs(0, s)
//! score[t][s] = obs(t, s) + max over edges s' -> s of (score[t-1][s'] + logp(s' -> s))
//! ```
//!
//! Only two score rows are kept. The winning predecessor of every cell is
//! stored as a one-byte offset into the destination's incoming edge list, so
//! the backtracking table costs `T × N` bytes.
//!
//! Ties are broken towards the first incoming edge (edges are ordered by
//! ascending tempo bucket) and, at the final frame, towards the lowest state
//! index, which makes decoding fully deterministic.

use crate::error::DecodeError;
use crate::features::dbn::transition::Edges;
use std::sync::atomic::{AtomicBool, Ordering};

/// State graph the decoder runs on
pub trait StateGraph {
    /// Number of states
    fn num_states(&self) -> usize;

    /// Incoming edges of a state
    fn edges_into(&self, state: usize) -> Edges<'_>;

    /// True if the state starts a beat
    fn is_beat(&self, state: usize) -> bool;

    /// True if the state starts a bar
    fn is_downbeat(&self, state: usize) -> bool;
}

/// Framewise observation scores
pub trait Emission {
    /// Number of frames
    fn num_frames(&self) -> usize;

    /// Fill `scores[s]` with the log-likelihood of `frame` in state `s`
    fn frame_log_likelihoods(&self, frame: usize, scores: &mut [f64]);
}

/// Most likely state sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiPath {
    /// State index per frame
    pub states: Vec<usize>,
    /// Log-probability of the path
    pub log_probability: f64,
}

impl ViterbiPath {
    /// Number of frames
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if the path has no frames
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Decode the most likely path
///
/// # Errors
///
/// - `DecodeError::EmptyActivationSequence` if there are no frames
/// - `DecodeError::NoValidPath` if the graph is empty, has a state with more
///   than 256 incoming edges, or no state ends with finite probability
pub fn viterbi<G, E>(graph: &G, emission: &E) -> Result<ViterbiPath, DecodeError>
where
    G: StateGraph + ?Sized,
    E: Emission + ?Sized,
{
    decode(graph, emission, None)
}

/// Decode the most likely path, checking `cancel` once per frame
///
/// # Errors
///
/// As [`viterbi`], plus `DecodeError::Cancelled` once `cancel` is set.
pub fn viterbi_with_cancel<G, E>(
    graph: &G,
    emission: &E,
    cancel: &AtomicBool,
) -> Result<ViterbiPath, DecodeError>
where
    G: StateGraph + ?Sized,
    E: Emission + ?Sized,
{
    decode(graph, emission, Some(cancel))
}

fn decode<G, E>(
    graph: &G,
    emission: &E,
    cancel: Option<&AtomicBool>,
) -> Result<ViterbiPath, DecodeError>
where
    G: StateGraph + ?Sized,
    E: Emission + ?Sized,
{
    let num_frames = emission.num_frames();
    let num_states = graph.num_states();

    if num_frames == 0 {
        return Err(DecodeError::EmptyActivationSequence);
    }
    if num_states == 0 {
        return Err(DecodeError::NoValidPath("state space is empty".to_string()));
    }
    if let Some(state) = (0..num_states).find(|&s| graph.edges_into(s).len() > 256) {
        return Err(DecodeError::NoValidPath(format!(
            "state {} has {} incoming edges (at most 256 supported)",
            state,
            graph.edges_into(state).len()
        )));
    }

    let cancelled = || cancel.map_or(false, |flag| flag.load(Ordering::Relaxed));

    log::debug!(
        "Viterbi decoding: {} frames x {} states ({} KiB backpointers)",
        num_frames,
        num_states,
        num_frames * num_states / 1024
    );

    let mut prev = vec![0.0f64; num_states];
    let mut curr = vec![f64::NEG_INFINITY; num_states];
    let mut observed = vec![0.0f64; num_states];
    let mut backpointers = vec![0u8; num_frames * num_states];

    if cancelled() {
        return Err(DecodeError::Cancelled);
    }
    emission.frame_log_likelihoods(0, &mut prev);

    for frame in 1..num_frames {
        if cancelled() {
            log::debug!("Viterbi decoding cancelled at frame {}", frame);
            return Err(DecodeError::Cancelled);
        }

        emission.frame_log_likelihoods(frame, &mut observed);
        let row = &mut backpointers[frame * num_states..(frame + 1) * num_states];

        for state in 0..num_states {
            let edges = graph.edges_into(state);
            let mut best = f64::NEG_INFINITY;
            let mut best_edge = 0u8;
            for (k, (source, log_prob)) in edges.iter().enumerate() {
                let candidate = prev[source] + log_prob;
                if candidate > best {
                    best = candidate;
                    best_edge = k as u8;
                }
            }
            curr[state] = best + observed[state];
            row[state] = best_edge;
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    let mut last = 0;
    for state in 1..num_states {
        if prev[state] > prev[last] {
            last = state;
        }
    }
    let log_probability = prev[last];
    if !(log_probability > f64::NEG_INFINITY) {
        return Err(DecodeError::NoValidPath(format!(
            "no state reaches frame {} with finite probability",
            num_frames - 1
        )));
    }

    let mut states = vec![0usize; num_frames];
    let mut state = last;
    states[num_frames - 1] = state;
    for frame in (1..num_frames).rev() {
        let edge = backpointers[frame * num_states + state] as usize;
        state = graph.edges_into(state).sources[edge] as usize;
        states[frame - 1] = state;
    }

    log::debug!(
        "Viterbi decoding finished: log-probability {:.3}, final state {}",
        log_probability,
        last
    );

    Ok(ViterbiPath {
        states,
        log_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built graph: a two-state cycle plus an isolated absorbing state
    struct ToyGraph {
        sources: Vec<Vec<u32>>,
        log_probs: Vec<Vec<f64>>,
    }

    impl ToyGraph {
        fn cycle() -> Self {
            // 0 -> 1, 1 -> 0, 2 -> 2
            Self {
                sources: vec![vec![1], vec![0], vec![2]],
                log_probs: vec![vec![0.0], vec![0.0], vec![0.0]],
            }
        }
    }

    impl StateGraph for ToyGraph {
        fn num_states(&self) -> usize {
            self.sources.len()
        }

        fn edges_into(&self, state: usize) -> Edges<'_> {
            Edges {
                sources: &self.sources[state],
                log_probs: &self.log_probs[state],
            }
        }

        fn is_beat(&self, state: usize) -> bool {
            state == 0
        }

        fn is_downbeat(&self, _state: usize) -> bool {
            false
        }
    }

    struct Table(Vec<Vec<f64>>);

    impl Emission for Table {
        fn num_frames(&self) -> usize {
            self.0.len()
        }

        fn frame_log_likelihoods(&self, frame: usize, scores: &mut [f64]) {
            scores.copy_from_slice(&self.0[frame]);
        }
    }

    #[test]
    fn test_follows_best_cycle() {
        let graph = ToyGraph::cycle();
        // state 0 likely on even frames, state 1 on odd frames
        let table = Table(vec![
            vec![-0.1, -3.0, -2.0],
            vec![-3.0, -0.1, -2.0],
            vec![-0.1, -3.0, -2.0],
            vec![-3.0, -0.1, -2.0],
        ]);
        let path = viterbi(&graph, &table).unwrap();
        assert_eq!(path.states, vec![0, 1, 0, 1]);
        assert!((path.log_probability - (-0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_absorbing_state_wins_when_cycle_is_unlikely() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![vec![-5.0, -5.0, -1.0]; 3]);
        let path = viterbi(&graph, &table).unwrap();
        assert_eq!(path.states, vec![2, 2, 2]);
    }

    #[test]
    fn test_single_frame() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![vec![-1.0, -0.5, -2.0]]);
        let path = viterbi(&graph, &table).unwrap();
        assert_eq!(path.states, vec![1]);
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_ties_prefer_lowest_index() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![vec![-1.0, -1.0, -1.0]; 2]);
        let path = viterbi(&graph, &table).unwrap();
        assert_eq!(path.states, vec![1, 0]);
    }

    #[test]
    fn test_ties_prefer_first_edge() {
        // state 2 reachable from 0 and 1 with equal scores
        let graph = ToyGraph {
            sources: vec![vec![0], vec![1], vec![0, 1]],
            log_probs: vec![vec![0.0], vec![0.0], vec![-1.0, -1.0]],
        };
        let table = Table(vec![vec![-1.0, -1.0, -9.0], vec![-9.0, -9.0, 0.0]]);
        let path = viterbi(&graph, &table).unwrap();
        assert_eq!(path.states, vec![0, 2]);
    }

    #[test]
    fn test_empty_sequence() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![]);
        assert_eq!(
            viterbi(&graph, &table),
            Err(DecodeError::EmptyActivationSequence)
        );
    }

    #[test]
    fn test_no_valid_path() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![vec![f64::NEG_INFINITY; 3]; 2]);
        assert!(matches!(
            viterbi(&graph, &table),
            Err(DecodeError::NoValidPath(_))
        ));

        let empty = ToyGraph {
            sources: vec![],
            log_probs: vec![],
        };
        let table = Table(vec![vec![]; 2]);
        assert!(matches!(
            viterbi(&empty, &table),
            Err(DecodeError::NoValidPath(_))
        ));
    }

    #[test]
    fn test_cancelled() {
        let graph = ToyGraph::cycle();
        let table = Table(vec![vec![-1.0, -1.0, -1.0]; 10]);
        let cancel = AtomicBool::new(true);
        assert_eq!(
            viterbi_with_cancel(&graph, &table, &cancel),
            Err(DecodeError::Cancelled)
        );

        let cancel = AtomicBool::new(false);
        assert!(viterbi_with_cancel(&graph, &table, &cancel).is_ok());
    }
}
