//! Beat extraction from a decoded state path
//!
//! A beat is emitted at every frame whose state starts a beat (phase 0). In
//! downbeat mode the beat is a downbeat when it also starts the bar. The tempo
//! estimate is the median interval visited along the whole path, which is
//! robust to short tempo excursions.
//!
//! With peak correction enabled each beat is moved to the frame with the
//! strongest activation inside the beat region that starts at its phase-0
//! frame. The region ends before the next beat starts, so corrected beats stay
//! strictly increasing.

use super::viterbi::ViterbiPath;
use crate::analysis::result::{BeatEvent, DecodeResult};
use crate::analysis::tempo::{interval_median, median_interval_bpm};
use crate::config::Mode;
use crate::features::dbn::observation::ObservationClass;
use crate::features::dbn::Model;
use crate::io::activations::ActivationSequence;

/// Turn a decoded path into beat events and a tempo estimate
///
/// # Arguments
///
/// * `model` - Model the path was decoded with
/// * `activations` - Activations the path was decoded from
/// * `path` - Viterbi path (one state per activation frame)
/// * `correct` - Move beats to the activation peak inside their beat region
pub fn extract_beats(
    model: &Model,
    activations: &ActivationSequence,
    path: &ViterbiPath,
    correct: bool,
) -> DecodeResult {
    let space = model.state_space();
    let fps = activations.fps();
    let mode = space.mode();

    let observations = model.observations();
    let mut beats = Vec::new();
    for (frame, &state) in path.states.iter().enumerate() {
        // a path may start inside a beat region whose phase 0 precedes frame 0
        let leading_region =
            correct && frame == 0 && observations.class(state) != ObservationClass::NoBeat;
        if !space.is_beat(state) && !leading_region {
            continue;
        }
        let beat_frame = if correct {
            peak_in_beat_region(model, activations, path, frame)
        } else {
            frame
        };
        beats.push(BeatEvent {
            frame: beat_frame,
            time_seconds: beat_frame as f32 / fps,
            is_downbeat: observations.class(state) == ObservationClass::Downbeat,
            beat_number: space.beat(state) + 1,
        });
    }

    let intervals: Vec<u32> = path.states.iter().map(|&s| space.interval(s)).collect();
    let estimated_bpm = median_interval_bpm(&intervals, fps);

    let beats_per_bar = match mode {
        Mode::Beats => None,
        Mode::Downbeats => path
            .states
            .last()
            .map(|&s| space.state(s).beats_per_bar),
    };

    let bar_count = beats.iter().filter(|b| b.is_downbeat).count();

    log::debug!(
        "Extracted {} beats, {} bars, {:.1} BPM (median interval {:.1} frames)",
        beats.len(),
        bar_count,
        estimated_bpm,
        interval_median(&intervals)
    );

    DecodeResult {
        mode,
        beat_count: beats.len(),
        bar_count,
        beats_per_bar,
        estimated_bpm,
        beats,
    }
}

/// Frame with the highest beat strength in the beat region starting at `start`
///
/// `start` is a phase-0 frame, or frame 0 when the path begins inside a beat region.
fn peak_in_beat_region(
    model: &Model,
    activations: &ActivationSequence,
    path: &ViterbiPath,
    start: usize,
) -> usize {
    let space = model.state_space();
    let observations = model.observations();

    let mut best = start;
    let mut best_strength = activations.beat_strength(start);
    for frame in start + 1..path.len() {
        let state = path.states[frame];
        if space.is_beat(state) || observations.class(state) == ObservationClass::NoBeat {
            break;
        }
        let strength = activations.beat_strength(frame);
        if strength > best_strength {
            best = frame;
            best_strength = strength;
        }
    }
    best
}
