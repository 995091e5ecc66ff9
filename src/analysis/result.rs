//! Decode result types

use crate::config::Mode;
use serde::{Deserialize, Serialize};

/// One decoded beat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Activation frame index
    #[serde(skip)]
    pub frame: usize,

    /// Time in seconds
    pub time_seconds: f32,

    /// True for the first beat of a bar (downbeat mode only)
    pub is_downbeat: bool,

    /// Position in the bar, 1-based (always 1 in beat-only mode)
    pub beat_number: u32,
}

/// Beat grid structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Downbeat times (beat 1) in seconds
    pub downbeats: Vec<f32>,

    /// All beat times in seconds
    pub beats: Vec<f32>,

    /// Bar boundaries in seconds
    pub bars: Vec<f32>,
}

/// Complete decode result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    /// Detection mode the result was decoded with
    pub mode: Mode,

    /// Beats in time order
    pub beats: Vec<BeatEvent>,

    /// Tempo estimate from the median interval along the decoded path
    pub estimated_bpm: f32,

    /// Number of beats
    pub beat_count: usize,

    /// Number of downbeats (0 in beat-only mode)
    pub bar_count: usize,

    /// Beats per bar of the winning time signature (downbeat mode only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beats_per_bar: Option<u32>,
}

impl DecodeResult {
    /// Beat times in seconds
    pub fn beat_times(&self) -> Vec<f32> {
        self.beats.iter().map(|b| b.time_seconds).collect()
    }

    /// Downbeat times in seconds
    pub fn downbeat_times(&self) -> Vec<f32> {
        self.beats
            .iter()
            .filter(|b| b.is_downbeat)
            .map(|b| b.time_seconds)
            .collect()
    }

    /// `[time_seconds, beat_number]` rows, one per beat
    pub fn beat_data(&self) -> Vec<[f32; 2]> {
        self.beats
            .iter()
            .map(|b| [b.time_seconds, b.beat_number as f32])
            .collect()
    }

    /// Beat grid view: bars run from one downbeat to the next
    pub fn beat_grid(&self) -> BeatGrid {
        let downbeats = self.downbeat_times();
        BeatGrid {
            bars: downbeats.clone(),
            downbeats,
            beats: self.beat_times(),
        }
    }
}
