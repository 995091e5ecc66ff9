//! Framewise activation sequences
//!
//! An [`ActivationSequence`] is the immutable output of the external neural
//! network: one beat activation per frame, or a `(beat, downbeat)` pair per
//! frame, sampled at a fixed frame rate.
//!
//! # JSON format
//!
//! ```json
//! { "fps": 100, "beat": [0.01, 0.92, ...], "downbeat": [0.0, 0.85, ...] }
//! ```
//!
//! `downbeat` is optional; when present it must have the same length as `beat`.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Activation values per frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frames {
    /// One beat activation per frame
    Beat(Vec<f32>),
    /// `[beat, downbeat]` activations per frame
    BeatDownbeat(Vec<[f32; 2]>),
}

/// Ordered, immutable activation sequence with its frame rate
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationSequence {
    fps: f32,
    frames: Frames,
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivationFile {
    fps: f32,
    beat: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    downbeat: Option<Vec<f32>>,
}

fn check_fps(fps: f32) -> Result<(), DecodeError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(DecodeError::InvalidInput(format!(
            "activation fps must be positive, got {}",
            fps
        )));
    }
    Ok(())
}

impl ActivationSequence {
    /// Single-channel (beat) activations
    pub fn from_beats(beat: Vec<f32>, fps: f32) -> Result<Self, DecodeError> {
        check_fps(fps)?;
        Ok(Self {
            fps,
            frames: Frames::Beat(beat),
        })
    }

    /// Two-channel activations given as `[beat, downbeat]` pairs
    pub fn from_beats_and_downbeats(frames: Vec<[f32; 2]>, fps: f32) -> Result<Self, DecodeError> {
        check_fps(fps)?;
        Ok(Self {
            fps,
            frames: Frames::BeatDownbeat(frames),
        })
    }

    /// Two-channel activations from separate beat and downbeat vectors
    pub fn from_channels(beat: &[f32], downbeat: &[f32], fps: f32) -> Result<Self, DecodeError> {
        if beat.len() != downbeat.len() {
            return Err(DecodeError::InvalidInput(format!(
                "beat and downbeat channels differ in length ({} vs {})",
                beat.len(),
                downbeat.len()
            )));
        }
        let frames = beat
            .iter()
            .zip(downbeat)
            .map(|(&b, &d)| [b, d])
            .collect();
        Self::from_beats_and_downbeats(frames, fps)
    }

    /// Downbeat network output with `[no_beat, beat, downbeat]` class probabilities
    ///
    /// The no-beat class is dropped; it is implied by the other two.
    pub fn from_network_output(output: &[[f32; 3]], fps: f32) -> Result<Self, DecodeError> {
        let frames = output.iter().map(|row| [row[1], row[2]]).collect();
        Self::from_beats_and_downbeats(frames, fps)
    }

    /// Parse activations from the JSON format described in the module docs
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, DecodeError> {
        let file: ActivationFile = serde_json::from_reader(reader)?;
        match file.downbeat {
            Some(downbeat) => Self::from_channels(&file.beat, &downbeat, file.fps),
            None => Self::from_beats(file.beat, file.fps),
        }
    }

    /// Load activations from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        log::debug!("Loading activations from {}", path.display());
        let file = File::open(path)
            .map_err(|e| DecodeError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_reader(BufReader::new(file))
    }

    /// Serialize to the JSON format described in the module docs
    pub fn to_json(&self) -> Result<String, DecodeError> {
        let file = match &self.frames {
            Frames::Beat(beat) => ActivationFile {
                fps: self.fps,
                beat: beat.clone(),
                downbeat: None,
            },
            Frames::BeatDownbeat(frames) => ActivationFile {
                fps: self.fps,
                beat: frames.iter().map(|f| f[0]).collect(),
                downbeat: Some(frames.iter().map(|f| f[1]).collect()),
            },
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Frame rate in frames per second
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        match &self.frames {
            Frames::Beat(v) => v.len(),
            Frames::BeatDownbeat(v) => v.len(),
        }
    }

    /// True if there are no frames
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of activation channels (1 or 2)
    pub fn channels(&self) -> usize {
        match &self.frames {
            Frames::Beat(_) => 1,
            Frames::BeatDownbeat(_) => 2,
        }
    }

    /// Raw frame storage
    pub fn frames(&self) -> &Frames {
        &self.frames
    }

    /// Beat strength of a frame: the beat activation, plus the downbeat
    /// activation for two-channel sequences
    pub fn beat_strength(&self, frame: usize) -> f32 {
        match &self.frames {
            Frames::Beat(v) => v[frame],
            Frames::BeatDownbeat(v) => v[frame][0] + v[frame][1],
        }
    }

    /// Time in seconds of a frame index
    pub fn time_of(&self, frame: usize) -> f32 {
        frame as f32 / self.fps
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.time_of(self.len())
    }

    /// Number of values outside [0, 1] (including non-finite values)
    pub fn out_of_range_count(&self) -> usize {
        let outside = |x: f32| !(0.0..=1.0).contains(&x);
        match &self.frames {
            Frames::Beat(v) => v.iter().filter(|&&x| outside(x)).count(),
            Frames::BeatDownbeat(v) => v.iter().flatten().filter(|&&x| outside(x)).count(),
        }
    }
}
