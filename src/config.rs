//! Configuration parameters for beat and downbeat decoding

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of log-spaced tempo buckets used in downbeat mode unless overridden
pub const DEFAULT_DOWNBEAT_NUM_TEMPI: usize = 60;

/// Detection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Beats only (single activation channel)
    Beats,
    /// Beats and downbeats (beat + downbeat activation channels)
    Downbeats,
}

impl Mode {
    /// Name as used in request payloads ("beats" or "downbeats")
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Beats => "beats",
            Mode::Downbeats => "downbeats",
        }
    }

    /// Number of activation channels this mode consumes
    pub fn channels(&self) -> usize {
        match self {
            Mode::Beats => 1,
            Mode::Downbeats => 2,
        }
    }
}

impl FromStr for Mode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beats" => Ok(Mode::Beats),
            "downbeats" => Ok(Mode::Downbeats),
            other => Err(DecodeError::InvalidConfiguration(format!(
                "unknown mode '{}' (expected 'beats' or 'downbeats')",
                other
            ))),
        }
    }
}

/// Tracker configuration parameters
///
/// Deserialized configurations start from [`TrackerConfig::default`] (the
/// downbeat preset), so a request only needs to name the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detection mode (default: Downbeats)
    pub mode: Mode,

    /// Activation frame rate in frames per second (default: 100.0)
    pub fps: f32,

    /// Minimum tempo in BPM (default: 55.0)
    pub min_bpm: f32,

    /// Maximum tempo in BPM (default: 215.0)
    pub max_bpm: f32,

    /// Candidate beats per bar, one state sub-space each (default: [3, 4])
    /// Ignored in beat-only mode
    pub beats_per_bar: Vec<u32>,

    /// Tempo change strictness (default: 100.0)
    /// Higher values penalize tempo changes more strongly
    pub transition_lambda: f32,

    /// Beat region denominator (default: 16.0)
    /// The first 1/observation_lambda of every beat is scored as "beat"
    pub observation_lambda: f32,

    /// Number of tempo buckets (default: None)
    ///
    /// `None` selects the mode default: one bucket per integer interval in
    /// beat-only mode, 60 log-spaced buckets in downbeat mode. A value at or
    /// above the number of integer intervals also yields the linear grid.
    pub num_tempi: Option<usize>,

    /// Move each beat to the activation peak inside its beat region (default: false)
    pub correct: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::downbeats()
    }
}

impl TrackerConfig {
    /// Beat-only preset
    pub fn beats() -> Self {
        Self {
            mode: Mode::Beats,
            fps: 100.0,
            min_bpm: 55.0,
            max_bpm: 215.0,
            beats_per_bar: vec![3, 4],
            transition_lambda: 100.0,
            observation_lambda: 16.0,
            num_tempi: None,
            correct: false,
        }
    }

    /// Beat + downbeat preset
    pub fn downbeats() -> Self {
        Self {
            mode: Mode::Downbeats,
            ..Self::beats()
        }
    }

    /// Builder-style BPM range override
    pub fn with_bpm_range(mut self, min_bpm: f32, max_bpm: f32) -> Self {
        self.min_bpm = min_bpm;
        self.max_bpm = max_bpm;
        self
    }

    /// Builder-style time signature override
    pub fn with_beats_per_bar(mut self, beats_per_bar: Vec<u32>) -> Self {
        self.beats_per_bar = beats_per_bar;
        self
    }

    /// Builder-style transition lambda override
    pub fn with_transition_lambda(mut self, transition_lambda: f32) -> Self {
        self.transition_lambda = transition_lambda;
        self
    }

    /// Resolved number of tempo buckets (`None` = one per integer interval)
    pub fn effective_num_tempi(&self) -> Option<usize> {
        match (self.num_tempi, self.mode) {
            (Some(n), _) => Some(n),
            (None, Mode::Beats) => None,
            (None, Mode::Downbeats) => Some(DEFAULT_DOWNBEAT_NUM_TEMPI),
        }
    }

    /// Beats per bar of every state sub-space (`[1]` in beat-only mode)
    pub fn signatures(&self) -> Vec<u32> {
        match self.mode {
            Mode::Beats => vec![1],
            Mode::Downbeats => self.beats_per_bar.clone(),
        }
    }

    /// Check all parameters
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` describing the first invalid parameter.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let invalid = |msg: String| Err(DecodeError::InvalidConfiguration(msg));

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return invalid(format!("fps must be positive, got {}", self.fps));
        }
        if !self.min_bpm.is_finite() || self.min_bpm <= 0.0 {
            return invalid(format!("min_bpm must be positive, got {}", self.min_bpm));
        }
        if !self.max_bpm.is_finite() {
            return invalid(format!("max_bpm must be finite, got {}", self.max_bpm));
        }
        if self.min_bpm >= self.max_bpm {
            return invalid(format!(
                "min_bpm ({}) must be below max_bpm ({})",
                self.min_bpm, self.max_bpm
            ));
        }
        if !self.transition_lambda.is_finite() || self.transition_lambda < 0.0 {
            return invalid(format!(
                "transition_lambda must be >= 0, got {}",
                self.transition_lambda
            ));
        }
        if !self.observation_lambda.is_finite() || self.observation_lambda <= 1.0 {
            return invalid(format!(
                "observation_lambda must be > 1, got {}",
                self.observation_lambda
            ));
        }
        if self.num_tempi == Some(0) {
            return invalid("num_tempi must be at least 1".to_string());
        }

        if self.mode == Mode::Downbeats {
            if self.beats_per_bar.is_empty() {
                return invalid("at least one beats_per_bar value is required".to_string());
            }
            for (i, &beats) in self.beats_per_bar.iter().enumerate() {
                if beats == 0 {
                    return invalid("beats_per_bar values must be > 0".to_string());
                }
                if self.beats_per_bar[..i].contains(&beats) {
                    return invalid(format!("duplicate beats_per_bar value {}", beats));
                }
            }
        }

        Ok(())
    }

    /// Hashable identity of this configuration, used to cache built models
    pub fn key(&self) -> ConfigKey {
        ConfigKey {
            mode: self.mode,
            fps_bits: self.fps.to_bits(),
            min_bpm_bits: self.min_bpm.to_bits(),
            max_bpm_bits: self.max_bpm.to_bits(),
            signatures: self.signatures(),
            transition_lambda_bits: self.transition_lambda.to_bits(),
            observation_lambda_bits: self.observation_lambda.to_bits(),
            num_tempi: self.effective_num_tempi(),
            correct: self.correct,
        }
    }
}

/// Parameters of a [`TrackerConfig`] in hashable form
///
/// Includes `correct`: a cached model carries its configuration into
/// [`crate::decode`], so configurations differing only in peak correction
/// must not share a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    mode: Mode,
    fps_bits: u32,
    min_bpm_bits: u32,
    max_bpm_bits: u32,
    signatures: Vec<u32>,
    transition_lambda_bits: u32,
    observation_lambda_bits: u32,
    num_tempi: Option<usize>,
    correct: bool,
}

/// Parse a comma-separated beats-per-bar list such as `"3, 4"`
///
/// # Errors
///
/// Returns `DecodeError::InvalidConfiguration` if any entry is not a positive integer.
pub fn parse_beats_per_bar(input: &str) -> Result<Vec<u32>, DecodeError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u32>() {
            Ok(0) | Err(_) => Err(DecodeError::InvalidConfiguration(format!(
                "invalid beats_per_bar entry '{}'",
                part
            ))),
            Ok(beats) => Ok(beats),
        })
        .collect()
}
