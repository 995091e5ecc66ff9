//! Tempo/phase state spaces
//!
//! Every state is a `(signature, tempo, beat, phase)` tuple. `tempo` selects a
//! tempo bucket (an inter-beat interval in frames), `phase` counts frames
//! since the last beat and `beat` is the position within the bar.
//!
//! States are laid out in one flat arena ordered by signature block, then
//! tempo bucket, then beat, then phase. Advancing the phase therefore always
//! moves to the next index, and within a signature block lower tempo indices
//! come first.
//!
//! # Tempo discretization
//!
//! The BPM range maps to an interval range of
//! `[60 * fps / max_bpm, 60 * fps / min_bpm]` frames. By default every integer
//! interval in that range becomes a bucket. With `num_tempi` set below the
//! number of integer intervals, the buckets are log-spaced instead, which
//! keeps the state space small for wide BPM ranges.
//!
//! # Example
//!
//! ```
//! use stratum_beats::features::dbn::state_space::TempoBuckets;
//!
//! let buckets = TempoBuckets::new(100.0, 140.0, 100.0, None)?;
//! assert_eq!(buckets.intervals().first(), Some(&43));
//! assert_eq!(buckets.intervals().last(), Some(&60));
//! # Ok::<(), stratum_beats::DecodeError>(())
//! ```

use crate::config::{Mode, TrackerConfig};
use crate::error::DecodeError;

/// Discrete tempo hypotheses, as inter-beat intervals in frames (ascending)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoBuckets {
    intervals: Vec<u32>,
}

impl TempoBuckets {
    /// Discretize a BPM range at the given frame rate
    ///
    /// # Arguments
    ///
    /// * `min_bpm` - Slowest tempo (largest interval)
    /// * `max_bpm` - Fastest tempo (smallest interval)
    /// * `fps` - Frames per second
    /// * `num_tempi` - Number of log-spaced buckets, or `None` for every integer interval
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` for a non-positive frame rate
    /// or an empty/inverted BPM range.
    pub fn new(
        min_bpm: f32,
        max_bpm: f32,
        fps: f32,
        num_tempi: Option<usize>,
    ) -> Result<Self, DecodeError> {
        if !(fps > 0.0) || !(min_bpm > 0.0) || !(min_bpm < max_bpm) {
            return Err(DecodeError::InvalidConfiguration(format!(
                "cannot discretize {}-{} BPM at {} fps",
                min_bpm, max_bpm, fps
            )));
        }

        let min_interval = 60.0 * fps as f64 / max_bpm as f64;
        let max_interval = 60.0 * fps as f64 / min_bpm as f64;

        let lo = (min_interval.round() as u32).max(1);
        let hi = (max_interval.round() as u32).max(lo);
        let linear: Vec<u32> = (lo..=hi).collect();

        let intervals = match num_tempi {
            Some(n) if n < linear.len() => log_spaced_intervals(min_interval, max_interval, n),
            _ => linear,
        };

        Ok(Self { intervals })
    }

    /// Build directly from intervals (sorted and deduplicated; zero intervals dropped)
    pub fn from_intervals(mut intervals: Vec<u32>) -> Result<Self, DecodeError> {
        intervals.retain(|&i| i > 0);
        intervals.sort_unstable();
        intervals.dedup();
        if intervals.is_empty() {
            return Err(DecodeError::InvalidConfiguration(
                "no positive tempo intervals".to_string(),
            ));
        }
        Ok(Self { intervals })
    }

    /// Intervals in frames, ascending
    pub fn intervals(&self) -> &[u32] {
        &self.intervals
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// True if there are no buckets
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Interval of one bucket
    pub fn interval(&self, tempo: usize) -> u32 {
        self.intervals[tempo]
    }

    /// Tempo of one bucket in BPM
    pub fn bpm(&self, tempo: usize, fps: f32) -> f32 {
        interval_to_bpm(self.intervals[tempo] as f32, fps)
    }
}

/// Convert an inter-beat interval in frames to BPM
pub fn interval_to_bpm(interval: f32, fps: f32) -> f32 {
    60.0 * fps / interval
}

/// Log-spaced integer intervals, sampled more densely until `num_tempi`
/// distinct values result
fn log_spaced_intervals(min_interval: f64, max_interval: f64, num_tempi: usize) -> Vec<u32> {
    let lo = min_interval.log2();
    let hi = max_interval.log2();
    let mut num_points = num_tempi;

    loop {
        let mut intervals: Vec<u32> = (0..num_points)
            .map(|i| {
                let x = if num_points > 1 {
                    lo + (hi - lo) * i as f64 / (num_points - 1) as f64
                } else {
                    lo
                };
                (x.exp2().round() as u32).max(1)
            })
            .collect();
        intervals.dedup();

        if intervals.len() >= num_tempi {
            return intervals;
        }
        num_points += 1;
    }
}

/// Decoded view of one state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Index of the time-signature sub-space
    pub signature: usize,
    /// Tempo bucket index
    pub tempo: usize,
    /// Beat within the bar (0-based)
    pub beat: u32,
    /// Frames since the beat started, in `[0, interval)`
    pub phase: u32,
    /// Interval of the tempo bucket in frames
    pub interval: u32,
    /// Beats per bar of the signature sub-space
    pub beats_per_bar: u32,
}

/// Placement of one time-signature sub-space in the state arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarLayout {
    /// Beats per bar
    pub beats_per_bar: u32,
    /// Index of the first state of this sub-space
    pub offset: usize,
    /// Number of states in this sub-space
    pub len: usize,
    /// Start of each tempo block relative to `offset`
    tempo_offsets: Vec<usize>,
}

impl BarLayout {
    fn new(beats_per_bar: u32, offset: usize, buckets: &TempoBuckets) -> Self {
        let mut tempo_offsets = Vec::with_capacity(buckets.len());
        let mut len = 0;
        for &interval in buckets.intervals() {
            tempo_offsets.push(len);
            len += beats_per_bar as usize * interval as usize;
        }
        Self {
            beats_per_bar,
            offset,
            len,
            tempo_offsets,
        }
    }

    /// Arena index of `(tempo, beat, phase)` within this sub-space
    pub fn index(&self, buckets: &TempoBuckets, tempo: usize, beat: u32, phase: u32) -> usize {
        let interval = buckets.interval(tempo) as usize;
        self.offset + self.tempo_offsets[tempo] + beat as usize * interval + phase as usize
    }
}

/// Per-state lookup arrays shared by both state space variants
#[derive(Debug, Clone)]
pub struct StateTable {
    buckets: TempoBuckets,
    bars: Vec<BarLayout>,
    tempo: Vec<u32>,
    beat: Vec<u32>,
    phase: Vec<u32>,
    signature: Vec<u32>,
}

impl StateTable {
    fn new(buckets: TempoBuckets, signatures: &[u32]) -> Result<Self, DecodeError> {
        if signatures.is_empty() {
            return Err(DecodeError::InvalidConfiguration(
                "at least one time signature is required".to_string(),
            ));
        }
        if signatures.contains(&0) {
            return Err(DecodeError::InvalidConfiguration(
                "time signature with zero beats per bar".to_string(),
            ));
        }

        let mut bars = Vec::with_capacity(signatures.len());
        let mut offset = 0;
        for &beats_per_bar in signatures {
            let layout = BarLayout::new(beats_per_bar, offset, &buckets);
            offset += layout.len;
            bars.push(layout);
        }

        let num_states = offset;
        let mut tempo = Vec::with_capacity(num_states);
        let mut beat = Vec::with_capacity(num_states);
        let mut phase = Vec::with_capacity(num_states);
        let mut signature = Vec::with_capacity(num_states);

        for (sig, layout) in bars.iter().enumerate() {
            for (t, &interval) in buckets.intervals().iter().enumerate() {
                for b in 0..layout.beats_per_bar {
                    for p in 0..interval {
                        tempo.push(t as u32);
                        beat.push(b);
                        phase.push(p);
                        signature.push(sig as u32);
                    }
                }
            }
        }

        Ok(Self {
            buckets,
            bars,
            tempo,
            beat,
            phase,
            signature,
        })
    }

    fn state(&self, index: usize) -> State {
        let signature = self.signature[index] as usize;
        let tempo = self.tempo[index] as usize;
        State {
            signature,
            tempo,
            beat: self.beat[index],
            phase: self.phase[index],
            interval: self.buckets.interval(tempo),
            beats_per_bar: self.bars[signature].beats_per_bar,
        }
    }
}

/// Beat-only state space: one state per `(tempo, phase)`
#[derive(Debug, Clone)]
pub struct BeatStateSpace {
    core: StateTable,
}

impl BeatStateSpace {
    /// Create a beat-only state space over the given tempo buckets
    pub fn new(buckets: TempoBuckets) -> Result<Self, DecodeError> {
        Ok(Self {
            core: StateTable::new(buckets, &[1])?,
        })
    }
}

/// Downbeat state space: union of independent bar sub-spaces, one per
/// beats-per-bar value
#[derive(Debug, Clone)]
pub struct DownbeatStateSpace {
    core: StateTable,
}

impl DownbeatStateSpace {
    /// Create a downbeat state space with one sub-space per signature
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` if `signatures` is empty or
    /// contains a zero.
    pub fn new(buckets: TempoBuckets, signatures: &[u32]) -> Result<Self, DecodeError> {
        Ok(Self {
            core: StateTable::new(buckets, signatures)?,
        })
    }
}

/// State space of either detection mode
#[derive(Debug, Clone)]
pub enum StateSpace {
    /// Beats only
    BeatOnly(BeatStateSpace),
    /// Beats and downbeats
    Downbeat(DownbeatStateSpace),
}

impl StateSpace {
    /// Build the state space described by a configuration
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` if the configuration is invalid.
    pub fn build(config: &TrackerConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        let buckets = TempoBuckets::new(
            config.min_bpm,
            config.max_bpm,
            config.fps,
            config.effective_num_tempi(),
        )?;

        let space = match config.mode {
            Mode::Beats => StateSpace::BeatOnly(BeatStateSpace::new(buckets)?),
            Mode::Downbeats => {
                StateSpace::Downbeat(DownbeatStateSpace::new(buckets, &config.beats_per_bar)?)
            }
        };

        let buckets = space.buckets();
        log::debug!(
            "Built {} state space: {} states, {} tempo buckets ({:.1}-{:.1} BPM)",
            space.mode().name(),
            space.num_states(),
            buckets.len(),
            buckets.bpm(buckets.len() - 1, config.fps),
            buckets.bpm(0, config.fps),
        );

        Ok(space)
    }

    fn core(&self) -> &StateTable {
        match self {
            StateSpace::BeatOnly(space) => &space.core,
            StateSpace::Downbeat(space) => &space.core,
        }
    }

    /// Detection mode of this state space
    pub fn mode(&self) -> Mode {
        match self {
            StateSpace::BeatOnly(_) => Mode::Beats,
            StateSpace::Downbeat(_) => Mode::Downbeats,
        }
    }

    /// Total number of states
    pub fn num_states(&self) -> usize {
        self.core().tempo.len()
    }

    /// Tempo buckets
    pub fn buckets(&self) -> &TempoBuckets {
        &self.core().buckets
    }

    /// Signature sub-spaces (a single one-beat bar in beat-only mode)
    pub fn bars(&self) -> &[BarLayout] {
        &self.core().bars
    }

    /// Decoded view of a state
    pub fn state(&self, index: usize) -> State {
        self.core().state(index)
    }

    /// Phase of a state
    pub fn phase(&self, index: usize) -> u32 {
        self.core().phase[index]
    }

    /// Beat-within-bar of a state
    pub fn beat(&self, index: usize) -> u32 {
        self.core().beat[index]
    }

    /// Interval in frames of a state's tempo bucket
    pub fn interval(&self, index: usize) -> u32 {
        let core = self.core();
        core.buckets.interval(core.tempo[index] as usize)
    }

    /// Arena index of a state
    pub fn index_of(&self, signature: usize, tempo: usize, beat: u32, phase: u32) -> usize {
        let core = self.core();
        core.bars[signature].index(&core.buckets, tempo, beat, phase)
    }

    /// True if the state starts a beat
    pub fn is_beat(&self, index: usize) -> bool {
        self.core().phase[index] == 0
    }

    /// True if the state starts a bar (downbeat mode only)
    pub fn is_downbeat(&self, index: usize) -> bool {
        match self {
            StateSpace::BeatOnly(_) => false,
            StateSpace::Downbeat(space) => {
                space.core.phase[index] == 0 && space.core.beat[index] == 0
            }
        }
    }
}
