//! Integration tests for beat and downbeat decoding

use stratum_beats::analysis::tempo::estimate_bpm_from_beats;
use stratum_beats::{
    build_model, decode, decode_path, decode_with_cancel, ActivationSequence, DecodeError, Mode,
    ModelCache, TrackerConfig,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

/// Beat activations with a spike every `period` frames, starting at `offset`
fn beat_spikes(len: usize, period: usize, offset: usize) -> Vec<f32> {
    (0..len)
        .map(|t| if t >= offset && (t - offset) % period == 0 { 1.0 } else { 0.0 })
        .collect()
}

/// Two-channel activations: beat spikes every `period` frames, every
/// `beats_per_bar`-th spike is a downbeat instead
fn bar_spikes(len: usize, period: usize, beats_per_bar: usize) -> ActivationSequence {
    let frames = (0..len)
        .map(|t| {
            if t % period != 0 {
                [0.0, 0.0]
            } else if (t / period) % beats_per_bar == 0 {
                [0.05, 0.9]
            } else {
                [0.9, 0.05]
            }
        })
        .collect();
    ActivationSequence::from_beats_and_downbeats(frames, 100.0).unwrap()
}

fn beat_config() -> TrackerConfig {
    TrackerConfig::beats().with_bpm_range(100.0, 140.0)
}

fn downbeat_config() -> TrackerConfig {
    TrackerConfig::downbeats()
        .with_bpm_range(100.0, 140.0)
        .with_beats_per_bar(vec![3, 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_spikes_decode_to_120_bpm() {
        let model = build_model(&beat_config()).expect("valid configuration");
        let activations = ActivationSequence::from_beats(beat_spikes(1000, 50, 0), 100.0).unwrap();

        let result = decode(&model, &activations).expect("decoding should succeed");

        assert_eq!(result.mode, Mode::Beats);
        assert_eq!(result.beat_count, 20, "expected 20 beats, got {:?}", result.beat_times());
        assert_eq!(result.beats.len(), 20);
        assert_eq!(result.bar_count, 0);
        for pair in result.beats.windows(2) {
            let interval = pair[1].time_seconds - pair[0].time_seconds;
            assert!(
                (interval - 0.5).abs() < 0.02,
                "beat interval should be ~0.5s, got {:.3}s",
                interval
            );
        }
        assert!(
            (result.estimated_bpm - 120.0).abs() < 1.0,
            "BPM should be ~120, got {:.2}",
            result.estimated_bpm
        );
        assert!((estimate_bpm_from_beats(&result.beat_times()) - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_offset_spikes_are_tracked() {
        let model = build_model(&beat_config()).unwrap();
        let activations = ActivationSequence::from_beats(beat_spikes(600, 45, 17), 100.0).unwrap();

        let result = decode(&model, &activations).unwrap();
        let frames: Vec<usize> = result.beats.iter().map(|b| b.frame).collect();
        let expected: Vec<usize> = (17..600).step_by(45).collect();
        assert_eq!(frames, expected);
        assert!((result.estimated_bpm - 6000.0 / 45.0).abs() < 1.0);
    }

    #[test]
    fn test_all_zero_activations_decode() {
        let model = build_model(&beat_config()).unwrap();
        let activations = ActivationSequence::from_beats(vec![0.0; 500], 100.0).unwrap();

        let path = decode_path(&model, &activations).expect("zero activations are valid input");
        assert_eq!(path.len(), 500);
        assert!(path.log_probability.is_finite());

        let result = decode(&model, &activations).unwrap();
        assert!(result.estimated_bpm >= 100.0 - 3.0 && result.estimated_bpm <= 140.0 + 3.0);
    }

    #[test]
    fn test_out_of_range_activations_do_not_crash() {
        let model = build_model(&beat_config()).unwrap();
        let values: Vec<f32> = (0..400)
            .map(|t| match t % 7 {
                0 => -2.0,
                1 => 3.5,
                2 => f32::NAN,
                _ => 0.5,
            })
            .collect();
        let activations = ActivationSequence::from_beats(values, 100.0).unwrap();
        let path = decode_path(&model, &activations).unwrap();
        assert_eq!(path.len(), 400);
    }

    #[test]
    fn test_inverted_bpm_range_is_invalid() {
        let config = TrackerConfig::beats().with_bpm_range(200.0, 100.0);
        assert!(matches!(
            build_model(&config),
            Err(DecodeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let model = build_model(&beat_config()).unwrap();
        let activations = ActivationSequence::from_beats(vec![], 100.0).unwrap();
        assert_eq!(
            decode(&model, &activations),
            Err(DecodeError::EmptyActivationSequence)
        );
    }

    #[test]
    fn test_path_length_and_monotonic_timestamps() {
        let model = build_model(&beat_config()).unwrap();
        for len in [1usize, 2, 37, 333] {
            let values: Vec<f32> = (0..len).map(|t| ((t * 7919) % 100) as f32 / 100.0).collect();
            let activations = ActivationSequence::from_beats(values, 100.0).unwrap();

            let path = decode_path(&model, &activations).unwrap();
            assert_eq!(path.len(), len);

            let result = decode(&model, &activations).unwrap();
            let times = result.beat_times();
            assert!(times.iter().all(|&t| t >= 0.0));
            assert!(times.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let model = build_model(&downbeat_config()).unwrap();
        let activations = bar_spikes(800, 50, 4);
        let first = decode(&model, &activations).unwrap();
        let second = decode(&model, &activations).unwrap();
        assert_eq!(first, second);

        let path_a = decode_path(&model, &activations).unwrap();
        let path_b = decode_path(&model, &activations).unwrap();
        assert_eq!(path_a, path_b);
    }

    #[test]
    fn test_path_tempi_within_bpm_range() {
        let config = beat_config();
        let model = build_model(&config).unwrap();
        let activations = ActivationSequence::from_beats(beat_spikes(900, 47, 5), 100.0).unwrap();
        let path = decode_path(&model, &activations).unwrap();

        for &state in &path.states {
            let interval = model.state_space().interval(state) as f32;
            let bpm = 60.0 * config.fps / interval;
            // integer intervals are at most half a frame off the exact range
            let lo = 60.0 * config.fps / (60.0 * config.fps / config.min_bpm + 0.5);
            let hi = 60.0 * config.fps / (60.0 * config.fps / config.max_bpm - 0.5);
            assert!(bpm >= lo && bpm <= hi, "{} BPM outside [{}, {}]", bpm, lo, hi);
        }
    }

    #[test]
    fn test_downbeats_in_four_four() {
        let model = build_model(&downbeat_config()).unwrap();
        let activations = bar_spikes(1200, 50, 4);

        let result = decode(&model, &activations).unwrap();
        assert_eq!(result.mode, Mode::Downbeats);
        assert_eq!(result.beats_per_bar, Some(4));
        assert_eq!(result.beat_count, 24);
        assert_eq!(result.bar_count, 6);
        assert_eq!(result.downbeat_times(), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!((result.estimated_bpm - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_downbeats_in_three_four() {
        let model = build_model(&downbeat_config()).unwrap();
        let activations = bar_spikes(900, 50, 3);

        let result = decode(&model, &activations).unwrap();
        assert_eq!(result.beats_per_bar, Some(3));
        assert_eq!(result.bar_count, 6);
        let numbers: Vec<u32> = result.beats.iter().map(|b| b.beat_number).collect();
        assert_eq!(&numbers[..6], &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_downbeats_are_subset_of_beats() {
        let model = build_model(&downbeat_config()).unwrap();
        let activations = bar_spikes(1000, 50, 4);
        let result = decode(&model, &activations).unwrap();

        let beats = result.beat_times();
        for downbeat in result.downbeat_times() {
            assert!(beats.contains(&downbeat));
        }

        // consecutive downbeats are exactly one bar apart in beats
        let bpb = result.beats_per_bar.unwrap() as usize;
        let positions: Vec<usize> = result
            .beats
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_downbeat)
            .map(|(i, _)| i)
            .collect();
        for pair in positions.windows(2) {
            assert_eq!(pair[1] - pair[0], bpb);
        }
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let model = build_model(&downbeat_config()).unwrap();
        let activations = ActivationSequence::from_beats(beat_spikes(200, 50, 0), 100.0).unwrap();
        assert!(matches!(
            decode(&model, &activations),
            Err(DecodeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cancellation() {
        let model = build_model(&beat_config()).unwrap();
        let activations = ActivationSequence::from_beats(beat_spikes(300, 50, 0), 100.0).unwrap();

        let cancel = AtomicBool::new(true);
        assert_eq!(
            decode_with_cancel(&model, &activations, &cancel),
            Err(DecodeError::Cancelled)
        );

        let cancel = AtomicBool::new(false);
        let result = decode_with_cancel(&model, &activations, &cancel).unwrap();
        assert_eq!(result, decode(&model, &activations).unwrap());
    }

    #[test]
    fn test_shared_model_across_threads() {
        let cache = ModelCache::new();
        let model = cache.get_or_build(&beat_config()).unwrap();

        let handles: Vec<_> = [50usize, 45, 55]
            .into_iter()
            .map(|period| {
                let model = Arc::clone(&model);
                thread::spawn(move || {
                    let activations =
                        ActivationSequence::from_beats(beat_spikes(600, period, 0), 100.0).unwrap();
                    decode(&model, &activations).unwrap()
                })
            })
            .collect();

        for (handle, period) in handles.into_iter().zip([50.0f32, 45.0, 55.0]) {
            let result = handle.join().expect("decode thread panicked");
            assert!((result.estimated_bpm - 6000.0 / period).abs() < 1.5);
        }
    }

    #[test]
    fn test_json_activations_to_json_result() {
        let json = serde_json::json!({
            "fps": 100,
            "beat": beat_spikes(400, 50, 0),
        })
        .to_string();
        let activations = ActivationSequence::from_json_reader(json.as_bytes()).unwrap();

        let model = build_model(&beat_config()).unwrap();
        let result = decode(&model, &activations).unwrap();
        let output = serde_json::to_value(&result).unwrap();

        assert_eq!(output["beat_count"], 8);
        assert_eq!(output["beats"].as_array().unwrap().len(), 8);
        assert_eq!(output["beats"][1]["time_seconds"], 0.5);
    }
}
