//! Example: Decode beats from one activation file
//!
//! Usage:
//!   cargo run --release --example decode_file -- [--mode beats|downbeats]
//!       [--min-bpm X] [--max-bpm X] [--beats-per-bar 3,4] [--correct] <activations.json>
//!
//! The activation file holds `{"fps": 100, "beat": [...], "downbeat": [...]}`;
//! `downbeat` is only needed in downbeat mode. The result is printed as JSON.

use stratum_beats::config::parse_beats_per_bar;
use stratum_beats::{build_model, decode, ActivationSequence, Mode, TrackerConfig};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config = TrackerConfig::beats();
    let mut mode: Option<Mode> = None;
    let mut beats_per_bar: Option<Vec<u32>> = None;
    let mut path: Option<String> = None;

    while let Some(a) = args.first().cloned() {
        args.remove(0);
        let mut value = |flag: &str| -> Result<String, String> {
            if args.is_empty() {
                return Err(format!("{} requires a value", flag));
            }
            Ok(args.remove(0))
        };
        match a.as_str() {
            "--mode" => mode = Some(value("--mode")?.parse()?),
            "--min-bpm" => config.min_bpm = value("--min-bpm")?.parse()?,
            "--max-bpm" => config.max_bpm = value("--max-bpm")?.parse()?,
            "--beats-per-bar" => {
                beats_per_bar = Some(parse_beats_per_bar(&value("--beats-per-bar")?)?)
            }
            "--correct" => config.correct = true,
            "--help" | "-h" => {
                eprintln!(
                    "Usage: decode_file [--mode beats|downbeats] [--min-bpm X] [--max-bpm X]\n\
                     \x20                  [--beats-per-bar 3,4] [--correct] <activations.json>\n"
                );
                return Ok(());
            }
            _ => path = Some(a),
        }
    }

    let Some(path) = path else {
        eprintln!("ERROR: Provide an activation file. Use --help for usage.");
        std::process::exit(2);
    };

    if let Some(mode) = mode {
        config.mode = mode;
    }
    if let Some(beats_per_bar) = beats_per_bar {
        config.beats_per_bar = beats_per_bar;
    }

    let activations = ActivationSequence::from_json_file(&path)?;
    config.fps = activations.fps();

    let model = build_model(&config)?;
    let result = decode(&model, &activations)?;

    eprintln!(
        "{}: {} beats, {} bars, {:.1} BPM",
        path, result.beat_count, result.bar_count, result.estimated_bpm
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
