//! Example: Decode many activation files in parallel
//!
//! Usage:
//!   cargo run --release --example decode_batch -- [--jobs N] [--json] [--downbeats] <file1> <file2> ...
//!
//! Notes:
//! - Parallelism is across files (batch-level). Each decode is still single-threaded.
//! - All files share one cached model per frame rate.
//! - Default workers: (available CPU threads - 1), keeping one core free for the system.

use rayon::prelude::*;
use stratum_beats::{decode, ActivationSequence, DecodeResult, ModelCache, TrackerConfig};
use std::env;
use std::time::Instant;

fn default_jobs() -> usize {
    let n = std::thread::available_parallelism().map(|v| v.get()).unwrap_or(1);
    std::cmp::max(1, n.saturating_sub(1))
}

fn decode_one(
    cache: &ModelCache,
    base: &TrackerConfig,
    path: &str,
) -> Result<DecodeResult, Box<dyn std::error::Error + Send + Sync>> {
    let activations = ActivationSequence::from_json_file(path)?;
    let config = TrackerConfig {
        fps: activations.fps(),
        ..base.clone()
    };
    let model = cache.get_or_build(&config)?;
    Ok(decode(&model, &activations)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut json = false;
    let mut downbeats = false;
    let mut jobs: Option<usize> = None;
    let mut paths: Vec<String> = Vec::new();

    while let Some(a) = args.first().cloned() {
        args.remove(0);
        match a.as_str() {
            "--json" => json = true,
            "--downbeats" => downbeats = true,
            "--jobs" => {
                let v = args
                    .first()
                    .ok_or("--jobs requires a value")?
                    .parse::<usize>()?;
                args.remove(0);
                jobs = Some(std::cmp::max(1, v));
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: decode_batch [--jobs N] [--json] [--downbeats] <file1> <file2> ...\n\
                     \n\
                     --jobs N      Parallel workers (default: CPU-1)\n\
                     --json        Emit one JSON object per line (JSONL)\n\
                     --downbeats   Decode beats and downbeats\n"
                );
                return Ok(());
            }
            _ => paths.push(a),
        }
    }

    if paths.is_empty() {
        eprintln!("ERROR: Provide at least one activation file path. Use --help for usage.");
        std::process::exit(2);
    }

    let jobs = jobs.unwrap_or_else(default_jobs);
    eprintln!("Batch: {} files, jobs={}", paths.len(), jobs);

    let base = if downbeats {
        TrackerConfig::downbeats()
    } else {
        TrackerConfig::beats()
    };
    let cache = ModelCache::new();

    let t0 = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let outs: Vec<(String, Result<DecodeResult, String>)> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result = decode_one(&cache, &base, path).map_err(|e| e.to_string());
                (path.clone(), result)
            })
            .collect()
    });

    let mut failed = 0usize;
    for (path, result) in &outs {
        match result {
            Ok(result) if json => {
                let line = serde_json::json!({ "path": path, "ok": true, "result": result });
                println!("{}", line);
            }
            Ok(result) => {
                println!(
                    "{}: {} beats, {} bars, {:.1} BPM",
                    path, result.beat_count, result.bar_count, result.estimated_bpm
                );
            }
            Err(e) => {
                failed += 1;
                if json {
                    println!("{}", serde_json::json!({ "path": path, "ok": false, "error": e }));
                } else {
                    eprintln!("{}: ERROR {}", path, e);
                }
            }
        }
    }

    eprintln!(
        "Done: {} ok, {} failed, {} models built, {:.2} s",
        outs.len() - failed,
        failed,
        cache.len(),
        t0.elapsed().as_secs_f32()
    );

    Ok(())
}
