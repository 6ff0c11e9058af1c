/// Preview — generates one progression from a trained bundle and prints
/// it to stdout.
///
/// Usage: preview --bundle <bundle.ron> --quadrant <Q1-Q4>
///                [--bars <n>] [--temperature <f64>] [--max-stay <n>]
///                [--start <chord>] [--seed <u64>]
use std::env;
use std::process;

use progression_engine::core::engine::{GenerationRequest, ProgressionEngine};
use progression_engine::schema::chord::Quadrant;

const USAGE: &str = "Usage: preview --bundle <bundle.ron> --quadrant <Q1-Q4> \
[--bars <n>] [--temperature <f64>] [--max-stay <n>] [--start <chord>] [--seed <u64>]";

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut bundle_path = None;
    let mut quadrant = None;
    let mut request_bars = 16usize;
    let mut temperature = 1.0f64;
    let mut max_stay = 4u32;
    let mut start_chord = None;
    let mut seed = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bundle" => {
                i += 1;
                bundle_path = Some(args[i].clone());
            }
            "--quadrant" => {
                i += 1;
                quadrant = Some(args[i].parse::<Quadrant>().unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }));
            }
            "--bars" => {
                i += 1;
                request_bars = parse_or_exit(&args[i], "--bars");
            }
            "--temperature" => {
                i += 1;
                temperature = parse_or_exit(&args[i], "--temperature");
            }
            "--max-stay" => {
                i += 1;
                max_stay = parse_or_exit(&args[i], "--max-stay");
            }
            "--start" => {
                i += 1;
                start_chord = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                seed = Some(parse_or_exit(&args[i], "--seed"));
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let bundle_path = bundle_path.unwrap_or_else(|| {
        eprintln!("Error: --bundle is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });
    let quadrant = quadrant.unwrap_or_else(|| {
        eprintln!("Error: --quadrant is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let engine = ProgressionEngine::builder()
        .bundle_path(&bundle_path)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error loading bundle '{}': {}", bundle_path, e);
            process::exit(1);
        });

    let mut request = GenerationRequest::new(quadrant);
    request.bars = request_bars;
    request.temperature = temperature;
    request.max_stay = max_stay;
    request.start_chord = start_chord;
    request.seed = seed;

    match engine.generate(&request) {
        Ok(progression) => {
            println!("{} {}:", progression.quadrant, progression.mode);
            println!("{}", progression.chords.join(" | "));
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn parse_or_exit<T: std::str::FromStr>(arg: &str, flag: &str) -> T {
    arg.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: '{}'", flag, arg);
        process::exit(1);
    })
}
