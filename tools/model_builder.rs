/// Model Builder — trains transition matrices, stay-length histograms,
/// first-chord tables, and mode stats from a labeled corpus.
///
/// Usage: model_builder --input <corpus.ron> --output <bundle.ron>
///                      [--tau <f64>] [--self-transitions keep|exclude|clip:<cap>]
///                      [--alphabet per-group|shared]
use std::env;
use std::path::Path;
use std::process;

use progression_engine::core::bundle::{load_corpus, save_bundle, ModelBundle};
use progression_engine::core::matrix::{AlphabetPolicy, BuildConfig, SelfTransitionPolicy};

const USAGE: &str = "Usage: model_builder --input <corpus.ron> --output <bundle.ron> \
[--tau <f64>] [--self-transitions keep|exclude|clip:<cap>] [--alphabet per-group|shared]";

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut output = None;
    let mut config = BuildConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = Some(args[i].clone());
            }
            "--output" => {
                i += 1;
                output = Some(args[i].clone());
            }
            "--tau" => {
                i += 1;
                config.tau = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --tau must be a non-negative number");
                    process::exit(1);
                });
                if config.tau < 0.0 {
                    eprintln!("Error: --tau must be a non-negative number");
                    process::exit(1);
                }
            }
            "--self-transitions" => {
                i += 1;
                config.self_transitions = parse_self_transitions(&args[i]).unwrap_or_else(|| {
                    eprintln!(
                        "Error: --self-transitions must be keep, exclude, or clip:<cap in (0,1)>"
                    );
                    process::exit(1);
                });
            }
            "--alphabet" => {
                i += 1;
                config.alphabet = match args[i].as_str() {
                    "per-group" => AlphabetPolicy::PerGroup,
                    "shared" => AlphabetPolicy::Shared,
                    _ => {
                        eprintln!("Error: --alphabet must be per-group or shared");
                        process::exit(1);
                    }
                };
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

    let input_path = input.unwrap_or_else(|| {
        eprintln!("Error: --input is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let output_path = output.unwrap_or_else(|| {
        eprintln!("Error: --output is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let sheets = load_corpus(Path::new(&input_path)).unwrap_or_else(|e| {
        eprintln!("Error reading corpus '{}': {}", input_path, e);
        process::exit(1);
    });

    println!(
        "Training from '{}' ({} lead sheets, tau = {})...",
        input_path,
        sheets.len(),
        config.tau
    );
    let bundle = ModelBundle::train(&sheets, config);

    let mut groups: Vec<String> = bundle
        .matrices
        .iter()
        .map(|(group, matrix)| format!("{} ({} chords)", group, matrix.len()))
        .collect();
    groups.sort();
    println!("Matrices built: {}", groups.join(", "));
    println!(
        "Stay histograms: {} chords",
        bundle.stay_lengths.chords().count()
    );

    save_bundle(&bundle, Path::new(&output_path)).unwrap_or_else(|e| {
        eprintln!("Error writing bundle '{}': {}", output_path, e);
        process::exit(1);
    });
    println!("Bundle saved to '{}'", output_path);
}

fn parse_self_transitions(arg: &str) -> Option<SelfTransitionPolicy> {
    match arg {
        "keep" => Some(SelfTransitionPolicy::Keep),
        "exclude" => Some(SelfTransitionPolicy::Exclude),
        _ => {
            let cap: f64 = arg.strip_prefix("clip:")?.parse().ok()?;
            if cap > 0.0 && cap < 1.0 {
                Some(SelfTransitionPolicy::Clip(cap))
            } else {
                None
            }
        }
    }
}
