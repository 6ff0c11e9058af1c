/// Bundle Linter — validates a trained model bundle's invariants.
///
/// Usage: bundle_lint <bundle.ron>
///
/// Checks that every matrix row is stochastic, every stay histogram
/// sums to 1, mode stats sum to 1 per quadrant, and no sentinel token
/// leaked into any alphabet or table.
use std::path::Path;
use std::process;

use progression_engine::core::bundle::{load_bundle, ModelBundle};
use progression_engine::core::matrix::ROW_SUM_TOLERANCE;
use progression_engine::schema::chord::{is_valid_chord, Quadrant};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        println!("Usage: bundle_lint <bundle.ron>");
        process::exit(0);
    }
    if args.len() < 2 {
        eprintln!("ERROR: Missing required argument: <bundle.ron>");
        eprintln!("Usage: bundle_lint <bundle.ron>");
        process::exit(1);
    }

    let bundle = match load_bundle(Path::new(&args[1])) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("ERROR: Failed to load bundle: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded bundle: {} matrices, {} stay histograms",
        bundle.matrices.len(),
        bundle.stay_lengths.chords().count()
    );

    let errors = lint_bundle(&bundle);

    println!("\n=== Bundle Lint Report ===\n");
    if errors.is_empty() {
        println!("All checks passed!");
        return;
    }
    for error in &errors {
        println!("ERROR: {}", error);
    }
    println!("\n{} error(s) found", errors.len());
    process::exit(1);
}

fn lint_bundle(bundle: &ModelBundle) -> Vec<String> {
    let mut errors = Vec::new();

    for (group, matrix) in &bundle.matrices {
        for chord in matrix.alphabet() {
            if !is_valid_chord(chord) {
                errors.push(format!("{}: sentinel token '{}' in alphabet", group, chord));
            }
        }
        for i in 0..matrix.len() {
            let sum: f64 = matrix.row(i).iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                errors.push(format!(
                    "{}: row '{}' sums to {} (expected 1.0)",
                    group,
                    matrix.chord(i),
                    sum
                ));
            }
            if matrix.row(i).iter().any(|&p| p < 0.0) {
                errors.push(format!(
                    "{}: row '{}' has a negative probability",
                    group,
                    matrix.chord(i)
                ));
            }
        }
    }

    for chord in bundle.stay_lengths.chords() {
        if !is_valid_chord(chord) {
            errors.push(format!("stay histogram for sentinel token '{}'", chord));
            continue;
        }
        let Some(distribution) = bundle.stay_lengths.distribution(chord) else {
            continue;
        };
        let sum: f64 = distribution.iter().map(|&(_, p)| p).sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            errors.push(format!(
                "stay histogram for '{}' sums to {} (expected 1.0)",
                chord, sum
            ));
        }
        if distribution.iter().any(|&(length, _)| length == 0) {
            errors.push(format!("stay histogram for '{}' has a zero-length run", chord));
        }
    }

    for quadrant in Quadrant::ALL {
        let ratio = bundle.mode_stats.ratio(quadrant);
        if (ratio.major + ratio.minor - 1.0).abs() > 1e-9 {
            errors.push(format!(
                "{}: mode ratios sum to {} (expected 1.0)",
                quadrant,
                ratio.major + ratio.minor
            ));
        }
    }

    for group in bundle.matrices.keys() {
        if let Some(table) = bundle.first_chords.group(*group) {
            let sum: f64 = table.values().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                errors.push(format!(
                    "{}: first-chord table sums to {} (expected 1.0)",
                    group, sum
                ));
            }
            for chord in table.keys() {
                if !is_valid_chord(chord) {
                    errors.push(format!(
                        "{}: sentinel token '{}' in first-chord table",
                        group, chord
                    ));
                }
            }
        }
    }

    errors
}
