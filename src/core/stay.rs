/// Stay-length statistics — how many consecutive bars a chord persists.
///
/// Trained corpus-wide rather than per (quadrant, mode) group: most
/// chords are too sparse for conditioned run-length histograms.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::schema::chord::is_valid_chord;

/// Per-chord probability distribution over run lengths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StayLengthModel {
    /// chord -> (run length, probability) sorted by length; each list
    /// sums to 1 over the lengths present.
    histograms: FxHashMap<String, Vec<(u32, f64)>>,
}

impl StayLengthModel {
    /// Run-length encode each bar sequence and normalize the per-chord
    /// run counts into distributions. An empty sequence contributes no
    /// runs; a single-symbol sequence contributes one run of length 1.
    pub fn train<S: AsRef<str>>(sequences: &[Vec<S>]) -> StayLengthModel {
        let mut counts: FxHashMap<String, FxHashMap<u32, u32>> = FxHashMap::default();
        for sequence in sequences {
            for (chord, length) in run_lengths(sequence) {
                *counts
                    .entry(chord.to_string())
                    .or_default()
                    .entry(length)
                    .or_insert(0) += 1;
            }
        }

        let mut histograms = FxHashMap::default();
        for (chord, runs) in counts {
            let total: u32 = runs.values().sum();
            let mut pairs: Vec<(u32, f64)> = runs
                .into_iter()
                .map(|(length, count)| (length, f64::from(count) / f64::from(total)))
                .collect();
            pairs.sort_unstable_by_key(|&(length, _)| length);
            histograms.insert(chord, pairs);
        }
        StayLengthModel { histograms }
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn chords(&self) -> impl Iterator<Item = &str> {
        self.histograms.keys().map(String::as_str)
    }

    /// The trained distribution for a chord, if any runs were observed.
    pub fn distribution(&self, chord: &str) -> Option<&[(u32, f64)]> {
        self.histograms.get(chord).map(Vec::as_slice)
    }

    /// Draw a stay length for `chord`, clamped to `[1, max_stay]`.
    /// Chords with no histogram stay for a single bar.
    pub fn sample_stay(&self, chord: &str, max_stay: u32, rng: &mut StdRng) -> u32 {
        let Some(pairs) = self.histograms.get(chord) else {
            return 1;
        };
        let weights: Vec<f64> = pairs.iter().map(|&(_, p)| p).collect();
        let Ok(dist) = WeightedIndex::new(&weights) else {
            return 1;
        };
        let length = pairs[dist.sample(rng)].0;
        length.clamp(1, max_stay.max(1))
    }
}

/// Run-length encode a bar sequence, skipping sentinel entries.
fn run_lengths<S: AsRef<str>>(sequence: &[S]) -> Vec<(&str, u32)> {
    let mut valid = sequence
        .iter()
        .map(|s| s.as_ref())
        .filter(|c| is_valid_chord(c));
    let mut runs = Vec::new();
    let Some(first) = valid.next() else {
        return runs;
    };
    let (mut current, mut length) = (first, 1u32);
    for chord in valid {
        if chord == current {
            length += 1;
        } else {
            runs.push((current, length));
            current = chord;
            length = 1;
        }
    }
    runs.push((current, length));
    runs
}
