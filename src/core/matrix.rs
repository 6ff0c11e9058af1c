/// Transition matrix construction — counting, additive smoothing,
/// self-transition policy, and row normalization.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::schema::chord::{is_valid_chord, GroupKey};
use crate::schema::corpus::LeadSheet;

/// Tolerance for the row-stochastic invariant.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// How diagonal (chord-to-itself) mass is treated when building a matrix.
///
/// The generator resolves "staying" exclusively through the stay-length
/// model and zeroes the diagonal at sampling time regardless; the policy
/// here controls what the persisted rows look like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelfTransitionPolicy {
    /// Keep whatever mass counting and smoothing produced.
    Keep,
    /// Zero the diagonal after smoothing, before normalization.
    Exclude,
    /// Cap each diagonal probability after normalization, redistributing
    /// the excess uniformly over the row's other cells. Softer than
    /// `Exclude`: a chord can still be sticky, just not arbitrarily so.
    Clip(f64),
}

/// Which alphabet each (quadrant, mode) matrix is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphabetPolicy {
    /// Each group is restricted to the chords observed in that group.
    PerGroup,
    /// Every group is padded to the union alphabet across all groups.
    /// Chords unseen in a group get a zero-mass row, which normalizes
    /// to uniform.
    Shared,
}

/// Builder configuration: smoothing constant plus the two policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Additive smoothing constant. Zero recovers raw maximum-likelihood
    /// estimates; positive values make every cell reachable.
    pub tau: f64,
    pub self_transitions: SelfTransitionPolicy,
    pub alphabet: AlphabetPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            tau: 0.4,
            self_transitions: SelfTransitionPolicy::Keep,
            alphabet: AlphabetPolicy::PerGroup,
        }
    }
}

/// One observed bar-to-bar transition in a labeled corpus item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionObservation {
    pub group: GroupKey,
    pub prev: String,
    pub next: String,
}

impl TransitionObservation {
    /// Collect adjacent-bar pairs from a corpus, pairing across dropped
    /// sentinel bars.
    pub fn from_sheets(sheets: &[LeadSheet]) -> Vec<TransitionObservation> {
        let mut observations = Vec::new();
        for sheet in sheets {
            let chords = sheet.valid_chords();
            for pair in chords.windows(2) {
                observations.push(TransitionObservation {
                    group: sheet.group(),
                    prev: pair[0].to_string(),
                    next: pair[1].to_string(),
                });
            }
        }
        observations
    }
}

/// A row-stochastic transition matrix over a sorted chord alphabet.
///
/// Every row sums to 1 within [`ROW_SUM_TOLERANCE`]; rows with no
/// observed mass are uniform. Immutable once built and shared read-only
/// across generation requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    alphabet: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    pub fn alphabet(&self) -> &[String] {
        &self.alphabet
    }

    pub fn len(&self) -> usize {
        self.alphabet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alphabet.is_empty()
    }

    /// Position of a chord in the (sorted) alphabet.
    pub fn index_of(&self, chord: &str) -> Option<usize> {
        self.alphabet
            .binary_search_by(|c| c.as_str().cmp(chord))
            .ok()
    }

    pub fn contains(&self, chord: &str) -> bool {
        self.index_of(chord).is_some()
    }

    pub fn chord(&self, index: usize) -> &str {
        &self.alphabet[index]
    }

    /// The outgoing probability row for the chord at `index`.
    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    /// Cap every diagonal probability at `cap`, spreading the excess
    /// uniformly over the row's other cells and renormalizing.
    ///
    /// A single-state row has nowhere to spread and is left untouched.
    pub fn clip_self_transitions(&mut self, cap: f64) {
        let n = self.alphabet.len();
        if n < 2 {
            return;
        }
        for (i, row) in self.rows.iter_mut().enumerate() {
            let p_self = row[i];
            if p_self <= cap {
                continue;
            }
            let share = (p_self - cap) / (n - 1) as f64;
            for (j, p) in row.iter_mut().enumerate() {
                if j == i {
                    *p = cap;
                } else {
                    *p += share;
                }
            }
            let total: f64 = row.iter().sum();
            for p in row.iter_mut() {
                *p /= total;
            }
        }
    }
}

/// Builds one smoothed row-stochastic matrix per (quadrant, mode) group.
pub struct MatrixBuilder {
    config: BuildConfig,
}

impl MatrixBuilder {
    pub fn new(config: BuildConfig) -> MatrixBuilder {
        MatrixBuilder { config }
    }

    /// Count, smooth, and normalize per group. Pairs touching a sentinel
    /// token are dropped before counting; a group with no surviving
    /// observations yields no matrix at all, which callers treat as
    /// "unavailable" rather than an error.
    pub fn build(
        &self,
        observations: &[TransitionObservation],
    ) -> FxHashMap<GroupKey, TransitionMatrix> {
        let mut counts: FxHashMap<GroupKey, FxHashMap<(String, String), u32>> =
            FxHashMap::default();
        let mut group_alphabets: FxHashMap<GroupKey, BTreeSet<String>> = FxHashMap::default();
        let mut union_alphabet: BTreeSet<String> = BTreeSet::new();

        for obs in observations {
            if !is_valid_chord(&obs.prev) || !is_valid_chord(&obs.next) {
                continue;
            }
            *counts
                .entry(obs.group)
                .or_default()
                .entry((obs.prev.clone(), obs.next.clone()))
                .or_insert(0) += 1;
            let alphabet = group_alphabets.entry(obs.group).or_default();
            alphabet.insert(obs.prev.clone());
            alphabet.insert(obs.next.clone());
            union_alphabet.insert(obs.prev.clone());
            union_alphabet.insert(obs.next.clone());
        }

        counts
            .into_iter()
            .map(|(group, pair_counts)| {
                let alphabet: Vec<String> = match self.config.alphabet {
                    AlphabetPolicy::PerGroup => {
                        group_alphabets[&group].iter().cloned().collect()
                    }
                    AlphabetPolicy::Shared => union_alphabet.iter().cloned().collect(),
                };
                (group, self.build_one(alphabet, &pair_counts))
            })
            .collect()
    }

    fn build_one(
        &self,
        alphabet: Vec<String>,
        pair_counts: &FxHashMap<(String, String), u32>,
    ) -> TransitionMatrix {
        let n = alphabet.len();
        let index: FxHashMap<&str, usize> = alphabet
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        // Smoothed counts: every cell starts at tau.
        let mut rows = vec![vec![self.config.tau; n]; n];
        for ((prev, next), count) in pair_counts {
            let (i, j) = (index[prev.as_str()], index[next.as_str()]);
            rows[i][j] += f64::from(*count);
        }

        if self.config.self_transitions == SelfTransitionPolicy::Exclude {
            for (i, row) in rows.iter_mut().enumerate() {
                row[i] = 0.0;
            }
        }

        normalize_rows(&mut rows);

        let mut matrix = TransitionMatrix { alphabet, rows };
        if let SelfTransitionPolicy::Clip(cap) = self.config.self_transitions {
            matrix.clip_self_transitions(cap);
        }
        matrix
    }
}

/// Row-normalize in place. Rows with no mass become uniform.
fn normalize_rows(rows: &mut [Vec<f64>]) {
    for row in rows.iter_mut() {
        let total: f64 = row.iter().sum();
        if total > 0.0 {
            for p in row.iter_mut() {
                *p /= total;
            }
        } else {
            let uniform = 1.0 / row.len() as f64;
            row.fill(uniform);
        }
    }
}
