/// Mode choice and first-chord choice — the statistics that seed a run.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::chord::{is_valid_chord, GroupKey, Mode, Quadrant};
use crate::schema::corpus::LeadSheet;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("forced first chord '{0}' is not a valid member of the group's alphabet")]
    ForcedChordUnknown(String),
    #[error("alphabet has no valid chords to choose from")]
    EmptyAlphabet,
}

/// Major/minor share of one quadrant's corpus coverage. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeRatio {
    pub major: f64,
    pub minor: f64,
}

/// Per-quadrant mode balance, from relative lead-sheet counts.
///
/// A quadrant covered by only one mode degrades to a deterministic
/// choice of that mode; a quadrant with no coverage at all is an even
/// split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeStats {
    ratios: FxHashMap<Quadrant, ModeRatio>,
}

impl ModeStats {
    pub fn train(sheets: &[LeadSheet]) -> ModeStats {
        let mut counts: FxHashMap<Quadrant, (u32, u32)> = FxHashMap::default();
        for sheet in sheets {
            let entry = counts.entry(sheet.quadrant).or_insert((0, 0));
            match sheet.mode {
                Mode::Major => entry.0 += 1,
                Mode::Minor => entry.1 += 1,
            }
        }

        let mut ratios = FxHashMap::default();
        for quadrant in Quadrant::ALL {
            let (major, minor) = counts.get(&quadrant).copied().unwrap_or((0, 0));
            let total = major + minor;
            let ratio = if total == 0 {
                ModeRatio {
                    major: 0.5,
                    minor: 0.5,
                }
            } else {
                ModeRatio {
                    major: f64::from(major) / f64::from(total),
                    minor: f64::from(minor) / f64::from(total),
                }
            };
            ratios.insert(quadrant, ratio);
        }
        ModeStats { ratios }
    }

    pub fn ratio(&self, quadrant: Quadrant) -> ModeRatio {
        self.ratios.get(&quadrant).copied().unwrap_or(ModeRatio {
            major: 0.5,
            minor: 0.5,
        })
    }

    /// Bernoulli draw on the quadrant's major share.
    pub fn choose_mode(&self, quadrant: Quadrant, rng: &mut StdRng) -> Mode {
        let p_major = self.ratio(quadrant).major.clamp(0.0, 1.0);
        if rng.gen_bool(p_major) {
            Mode::Major
        } else {
            Mode::Minor
        }
    }
}

/// Opening-chord distribution per (quadrant, mode) group, from the first
/// resolvable chord of each lead sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirstChordModel {
    probs: FxHashMap<GroupKey, FxHashMap<String, f64>>,
}

impl FirstChordModel {
    pub fn train(sheets: &[LeadSheet]) -> FirstChordModel {
        let mut counts: FxHashMap<GroupKey, FxHashMap<String, u32>> = FxHashMap::default();
        for sheet in sheets {
            if let Some(first) = sheet.first_chord() {
                *counts
                    .entry(sheet.group())
                    .or_default()
                    .entry(first.to_string())
                    .or_insert(0) += 1;
            }
        }

        let mut probs = FxHashMap::default();
        for (group, chord_counts) in counts {
            let total: u32 = chord_counts.values().sum();
            let table: FxHashMap<String, f64> = chord_counts
                .into_iter()
                .map(|(chord, count)| (chord, f64::from(count) / f64::from(total)))
                .collect();
            probs.insert(group, table);
        }
        FirstChordModel { probs }
    }

    /// The trained opening distribution for a group, if any.
    pub fn group(&self, group: GroupKey) -> Option<&FxHashMap<String, f64>> {
        self.probs.get(&group)
    }

    /// Choose the opening chord for a run.
    ///
    /// A caller-forced chord wins unchanged when it is a valid member of
    /// `alphabet`; a forced chord that is invalid or absent is a
    /// configuration error, surfaced before generation starts. Without a
    /// forced chord, the group's opening distribution restricted to
    /// `alphabet` is drawn from; zero restricted mass falls back to a
    /// uniform draw over the alphabet's valid chords.
    pub fn choose_first(
        &self,
        group: GroupKey,
        alphabet: &[String],
        forced: Option<&str>,
        rng: &mut StdRng,
    ) -> Result<String, SelectError> {
        if let Some(forced) = forced {
            if is_valid_chord(forced) && alphabet.iter().any(|c| c == forced) {
                return Ok(forced.to_string());
            }
            return Err(SelectError::ForcedChordUnknown(forced.to_string()));
        }

        let candidates: Vec<&String> = alphabet
            .iter()
            .filter(|c| is_valid_chord(c))
            .collect();
        if candidates.is_empty() {
            return Err(SelectError::EmptyAlphabet);
        }

        let table = self.probs.get(&group);
        let weights: Vec<f64> = candidates
            .iter()
            .map(|chord| {
                table
                    .and_then(|t| t.get(chord.as_str()))
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect();

        let total: f64 = weights.iter().sum();
        let pick = if total > 0.0 {
            match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..candidates.len()),
            }
        } else {
            rng.gen_range(0..candidates.len())
        };
        Ok(candidates[pick].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::chord::INVALID_CHORD;
    use rand::SeedableRng;

    fn sheet(quadrant: Quadrant, mode: Mode, chords: &[&str]) -> LeadSheet {
        LeadSheet {
            id: format!("{}_{}", quadrant, mode),
            quadrant,
            mode,
            chords: chords.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn mode_ratios_sum_to_one() {
        let sheets = vec![
            sheet(Quadrant::Q1, Mode::Major, &["I"]),
            sheet(Quadrant::Q1, Mode::Major, &["IV"]),
            sheet(Quadrant::Q1, Mode::Minor, &["I"]),
            sheet(Quadrant::Q3, Mode::Minor, &["I"]),
        ];
        let stats = ModeStats::train(&sheets);
        for quadrant in Quadrant::ALL {
            let ratio = stats.ratio(quadrant);
            assert!((ratio.major + ratio.minor - 1.0).abs() < 1e-9);
        }
        assert!((stats.ratio(Quadrant::Q1).major - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_mode_coverage_is_deterministic() {
        let sheets = vec![
            sheet(Quadrant::Q3, Mode::Minor, &["I"]),
            sheet(Quadrant::Q3, Mode::Minor, &["IV"]),
        ];
        let stats = ModeStats::train(&sheets);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..32 {
            assert_eq!(stats.choose_mode(Quadrant::Q3, &mut rng), Mode::Minor);
        }
    }

    #[test]
    fn uncovered_quadrant_is_even_split() {
        let stats = ModeStats::train(&[]);
        let ratio = stats.ratio(Quadrant::Q2);
        assert_eq!(ratio.major, 0.5);
        assert_eq!(ratio.minor, 0.5);
    }

    #[test]
    fn choose_mode_is_deterministic_per_seed() {
        let sheets = vec![
            sheet(Quadrant::Q1, Mode::Major, &["I"]),
            sheet(Quadrant::Q1, Mode::Minor, &["I"]),
        ];
        let stats = ModeStats::train(&sheets);
        let mut rng1 = StdRng::seed_from_u64(9);
        let mut rng2 = StdRng::seed_from_u64(9);
        for _ in 0..16 {
            assert_eq!(
                stats.choose_mode(Quadrant::Q1, &mut rng1),
                stats.choose_mode(Quadrant::Q1, &mut rng2)
            );
        }
    }

    #[test]
    fn first_chord_model_normalizes_per_group() {
        let sheets = vec![
            sheet(Quadrant::Q1, Mode::Major, &["I", "IV"]),
            sheet(Quadrant::Q1, Mode::Major, &["I", "V"]),
            sheet(Quadrant::Q1, Mode::Major, &["IV", "I"]),
            sheet(Quadrant::Q1, Mode::Major, &[INVALID_CHORD, "V"]),
        ];
        let model = FirstChordModel::train(&sheets);
        let table = model.group(GroupKey::new(Quadrant::Q1, Mode::Major)).unwrap();
        assert!((table["I"] - 0.5).abs() < 1e-12);
        assert!((table["IV"] - 0.25).abs() < 1e-12);
        // The sentinel opener is skipped; "V" counts instead.
        assert!((table["V"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn forced_chord_wins_when_in_alphabet() {
        let model = FirstChordModel::default();
        let alphabet = vec!["I".to_string(), "IV".to_string()];
        let mut rng = StdRng::seed_from_u64(3);
        let chosen = model
            .choose_first(
                GroupKey::new(Quadrant::Q1, Mode::Major),
                &alphabet,
                Some("IV"),
                &mut rng,
            )
            .unwrap();
        assert_eq!(chosen, "IV");
    }

    #[test]
    fn forced_chord_outside_alphabet_is_rejected() {
        let model = FirstChordModel::default();
        let alphabet = vec!["I".to_string(), "IV".to_string()];
        let mut rng = StdRng::seed_from_u64(3);
        let group = GroupKey::new(Quadrant::Q1, Mode::Major);
        assert!(matches!(
            model.choose_first(group, &alphabet, Some("VIIb"), &mut rng),
            Err(SelectError::ForcedChordUnknown(_))
        ));
        assert!(matches!(
            model.choose_first(group, &alphabet, Some(INVALID_CHORD), &mut rng),
            Err(SelectError::ForcedChordUnknown(_))
        ));
    }

    #[test]
    fn zero_mass_falls_back_to_uniform_over_alphabet() {
        // Model trained on a different group: the restricted distribution
        // has no mass, so every valid alphabet member must be reachable.
        let sheets = vec![sheet(Quadrant::Q2, Mode::Minor, &["I"])];
        let model = FirstChordModel::train(&sheets);
        let alphabet = vec!["I".to_string(), "IV".to_string(), "V".to_string()];
        let group = GroupKey::new(Quadrant::Q1, Mode::Major);

        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(
                model
                    .choose_first(group, &alphabet, None, &mut rng)
                    .unwrap(),
            );
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn sentinel_alphabet_entries_are_never_chosen() {
        let model = FirstChordModel::default();
        let alphabet = vec![INVALID_CHORD.to_string(), "I".to_string()];
        let group = GroupKey::new(Quadrant::Q1, Mode::Major);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let chosen = model.choose_first(group, &alphabet, None, &mut rng).unwrap();
            assert_eq!(chosen, "I");
        }
    }

    #[test]
    fn empty_alphabet_is_an_error() {
        let model = FirstChordModel::default();
        let alphabet = vec![INVALID_CHORD.to_string()];
        let group = GroupKey::new(Quadrant::Q1, Mode::Major);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            model.choose_first(group, &alphabet, None, &mut rng),
            Err(SelectError::EmptyAlphabet)
        ));
    }
}
