/// Persisted model artifacts — training, serialization, and loading.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::matrix::{BuildConfig, MatrixBuilder, TransitionMatrix, TransitionObservation};
use crate::core::select::{FirstChordModel, ModeStats};
use crate::core::stay::StayLengthModel;
use crate::schema::chord::GroupKey;
use crate::schema::corpus::LeadSheet;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Everything the generation phase needs, in one serializable unit.
///
/// Built once per corpus update by the offline tooling, then loaded and
/// shared read-only across any number of generation requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelBundle {
    pub matrices: FxHashMap<GroupKey, TransitionMatrix>,
    pub stay_lengths: StayLengthModel,
    pub first_chords: FirstChordModel,
    pub mode_stats: ModeStats,
}

impl ModelBundle {
    /// Run every builder over a labeled corpus.
    pub fn train(sheets: &[LeadSheet], config: BuildConfig) -> ModelBundle {
        let observations = TransitionObservation::from_sheets(sheets);
        let matrices = MatrixBuilder::new(config).build(&observations);

        let sequences: Vec<Vec<&str>> = sheets.iter().map(|s| s.valid_chords()).collect();
        let stay_lengths = StayLengthModel::train(&sequences);

        ModelBundle {
            matrices,
            stay_lengths,
            first_chords: FirstChordModel::train(sheets),
            mode_stats: ModeStats::train(sheets),
        }
    }

    pub fn matrix(&self, group: GroupKey) -> Option<&TransitionMatrix> {
        self.matrices.get(&group)
    }
}

/// Save a ModelBundle to a RON file.
pub fn save_bundle(bundle: &ModelBundle, path: &Path) -> Result<(), BundleError> {
    let serialized = ron::ser::to_string_pretty(bundle, ron::ser::PrettyConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a ModelBundle from a RON file.
pub fn load_bundle(path: &Path) -> Result<ModelBundle, BundleError> {
    let contents = std::fs::read_to_string(path)?;
    let bundle: ModelBundle = ron::from_str(&contents)?;
    Ok(bundle)
}

/// Load a RON corpus file containing a list of lead sheets.
pub fn load_corpus(path: &Path) -> Result<Vec<LeadSheet>, BundleError> {
    let contents = std::fs::read_to_string(path)?;
    let sheets: Vec<LeadSheet> = ron::from_str(&contents)?;
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::chord::{Mode, Quadrant};

    fn small_corpus() -> Vec<LeadSheet> {
        vec![
            LeadSheet {
                id: "a".to_string(),
                quadrant: Quadrant::Q1,
                mode: Mode::Major,
                chords: ["I", "I", "IV", "V", "I"].iter().map(|c| c.to_string()).collect(),
            },
            LeadSheet {
                id: "b".to_string(),
                quadrant: Quadrant::Q3,
                mode: Mode::Minor,
                chords: ["I", "VIb", "VIb", "V"].iter().map(|c| c.to_string()).collect(),
            },
        ]
    }

    #[test]
    fn train_builds_all_artifacts() {
        let bundle = ModelBundle::train(&small_corpus(), BuildConfig::default());
        assert_eq!(bundle.matrices.len(), 2);
        assert!(bundle
            .matrix(GroupKey::new(Quadrant::Q1, Mode::Major))
            .is_some());
        assert!(!bundle.stay_lengths.is_empty());
        assert!(bundle
            .first_chords
            .group(GroupKey::new(Quadrant::Q3, Mode::Minor))
            .is_some());
        assert!((bundle.mode_stats.ratio(Quadrant::Q1).major - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ron_round_trip() {
        let bundle = ModelBundle::train(&small_corpus(), BuildConfig::default());
        let serialized = ron::to_string(&bundle).unwrap();
        let deserialized: ModelBundle = ron::from_str(&serialized).unwrap();
        assert_eq!(deserialized.matrices.len(), bundle.matrices.len());
        let group = GroupKey::new(Quadrant::Q1, Mode::Major);
        assert_eq!(
            deserialized.matrix(group).unwrap(),
            bundle.matrix(group).unwrap()
        );
    }

    #[test]
    fn save_and_load_bundle() {
        let bundle = ModelBundle::train(&small_corpus(), BuildConfig::default());
        let path = std::path::PathBuf::from("target/test_model_bundle.ron");

        save_bundle(&bundle, &path).unwrap();
        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.matrices.len(), bundle.matrices.len());

        // Cleanup
        let _ = std::fs::remove_file(&path);
    }
}
