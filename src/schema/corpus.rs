/// Corpus records handed over by the ingestion collaborator.
///
/// Event-list parsing, bar collapsing, and chord-symbol normalization all
/// happen upstream; what arrives here is one chord token per bar, with
/// unresolvable bars already marked by the sentinel value.
use serde::{Deserialize, Serialize};

use crate::schema::chord::{is_valid_chord, GroupKey, Mode, Quadrant};

/// One labeled lead sheet: an emotion quadrant, a tonal mode, and the
/// per-bar chord tokens. Sentinel entries may still be present; the
/// builders filter them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadSheet {
    pub id: String,
    pub quadrant: Quadrant,
    pub mode: Mode,
    pub chords: Vec<String>,
}

impl LeadSheet {
    pub fn group(&self) -> GroupKey {
        GroupKey::new(self.quadrant, self.mode)
    }

    /// The bar chords with sentinel entries dropped.
    pub fn valid_chords(&self) -> Vec<&str> {
        self.chords
            .iter()
            .map(String::as_str)
            .filter(|c| is_valid_chord(c))
            .collect()
    }

    /// The first resolvable chord, if the sheet has one.
    pub fn first_chord(&self) -> Option<&str> {
        self.chords
            .iter()
            .map(String::as_str)
            .find(|c| is_valid_chord(c))
    }
}
