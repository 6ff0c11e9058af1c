/// The engine facade: load artifacts once, serve many generation
/// requests.
///
/// Wires together mode selection, first-chord choice, and the
/// semi-Markov generator over one immutable [`ModelBundle`].
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::bundle::{load_bundle, BundleError, ModelBundle};
use crate::core::generate::{generate, GenerateError, GenerateParams};
use crate::core::select::SelectError;
use crate::schema::chord::{GroupKey, Mode, Quadrant};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no transition matrix built for {0}")]
    DataUnavailable(GroupKey),
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
    #[error("selection error: {0}")]
    Select(#[from] SelectError),
    #[error("generation error: {0}")]
    Generate(#[from] GenerateError),
}

/// One generation request. Defaults match the batch CLI: 16 bars,
/// temperature 1.0, stays capped at 4 bars, fresh entropy seed.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub quadrant: Quadrant,
    pub bars: usize,
    pub temperature: f64,
    pub max_stay: u32,
    pub start_chord: Option<String>,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(quadrant: Quadrant) -> GenerationRequest {
        GenerationRequest {
            quadrant,
            bars: 16,
            temperature: 1.0,
            max_stay: 4,
            start_chord: None,
            seed: None,
        }
    }
}

/// A finished progression, ready for a voicing or rendering layer.
/// Guaranteed non-empty and free of sentinel tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub quadrant: Quadrant,
    pub mode: Mode,
    pub chords: Vec<String>,
}

/// The top-level engine. Built via `ProgressionEngine::builder()`.
pub struct ProgressionEngine {
    bundle: ModelBundle,
}

/// Builder for constructing a `ProgressionEngine`.
pub struct ProgressionEngineBuilder {
    bundle_path: Option<String>,
    /// Directly provided bundle (for testing without files).
    bundle: Option<ModelBundle>,
}

impl ProgressionEngine {
    pub fn builder() -> ProgressionEngineBuilder {
        ProgressionEngineBuilder {
            bundle_path: None,
            bundle: None,
        }
    }

    pub fn new(bundle: ModelBundle) -> ProgressionEngine {
        ProgressionEngine { bundle }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Generate one progression, seeding a fresh RNG from the request.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Progression, EngineError> {
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.generate_with_rng(request, &mut rng)
    }

    /// Same as [`ProgressionEngine::generate`], with a caller-owned RNG.
    ///
    /// Concurrent requests each bring their own handle; the bundle is
    /// only ever read.
    pub fn generate_with_rng(
        &self,
        request: &GenerationRequest,
        rng: &mut StdRng,
    ) -> Result<Progression, EngineError> {
        let group = self.choose_group(request.quadrant, rng)?;
        let matrix = &self.bundle.matrices[&group];

        let start = self.bundle.first_chords.choose_first(
            group,
            matrix.alphabet(),
            request.start_chord.as_deref(),
            rng,
        )?;

        let params = GenerateParams {
            start,
            length: request.bars,
            temperature: request.temperature,
            max_stay: request.max_stay,
        };
        let chords = generate(matrix, &self.bundle.stay_lengths, &params, rng)?;

        Ok(Progression {
            quadrant: request.quadrant,
            mode: group.mode,
            chords,
        })
    }

    /// Draw a mode from the quadrant's corpus ratio, constrained to the
    /// modes that actually have a matrix. A quadrant covered by a single
    /// mode is deterministic; a quadrant with no matrix at all is
    /// surfaced as unavailable, never served from a different quadrant.
    fn choose_group(&self, quadrant: Quadrant, rng: &mut StdRng) -> Result<GroupKey, EngineError> {
        let drawn = self.bundle.mode_stats.choose_mode(quadrant, rng);
        let drawn_key = GroupKey::new(quadrant, drawn);
        if self.bundle.matrices.contains_key(&drawn_key) {
            return Ok(drawn_key);
        }
        let sibling = GroupKey::new(quadrant, drawn.other());
        if self.bundle.matrices.contains_key(&sibling) {
            return Ok(sibling);
        }
        Err(EngineError::DataUnavailable(drawn_key))
    }
}

impl ProgressionEngineBuilder {
    pub fn bundle_path(mut self, path: &str) -> Self {
        self.bundle_path = Some(path.to_string());
        self
    }

    /// Provide a bundle directly (for testing without files).
    pub fn with_bundle(mut self, bundle: ModelBundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn build(self) -> Result<ProgressionEngine, EngineError> {
        let bundle = match (self.bundle, self.bundle_path) {
            (Some(bundle), _) => bundle,
            (None, Some(path)) => load_bundle(Path::new(&path))?,
            (None, None) => ModelBundle::default(),
        };
        Ok(ProgressionEngine { bundle })
    }
}
