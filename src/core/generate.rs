/// Semi-Markov progression sampling.
///
/// Stay lengths come from the stay-length model; chord changes come from
/// the transition matrix with the self cell forced to zero, so "staying"
/// is never double-counted between the two.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::core::matrix::TransitionMatrix;
use crate::core::stay::StayLengthModel;
use crate::schema::chord::is_valid_chord;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("requested length must be at least 1")]
    InvalidLength,
    #[error("temperature must be positive, got {0}")]
    InvalidTemperature(f64),
    #[error("max_stay must be at least 1")]
    InvalidMaxStay,
    #[error("start chord '{0}' is not a valid member of the matrix alphabet")]
    UnknownStart(String),
    #[error("matrix alphabet contains no valid chords")]
    EmptyAlphabet,
}

/// Knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub start: String,
    pub length: usize,
    /// Exponential reshaping of each row before sampling: 1.0 is a
    /// no-op, below 1 sharpens toward the row's mode, above 1 flattens
    /// toward uniform.
    pub temperature: f64,
    /// Hard bound on any single stay, guarding against near-1.0
    /// self-transition statistics producing absurdly long runs.
    pub max_stay: u32,
}

impl GenerateParams {
    pub fn new(start: impl Into<String>, length: usize) -> GenerateParams {
        GenerateParams {
            start: start.into(),
            length,
            temperature: 1.0,
            max_stay: 4,
        }
    }
}

/// Ephemeral state for one run; never shared across calls.
struct GenerationState {
    current: usize,
    remaining_stay: u32,
    emitted: Vec<String>,
}

/// Generate a progression of exactly `params.length` chords.
///
/// Alternates EMIT (append the current chord, consume one bar of stay)
/// and TRANSITION (when the stay is spent and more output is owed, draw
/// the next chord and a fresh stay). Deterministic for a fixed RNG
/// state. The output never contains sentinel tokens.
pub fn generate(
    matrix: &TransitionMatrix,
    stay_model: &StayLengthModel,
    params: &GenerateParams,
    rng: &mut StdRng,
) -> Result<Vec<String>, GenerateError> {
    if params.length == 0 {
        return Err(GenerateError::InvalidLength);
    }
    if !(params.temperature > 0.0) {
        return Err(GenerateError::InvalidTemperature(params.temperature));
    }
    if params.max_stay == 0 {
        return Err(GenerateError::InvalidMaxStay);
    }
    // A legacy artifact may carry a sentinel in its alphabet; a sentinel
    // start would otherwise be emitted verbatim.
    if !is_valid_chord(&params.start) {
        return Err(GenerateError::UnknownStart(params.start.clone()));
    }
    let start = matrix
        .index_of(&params.start)
        .ok_or_else(|| GenerateError::UnknownStart(params.start.clone()))?;
    if !matrix.alphabet().iter().any(|c| is_valid_chord(c)) {
        return Err(GenerateError::EmptyAlphabet);
    }

    let mut state = GenerationState {
        current: start,
        remaining_stay: stay_model.sample_stay(&params.start, params.max_stay, rng),
        emitted: Vec::with_capacity(params.length),
    };

    while state.emitted.len() < params.length {
        state.emitted.push(matrix.chord(state.current).to_string());
        state.remaining_stay -= 1;
        if state.emitted.len() == params.length {
            break;
        }
        if state.remaining_stay == 0 {
            let next = sample_transition(matrix, state.current, params.temperature, rng)?;
            state.remaining_stay = stay_model.sample_stay(matrix.chord(next), params.max_stay, rng);
            state.current = next;
        }
    }
    Ok(state.emitted)
}

/// Draw the next chord index from the current chord's row.
///
/// The self cell is forced to zero and sentinel columns are never
/// candidates. A row left with no mass after temperature scaling falls
/// back to a uniform draw over the remaining valid chords; an alphabet
/// whose only valid chord is the current one can only stay put.
fn sample_transition(
    matrix: &TransitionMatrix,
    from: usize,
    temperature: f64,
    rng: &mut StdRng,
) -> Result<usize, GenerateError> {
    let row = matrix.row(from);
    let mut candidates = Vec::with_capacity(row.len());
    let mut weights = Vec::with_capacity(row.len());
    for (j, &p) in row.iter().enumerate() {
        if j == from || !is_valid_chord(matrix.chord(j)) {
            continue;
        }
        candidates.push(j);
        weights.push(p);
    }

    if candidates.is_empty() {
        if is_valid_chord(matrix.chord(from)) {
            return Ok(from);
        }
        return Err(GenerateError::EmptyAlphabet);
    }

    // Scale relative to the row maximum before exponentiating: the
    // dominant cell maps to exactly 1.0, so an extreme 1/T exponent
    // cannot underflow the whole row to zero and trip the uniform
    // fallback where a point mass is expected.
    let row_max = weights.iter().cloned().fold(0.0_f64, f64::max);
    if row_max > 0.0 {
        for w in weights.iter_mut() {
            *w = (*w / row_max).powf(1.0 / temperature);
        }
    }

    let total: f64 = weights.iter().sum();
    let pick = if total > 0.0 {
        match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..candidates.len()),
        }
    } else {
        rng.gen_range(0..candidates.len())
    };
    Ok(candidates[pick])
}
