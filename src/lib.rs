//! Progression Engine — emotion-conditioned chord progression generation.
//!
//! Generates symbolic chord progressions for an emotional quadrant and a
//! tonal mode without any learned model beyond frequency counts, using a
//! semi-Markov loop over smoothed transition matrices and stay-length
//! histograms mined from a labeled corpus of lead sheets.

pub mod core;
pub mod schema;
