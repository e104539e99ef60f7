//! Construction-time errors.
//!
//! Data conditions (too few samples, too few peaks, an implausible heart rate)
//! are never errors: they surface as `None` from the analysis calls. The only
//! fatal class is a configuration that cannot produce a working pipeline, and
//! it is reported before the first sample is processed.

use std::fmt;

/// A configuration that cannot be turned into a working pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Sampling rate is zero, negative or not finite
    InvalidSampleRate(f64),
    /// A filter cutoff sits at or above the Nyquist frequency
    CutoffAboveNyquist {
        filter: &'static str,
        cutoff_hz: f64,
        nyquist_hz: f64,
    },
    /// The filter design did not yield second-order sections
    FilterDesign(&'static str),
    /// A rolling buffer has zero capacity or a minimum length above its capacity
    InvalidBuffer {
        name: &'static str,
        capacity: usize,
        min_len: usize,
    },
    /// Correlation template is empty or has no positive sample
    InvalidTemplate,
    /// Plausible heart-rate band is empty or not positive
    InvalidHeartRateBand { min_bpm: f64, max_bpm: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSampleRate(fs) => {
                write!(f, "Sampling rate must be a positive number, got {}", fs)
            }
            ConfigError::CutoffAboveNyquist {
                filter,
                cutoff_hz,
                nyquist_hz,
            } => write!(
                f,
                "{} cutoff {} Hz is not below the Nyquist frequency {} Hz",
                filter, cutoff_hz, nyquist_hz
            ),
            ConfigError::FilterDesign(filter) => {
                write!(f, "{} design did not produce second-order sections", filter)
            }
            ConfigError::InvalidBuffer {
                name,
                capacity,
                min_len,
            } => write!(
                f,
                "{} buffer needs 0 < min length <= capacity, got min {} and capacity {}",
                name, min_len, capacity
            ),
            ConfigError::InvalidTemplate => {
                write!(f, "Correlation template must contain a positive sample")
            }
            ConfigError::InvalidHeartRateBand { min_bpm, max_bpm } => write!(
                f,
                "Heart-rate band [{}, {}] bpm is empty or not positive",
                min_bpm, max_bpm
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
