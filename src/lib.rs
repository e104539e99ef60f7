//! Real-time single-lead ECG analysis.
//!
//! Raw ADC samples go through a causal filter bank, land in two rolling
//! windows, and feed a pluggable R-peak detector. The short window yields a
//! heart rate, the long one time-domain HRV measures.

pub mod buffer;
pub mod config;
pub mod data_loading;
pub mod error;
pub mod filtering;
pub mod heart_analysis;
pub mod output;
pub mod peak_detection;
pub mod pipeline;
pub mod synthetic;
pub mod units;

pub use config::{AnalysisConfig, DetectorKind, DisplayMode, Settings};
pub use error::ConfigError;
pub use filtering::FilterBank;
pub use heart_analysis::{HeartMeasures, HeartRateEstimator, HrvAnalyzer};
pub use peak_detection::PeakDetector;
pub use pipeline::{EcgPipeline, Reading, Report, Step};
