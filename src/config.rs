use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::units::{DEFAULT_ADC_RESOLUTION, DEFAULT_MAX_VOLTAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorKind {
    EnergyDerivative,    // squared slope of the smoothed signal (default)
    TemplateCorrelation, // correlation against a fixed beat template
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "energy" | "energy-derivative" => Ok(DetectorKind::EnergyDerivative),
            "template" | "template-correlation" => Ok(DetectorKind::TemplateCorrelation),
            _ => Err(format!(
                "Invalid detector: {}. Use 'energy' (default) or 'template'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    Filtered,
    Raw,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filtered" => Ok(DisplayMode::Filtered),
            "raw" => Ok(DisplayMode::Raw),
            _ => Err(format!(
                "Invalid display mode: {}. Use 'filtered' (default) or 'raw'",
                s
            )),
        }
    }
}

/// Runtime-switchable choices, versioned so a caller can tell which one a
/// reading was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub version: u64,
    pub display: DisplayMode,
    pub detector: DetectorKind,
}

/// Everything the pipeline needs, fixed at construction.
///
/// Durations are in seconds and converted to samples with the sampling rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub sample_rate: f64,
    pub detector: DetectorKind,
    pub display: DisplayMode,
    /// Heart-rate window length
    pub short_window_secs: f64,
    /// Samples required before a heart rate is computed
    pub short_min_secs: f64,
    /// HRV window length
    pub long_window_secs: f64,
    pub long_min_secs: f64,
    /// Plausible heart-rate band; anything outside is reported as undefined
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// 0.33 s is 66 samples at 200 Hz, a ceiling of about 180 bpm
    pub min_peak_distance_secs: f64,
    /// Absolute floor on the squared slope, in squared input units
    pub energy_threshold: f64,
    pub smoothing_window: usize,
    /// Half-width in samples of the search around each coarse peak
    pub refine_half_width: usize,
    /// Relative floor on the normalised template correlation
    pub template_height: f64,
    /// Custom beat template; a synthetic 0.65 s beat when unset
    pub template: Option<Vec<f64>>,
}

impl AnalysisConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            detector: DetectorKind::EnergyDerivative,
            display: DisplayMode::Filtered,
            short_window_secs: 3.0,
            short_min_secs: 3.0,
            long_window_secs: 10.0,
            long_min_secs: 10.0,
            min_bpm: 30.0,
            max_bpm: 200.0,
            min_peak_distance_secs: 0.33,
            energy_threshold: 5000.0,
            smoothing_window: 5,
            refine_half_width: 10,
            template_height: 0.5,
            template: None,
        }
    }

    pub fn seconds_to_samples(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate).round().max(0.0) as usize
    }

    pub fn min_peak_distance_samples(&self) -> usize {
        self.seconds_to_samples(self.min_peak_distance_secs).max(1)
    }

    /// Samples per reporting second, at least one
    pub fn samples_per_second(&self) -> usize {
        self.seconds_to_samples(1.0).max(1)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(200.0)
    }
}

/// Replay recorded or synthetic ECG through the real-time pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Recording file, directory of .txt recordings, or '-' for stdin
    #[arg(help = "Recording file, directory of .txt recordings, or '-' for stdin")]
    pub input_path: Option<PathBuf>,

    /// Sampling rate of the recording in Hz
    #[arg(long, default_value = "200.0", env = "ECG_SAMPLE_RATE")]
    pub sample_rate: f64,

    /// Peak detector (energy [default] or template)
    #[arg(long, default_value = "energy")]
    pub detector: DetectorKind,

    /// Amplitude shown in the range summary (filtered [default] or raw)
    #[arg(long, default_value = "filtered")]
    pub display: DisplayMode,

    /// Lower bound of the plausible heart-rate band in bpm
    #[arg(long, default_value = "30.0")]
    pub min_bpm: f64,

    /// Upper bound of the plausible heart-rate band in bpm
    #[arg(long, default_value = "200.0")]
    pub max_bpm: f64,

    /// Minimum spacing between R-peaks in seconds
    #[arg(long, default_value = "0.33")]
    pub min_peak_distance: f64,

    /// ADC resolution in bits, for the volts summary
    #[arg(long, default_value_t = DEFAULT_ADC_RESOLUTION)]
    pub adc_resolution: u32,

    /// ADC reference voltage, for the volts summary
    #[arg(long, default_value_t = DEFAULT_MAX_VOLTAGE)]
    pub max_voltage: f64,

    /// Replay this many seconds of synthetic ECG instead of reading input
    #[arg(long)]
    pub synthetic_seconds: Option<f64>,

    /// Heart rate of the synthetic ECG
    #[arg(long, default_value = "60.0")]
    pub synthetic_bpm: f64,

    /// Recording start time (format: YYYY-MM-DD HH:MM:SS), defaults to now
    #[arg(long)]
    pub start_time: Option<String>,

    /// CSV output file prefix (e.g. /path/to/output/prefix)
    #[arg(long)]
    pub csv_output: Option<String>,

    /// Print every HRV report as a JSON line on stdout
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            detector: self.detector,
            display: self.display,
            min_bpm: self.min_bpm,
            max_bpm: self.max_bpm,
            min_peak_distance_secs: self.min_peak_distance,
            ..AnalysisConfig::new(self.sample_rate)
        }
    }
}
