//! Per-sample orchestration of filtering, buffering and periodic analysis.
//!
//! The pipeline is driven by one caller, one sample at a time. Every sample
//! advances the filter state and both rolling buffers. Heart rate is meant to
//! be requested once per second of samples, HRV once per ten seconds;
//! [`EcgPipeline::step`] does that bookkeeping for callers that want it.
//!
//! Runtime settings (display choice, detector strategy) are staged with
//! [`EcgPipeline::update_settings`] and take effect, all together, at the
//! start of the next [`EcgPipeline::ingest`]. Filter state is never touched
//! by a settings change.

use crate::buffer::SlidingBuffer;
use crate::config::{AnalysisConfig, DetectorKind, DisplayMode, Settings};
use crate::error::ConfigError;
use crate::filtering::FilterBank;
use crate::heart_analysis::{HeartMeasures, HeartRateEstimator, HrvAnalyzer};
use crate::peak_detection::{DetectorParams, PeakDetector};
use log::{debug, info, trace};
use serde::Serialize;

/// One ingested sample, raw and filtered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub raw: f64,
    pub filtered: f64,
    pub display: DisplayMode,
    /// Version of the settings this sample was processed under
    pub settings_version: u64,
}

impl Reading {
    /// The amplitude the active display mode asks for
    pub fn displayed(&self) -> f64 {
        match self.display {
            DisplayMode::Filtered => self.filtered,
            DisplayMode::Raw => self.raw,
        }
    }
}

/// A periodic result, stamped with the number of samples ingested so far
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    HeartRate {
        at_sample: u64,
        bpm: Option<u32>,
    },
    Hrv {
        at_sample: u64,
        measures: Option<HeartMeasures>,
    },
}

/// Output of [`EcgPipeline::step`]: the reading plus any reports that fell
/// due on this sample
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub reading: Reading,
    pub reports: Vec<Report>,
}

pub struct EcgPipeline {
    config: AnalysisConfig,
    filters: FilterBank,
    params: DetectorParams,
    detector: PeakDetector,
    heart_rate: HeartRateEstimator,
    hrv: HrvAnalyzer,
    short: SlidingBuffer,
    long: SlidingBuffer,
    settings: Settings,
    staged: Option<Settings>,
    ingested: u64,
}

impl EcgPipeline {
    /// Build every stage up front; any misconfiguration fails here.
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        let fs = config.sample_rate;
        let filters = FilterBank::new(fs)?;
        let params = DetectorParams::from_config(&config)?;
        let detector = PeakDetector::new(config.detector, &params);
        let heart_rate = HeartRateEstimator::new(fs, config.min_bpm, config.max_bpm)?;
        let short = SlidingBuffer::new(
            "short",
            config.seconds_to_samples(config.short_window_secs),
            config.seconds_to_samples(config.short_min_secs),
        )?;
        let long = SlidingBuffer::new(
            "long",
            config.seconds_to_samples(config.long_window_secs),
            config.seconds_to_samples(config.long_min_secs),
        )?;

        info!(
            "ECG pipeline at {} Hz: {:?} detector, short window {} samples, long window {} samples",
            fs,
            config.detector,
            short.capacity(),
            long.capacity()
        );

        Ok(Self {
            settings: Settings {
                version: 0,
                display: config.display,
                detector: config.detector,
            },
            staged: None,
            hrv: HrvAnalyzer::new(fs),
            config,
            filters,
            params,
            detector,
            heart_rate,
            short,
            long,
            ingested: 0,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Settings in effect for the samples being ingested now
    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    pub fn detector_kind(&self) -> DetectorKind {
        self.detector.kind()
    }

    /// Stage new settings; they apply from the next `ingest` on.
    ///
    /// Staging twice before the next sample keeps only the last value.
    /// Returns the version the new settings will carry.
    pub fn update_settings(&mut self, display: DisplayMode, detector: DetectorKind) -> u64 {
        let latest = self.staged.map_or(self.settings.version, |s| s.version);
        let next = Settings {
            version: latest + 1,
            display,
            detector,
        };
        debug!("Staged settings {:?}", next);
        self.staged = Some(next);
        next.version
    }

    fn apply_staged_settings(&mut self) {
        let Some(next) = self.staged.take() else {
            return;
        };
        if next.detector != self.detector.kind() {
            self.detector = PeakDetector::new(next.detector, &self.params);
        }
        info!(
            "Settings v{} active: display {:?}, detector {:?}",
            next.version, next.display, next.detector
        );
        self.settings = next;
    }

    /// Filter one raw sample and append it to both rolling buffers.
    pub fn ingest(&mut self, raw: f64) -> Reading {
        self.apply_staged_settings();

        let filtered = self.filters.process_sample(raw);
        self.short.push(filtered);
        self.long.push(filtered);
        self.ingested += 1;
        trace!("sample {}: {} -> {}", self.ingested, raw, filtered);

        Reading {
            raw,
            filtered,
            display: self.settings.display,
            settings_version: self.settings.version,
        }
    }

    /// Heart rate over the short window, once it holds enough samples
    pub fn maybe_report_heart_rate(&mut self) -> Option<u32> {
        if !self.short.is_ready() {
            trace!(
                "Short buffer at {}/{} samples, no heart rate yet",
                self.short.len(),
                self.short.min_len()
            );
            return None;
        }
        let peaks = self.detector.detect(self.short.as_contiguous());
        let bpm = self.heart_rate.estimate(&peaks);
        debug!("Heart rate at sample {}: {:?}", self.ingested, bpm);
        bpm
    }

    /// HRV over the long window, once it holds enough samples
    pub fn maybe_report_hrv(&mut self) -> Option<HeartMeasures> {
        if !self.long.is_ready() {
            trace!(
                "Long buffer at {}/{} samples, no HRV yet",
                self.long.len(),
                self.long.min_len()
            );
            return None;
        }
        let peaks = self.detector.detect(self.long.as_contiguous());
        Some(self.hrv.analyze(&peaks))
    }

    /// Ingest one sample and run whichever reports fall due on it: heart rate
    /// every second of samples, HRV every ten.
    pub fn step(&mut self, raw: f64) -> Step {
        let reading = self.ingest(raw);
        let per_second = self.config.samples_per_second() as u64;

        let mut reports = Vec::new();
        if self.ingested % per_second == 0 {
            reports.push(Report::HeartRate {
                at_sample: self.ingested,
                bpm: self.maybe_report_heart_rate(),
            });
        }
        if self.ingested % (10 * per_second) == 0 {
            reports.push(Report::Hrv {
                at_sample: self.ingested,
                measures: self.maybe_report_hrv(),
            });
        }

        Step { reading, reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticEcg;

    fn pipeline() -> EcgPipeline {
        EcgPipeline::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn reports_wait_for_full_buffers() {
        let mut pipeline = pipeline();
        let signal = SyntheticEcg::new(200.0, 60.0).generate(599);
        for x in signal {
            pipeline.ingest(x);
        }
        assert_eq!(pipeline.maybe_report_heart_rate(), None);
        assert_eq!(pipeline.maybe_report_hrv(), None);
    }

    #[test]
    fn settings_apply_at_next_ingest() {
        let mut pipeline = pipeline();
        let first = pipeline.ingest(2048.0);
        assert_eq!(first.settings_version, 0);
        assert_eq!(first.display, DisplayMode::Filtered);

        let version = pipeline.update_settings(DisplayMode::Raw, DetectorKind::TemplateCorrelation);
        assert_eq!(version, 1);
        // Nothing changes until a sample arrives
        assert_eq!(pipeline.settings().version, 0);
        assert_eq!(pipeline.detector_kind(), DetectorKind::EnergyDerivative);

        let second = pipeline.ingest(2100.0);
        assert_eq!(second.settings_version, 1);
        assert_eq!(second.display, DisplayMode::Raw);
        assert_eq!(second.displayed(), 2100.0);
        assert_eq!(pipeline.detector_kind(), DetectorKind::TemplateCorrelation);
    }

    #[test]
    fn restaging_keeps_last_value() {
        let mut pipeline = pipeline();
        pipeline.update_settings(DisplayMode::Raw, DetectorKind::EnergyDerivative);
        let version = pipeline.update_settings(DisplayMode::Filtered, DetectorKind::EnergyDerivative);
        assert_eq!(version, 2);

        let reading = pipeline.ingest(2048.0);
        assert_eq!(reading.settings_version, 2);
        assert_eq!(reading.display, DisplayMode::Filtered);
    }

    #[test]
    fn settings_change_leaves_filter_state_alone() {
        let signal = SyntheticEcg::new(200.0, 75.0).generate(800);

        let mut plain = pipeline();
        let mut switched = pipeline();
        for (i, &x) in signal.iter().enumerate() {
            if i == 400 {
                switched.update_settings(DisplayMode::Raw, DetectorKind::TemplateCorrelation);
            }
            let a = plain.ingest(x);
            let b = switched.ingest(x);
            assert_eq!(a.filtered, b.filtered);
        }
    }

    #[test]
    fn step_reports_on_cadence() {
        let mut pipeline = pipeline();
        let signal = SyntheticEcg::new(200.0, 60.0).generate(2000);

        let mut heart_rates = Vec::new();
        let mut hrv = Vec::new();
        for x in signal {
            for report in pipeline.step(x).reports {
                match report {
                    Report::HeartRate { at_sample, bpm } => heart_rates.push((at_sample, bpm)),
                    Report::Hrv { at_sample, measures } => hrv.push((at_sample, measures)),
                }
            }
        }

        let at: Vec<u64> = heart_rates.iter().map(|(at, _)| *at).collect();
        assert_eq!(at, (1..=10).map(|s| s * 200).collect::<Vec<_>>());
        // The short buffer fills on the third second
        assert_eq!(heart_rates[0].1, None);
        assert_eq!(heart_rates[1].1, None);
        assert!(heart_rates[2..].iter().all(|(_, bpm)| bpm.is_some()));

        assert_eq!(hrv.len(), 1);
        assert_eq!(hrv[0].0, 2000);
        assert!(hrv[0].1.is_some());
    }

    #[test]
    fn misconfiguration_fails_before_any_sample() {
        let config = AnalysisConfig::new(90.0);
        assert!(matches!(
            EcgPipeline::new(config),
            Err(ConfigError::CutoffAboveNyquist { .. })
        ));

        let config = AnalysisConfig {
            short_min_secs: 5.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            EcgPipeline::new(config),
            Err(ConfigError::InvalidBuffer { name: "short", .. })
        ));
    }
}
