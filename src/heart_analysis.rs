use crate::error::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};

/// Time-domain heart measures over one analysis window.
///
/// Every field is `None` when the window held too few beats to compute it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartMeasures {
    pub bpm: Option<f64>,
    /// Mean inter-beat interval in ms
    pub ibi: Option<f64>,
    pub sdnn: Option<f64>,
    pub sdsd: Option<f64>,
    pub rmssd: Option<f64>,
    /// Fraction (0 to 1) of successive differences above 20 ms
    pub pnn20: Option<f64>,
    pub pnn50: Option<f64>,
}

impl HeartMeasures {
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn is_defined(&self) -> bool {
        self.ibi.is_some()
    }
}

/// RR intervals in ms between consecutive peaks
pub fn calc_rr(peaklist: &[usize], sample_rate: f64) -> Vec<f64> {
    peaklist
        .windows(2)
        .map(|w| (w[1] as f64 - w[0] as f64) * 1000.0 / sample_rate)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

fn fraction_above(values: &[f64], threshold: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let count = values.iter().filter(|x| x.abs() > threshold).count();
    Some(count as f64 / values.len() as f64)
}

/// Time-series measures from a list of RR intervals.
///
/// Needs at least two intervals (three peaks); with fewer, everything is
/// undefined. With two or more intervals there is always at least one
/// successive difference, so pnn20 and pnn50 are then defined as well.
pub fn calc_ts_measures(rr_list: &[f64]) -> HeartMeasures {
    if rr_list.len() < 2 {
        return HeartMeasures::undefined();
    }

    let rr_diff: Vec<f64> = rr_list.windows(2).map(|w| w[1] - w[0]).collect();
    let rr_sqdiff: Vec<f64> = rr_diff.iter().map(|d| d * d).collect();

    let ibi = mean(rr_list);
    HeartMeasures {
        bpm: ibi.filter(|&m| m > 0.0).map(|m| 60_000.0 / m),
        ibi,
        sdnn: std_dev(rr_list),
        sdsd: std_dev(&rr_diff),
        rmssd: mean(&rr_sqdiff).map(f64::sqrt),
        pnn20: fraction_above(&rr_diff, 20.0),
        pnn50: fraction_above(&rr_diff, 50.0),
    }
}

/// Peak indices to a rounded heart rate, within a plausible band.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    sample_rate: f64,
    min_bpm: f64,
    max_bpm: f64,
}

impl HeartRateEstimator {
    pub fn new(sample_rate: f64, min_bpm: f64, max_bpm: f64) -> Result<Self, ConfigError> {
        if !(min_bpm > 0.0 && min_bpm <= max_bpm) {
            return Err(ConfigError::InvalidHeartRateBand { min_bpm, max_bpm });
        }
        Ok(Self {
            sample_rate,
            min_bpm,
            max_bpm,
        })
    }

    /// Unrounded rate from the mean peak spacing, if inside the band
    pub fn estimate_bpm(&self, peaks: &[usize]) -> Option<f64> {
        if peaks.len() < 2 {
            return None;
        }
        let distances: Vec<f64> = peaks
            .windows(2)
            .map(|w| w[1] as f64 - w[0] as f64)
            .collect();
        let mean_distance = mean(&distances)?;
        let bpm = self.sample_rate * 60.0 / mean_distance;

        if bpm >= self.min_bpm && bpm <= self.max_bpm {
            Some(bpm)
        } else {
            debug!(
                "Heart rate {:.1} bpm outside [{}, {}], dropped",
                bpm, self.min_bpm, self.max_bpm
            );
            None
        }
    }

    /// Rate rounded to whole beats per minute for display
    pub fn estimate(&self, peaks: &[usize]) -> Option<u32> {
        self.estimate_bpm(peaks).map(|bpm| bpm.round() as u32)
    }
}

/// Peak indices from a long window to HRV measures
#[derive(Debug, Clone)]
pub struct HrvAnalyzer {
    sample_rate: f64,
}

impl HrvAnalyzer {
    pub fn new(sample_rate: f64) -> Self {
        Self { sample_rate }
    }

    pub fn analyze(&self, peaks: &[usize]) -> HeartMeasures {
        let rr_list = calc_rr(peaks, self.sample_rate);
        let measures = calc_ts_measures(&rr_list);
        debug!(
            "HRV over {} peaks: ibi {:?} ms, sdnn {:?} ms, rmssd {:?} ms",
            peaks.len(),
            measures.ibi,
            measures.sdnn,
            measures.rmssd
        );
        measures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(value: Option<f64>, expected: f64) -> bool {
        value.map_or(false, |v| (v - expected).abs() < 1e-3)
    }

    #[test]
    fn heart_rate_from_even_spacing() {
        let estimator = HeartRateEstimator::new(200.0, 30.0, 200.0).unwrap();
        for d in 60..=400usize {
            let peaks: Vec<usize> = (0..6).map(|k| 17 + k * d).collect();
            let expected = (200.0 * 60.0 / d as f64).round() as u32;
            assert_eq!(estimator.estimate(&peaks), Some(expected), "spacing {}", d);
        }
    }

    #[test]
    fn heart_rate_undefined_on_sparse_peaks() {
        let estimator = HeartRateEstimator::new(200.0, 30.0, 200.0).unwrap();
        assert_eq!(estimator.estimate(&[]), None);
        assert_eq!(estimator.estimate(&[120]), None);
    }

    #[test]
    fn heart_rate_outside_band_is_undefined() {
        let estimator = HeartRateEstimator::new(200.0, 30.0, 200.0).unwrap();
        // 240 bpm
        assert_eq!(estimator.estimate(&[0, 50, 100]), None);
        // 24 bpm
        assert_eq!(estimator.estimate(&[0, 500, 1000]), None);
        // duplicated index gives an infinite rate
        assert_eq!(estimator.estimate(&[10, 10]), None);
    }

    #[test]
    fn heart_rate_band_is_configurable() {
        let exercise = HeartRateEstimator::new(200.0, 30.0, 250.0).unwrap();
        assert_eq!(exercise.estimate(&[0, 50, 100]), Some(240));
        assert!(HeartRateEstimator::new(200.0, 120.0, 60.0).is_err());
        assert!(HeartRateEstimator::new(200.0, 0.0, 60.0).is_err());
    }

    #[test]
    fn constant_rr_has_no_variability() {
        let peaks: Vec<usize> = (0..11).map(|k| 40 + k * 200).collect();
        let measures = HrvAnalyzer::new(200.0).analyze(&peaks);
        assert_eq!(measures.ibi, Some(1000.0));
        assert_eq!(measures.bpm, Some(60.0));
        assert_eq!(measures.sdnn, Some(0.0));
        assert_eq!(measures.sdsd, Some(0.0));
        assert_eq!(measures.rmssd, Some(0.0));
        assert_eq!(measures.pnn20, Some(0.0));
        assert_eq!(measures.pnn50, Some(0.0));
    }

    #[test]
    fn sparse_peaks_are_undefined() {
        let analyzer = HrvAnalyzer::new(200.0);
        for peaks in [vec![], vec![10], vec![10, 210]] {
            let measures = analyzer.analyze(&peaks);
            assert_eq!(measures, HeartMeasures::undefined());
            assert!(!measures.is_defined());
        }
    }

    #[test]
    fn three_peaks_define_everything() {
        let measures = HrvAnalyzer::new(200.0).analyze(&[0, 200, 420]);
        assert!(measures.is_defined());
        assert!(close(measures.ibi, 1050.0));
        assert!(close(measures.sdsd, 0.0));
        assert!(close(measures.rmssd, 100.0));
        assert_eq!(measures.pnn20, Some(1.0));
        assert_eq!(measures.pnn50, Some(1.0));
    }

    #[test]
    fn known_intervals() {
        // RR of 800, 850, 820 and 900 ms at 1 kHz
        let measures = HrvAnalyzer::new(1000.0).analyze(&[0, 800, 1650, 2470, 3370]);
        assert!(close(measures.ibi, 842.5));
        assert!(close(measures.bpm, 60_000.0 / 842.5));
        assert!(close(measures.sdnn, 1418.75_f64.sqrt()));
        assert!(close(measures.sdsd, (6466.666_666_7_f64 / 3.0).sqrt()));
        assert!(close(measures.rmssd, (9800.0_f64 / 3.0).sqrt()));
        assert!(close(measures.pnn20, 1.0));
        // a difference of exactly 50 ms does not count
        assert!(close(measures.pnn50, 1.0 / 3.0));
    }

    #[test]
    fn rr_intervals_in_milliseconds() {
        assert_eq!(calc_rr(&[0, 100, 250], 200.0), vec![500.0, 750.0]);
        assert!(calc_rr(&[7], 200.0).is_empty());
    }
}
