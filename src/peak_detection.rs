use crate::config::{AnalysisConfig, DetectorKind};
use crate::error::ConfigError;
use crate::synthetic;
use log::{debug, trace};
use rustfft::{num_complex::Complex, FftPlanner};

/// Validated parameters for both detection strategies.
///
/// Built once from the configuration so that switching strategy later can
/// never fail.
#[derive(Debug, Clone)]
pub struct DetectorParams {
    pub min_distance: usize,
    pub energy_threshold: f64,
    pub smoothing_window: usize,
    pub refine_half_width: usize,
    pub template: Vec<f64>,
    pub template_height: f64,
}

impl DetectorParams {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        let template = match &config.template {
            Some(template) => template.clone(),
            None => synthetic::beat_template(config.sample_rate, 0.65, 0.25),
        };
        if !template.iter().any(|&x| x > 0.0) {
            return Err(ConfigError::InvalidTemplate);
        }

        Ok(Self {
            min_distance: config.min_peak_distance_samples(),
            energy_threshold: config.energy_threshold,
            smoothing_window: config.smoothing_window.max(1),
            refine_half_width: config.refine_half_width,
            template,
            template_height: config.template_height,
        })
    }
}

/// R-peak locator; the strategy is fixed when the detector is built.
#[derive(Debug, Clone)]
pub enum PeakDetector {
    EnergyDerivative(EnergyDerivative),
    TemplateCorrelation(TemplateCorrelation),
}

impl PeakDetector {
    pub fn new(kind: DetectorKind, params: &DetectorParams) -> Self {
        match kind {
            DetectorKind::EnergyDerivative => PeakDetector::EnergyDerivative(EnergyDerivative {
                smoothing_window: params.smoothing_window,
                threshold: params.energy_threshold,
                min_distance: params.min_distance,
                refine_half_width: params.refine_half_width,
            }),
            DetectorKind::TemplateCorrelation => {
                PeakDetector::TemplateCorrelation(TemplateCorrelation::new(
                    params.template.clone(),
                    params.template_height,
                    params.min_distance,
                ))
            }
        }
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            PeakDetector::EnergyDerivative(_) => DetectorKind::EnergyDerivative,
            PeakDetector::TemplateCorrelation(_) => DetectorKind::TemplateCorrelation,
        }
    }

    /// Ascending R-peak indices into `signal`, possibly empty
    pub fn detect(&self, signal: &[f64]) -> Vec<usize> {
        let peaks = match self {
            PeakDetector::EnergyDerivative(detector) => detector.detect(signal),
            PeakDetector::TemplateCorrelation(detector) => detector.detect(signal),
        };
        debug!(
            "{:?} found {} peaks in {} samples",
            self.kind(),
            peaks.len(),
            signal.len()
        );
        peaks
    }
}

/// Squared slope of the smoothed signal, thresholded, then snapped back onto
/// the local maximum of the signal itself.
#[derive(Debug, Clone)]
pub struct EnergyDerivative {
    smoothing_window: usize,
    threshold: f64,
    min_distance: usize,
    refine_half_width: usize,
}

impl EnergyDerivative {
    pub fn detect(&self, signal: &[f64]) -> Vec<usize> {
        let smoothed = moving_average(signal, self.smoothing_window);
        let energy: Vec<f64> = smoothed.windows(2).map(|w| (w[1] - w[0]).powi(2)).collect();

        // energy[i] sits between smoothed[i] and smoothed[i + 1], whose
        // windows are centred half a window further into the signal
        let offset = self.smoothing_window / 2 + 1;

        let coarse = find_peaks(&energy, self.threshold, self.min_distance);
        trace!("Coarse energy peaks: {:?}", coarse);

        let mut peaks: Vec<usize> = coarse
            .into_iter()
            .map(|i| refine_peak(signal, i + offset, self.refine_half_width))
            .collect();
        peaks.sort_unstable();
        peaks.dedup();
        peaks
    }
}

/// Correlation against a fixed single-beat template.
///
/// The template is never adapted, so the detector depends on how closely the
/// subject's beats resemble it and degrades over long windows with outliers.
#[derive(Debug, Clone)]
pub struct TemplateCorrelation {
    template: Vec<f64>,
    r_offset: usize,
    height: f64,
    min_distance: usize,
}

impl TemplateCorrelation {
    pub fn new(template: Vec<f64>, height: f64, min_distance: usize) -> Self {
        let r_offset = argmax(&template, 0, template.len().saturating_sub(1));
        Self {
            template,
            r_offset,
            height,
            min_distance,
        }
    }

    pub fn template(&self) -> &[f64] {
        &self.template
    }

    pub fn detect(&self, signal: &[f64]) -> Vec<usize> {
        let correlation = cross_correlate(signal, &self.template);
        let max = correlation.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !(max > 0.0) {
            return Vec::new();
        }

        let normalized: Vec<f64> = correlation.iter().map(|c| c / max).collect();
        // Lag k aligns template[0] with signal[k]; report the template's R-peak
        find_peaks(&normalized, self.height, self.min_distance)
            .into_iter()
            .map(|k| k + self.r_offset)
            .collect()
    }
}

/// Mean over every full window of `window` samples
fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || signal.len() < window {
        return Vec::new();
    }
    signal
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Index of the largest sample in `signal[lo..=hi]`, first one on ties
fn argmax(signal: &[f64], lo: usize, hi: usize) -> usize {
    if signal.is_empty() {
        return lo;
    }
    let mut best = lo;
    for i in lo..=hi.min(signal.len().saturating_sub(1)) {
        if signal[i] > signal[best] {
            best = i;
        }
    }
    best
}

/// Move `center` onto the maximum of `signal` within `half_width` samples,
/// clamped at the buffer edges.
pub fn refine_peak(signal: &[f64], center: usize, half_width: usize) -> usize {
    if signal.is_empty() {
        return center;
    }
    let last = signal.len() - 1;
    let center = center.min(last);
    let lo = center.saturating_sub(half_width);
    let hi = (center + half_width).min(last);
    argmax(signal, lo, hi)
}

/// Valid-mode cross-correlation: `out[k] = sum_j signal[k + j] * template[j]`
fn cross_correlate(signal: &[f64], template: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = template.len();
    if m == 0 || n < m {
        return Vec::new();
    }

    let size = (n + m - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let zero = Complex::new(0.0, 0.0);
    let mut a: Vec<Complex<f64>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(zero))
        .take(size)
        .collect();
    // Convolving with the reversed template correlates with the template
    let mut b: Vec<Complex<f64>> = template
        .iter()
        .rev()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(zero))
        .take(size)
        .collect();

    forward.process(&mut a);
    forward.process(&mut b);
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x = *x * *y;
    }
    inverse.process(&mut a);

    let scale = size as f64;
    a[m - 1..n].iter().map(|c| c.re / scale).collect()
}

/// Local maxima of `signal` at least `height` tall and at least `distance`
/// samples apart.
///
/// Flat tops count once, at their middle sample. When two maxima are closer
/// than `distance`, the taller one wins.
pub fn find_peaks(signal: &[f64], height: f64, distance: usize) -> Vec<usize> {
    let mut candidates = Vec::new();
    if signal.len() < 3 {
        return candidates;
    }

    let i_max = signal.len() - 1;
    let mut i = 1;
    while i < i_max {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < i_max && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                candidates.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    candidates.retain(|&p| signal[p] >= height);
    if distance <= 1 || candidates.len() < 2 {
        return candidates;
    }

    // Visit the tallest first and knock out lower neighbours that are too close
    let mut keep = vec![true; candidates.len()];
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| signal[candidates[b]].total_cmp(&signal[candidates[a]]));

    for &idx in &order {
        if !keep[idx] {
            continue;
        }
        let peak = candidates[idx];
        for k in (0..idx).rev() {
            if peak - candidates[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in idx + 1..candidates.len() {
            if candidates[k] - peak >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(p))
        .collect()
}
