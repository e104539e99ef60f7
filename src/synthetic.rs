//! Deterministic synthetic ECG, used to exercise the pipeline without a device.
//!
//! Each beat is a sum of Gaussian waves (P, Q, R, S, T) placed relative to the
//! R-peak, riding on a constant ADC baseline.

/// (offset from R in seconds, width in seconds, amplitude relative to R)
const WAVES: [(f64, f64, f64); 5] = [
    (-0.200, 0.025, 0.12),  // P
    (-0.025, 0.008, -0.15), // Q
    (0.000, 0.012, 1.00),   // R
    (0.025, 0.008, -0.25),  // S
    (0.250, 0.040, 0.30),   // T
];

/// Default R amplitude in ADC counts
pub const DEFAULT_AMPLITUDE: f64 = 1000.0;
/// Mid-scale of a 12-bit converter
pub const DEFAULT_BASELINE: f64 = 2048.0;

/// Periodic ECG with a fixed beat interval
#[derive(Debug, Clone)]
pub struct SyntheticEcg {
    sample_rate: f64,
    beat_interval: usize,
    first_beat: usize,
    amplitude: f64,
    baseline: f64,
}

impl SyntheticEcg {
    /// A signal at `bpm` whose first R-peak sits half an interval in, so the
    /// recording starts on the baseline.
    pub fn new(sample_rate: f64, bpm: f64) -> Self {
        let beat_interval = ((sample_rate * 60.0 / bpm).round() as usize).max(1);
        Self::with_interval(sample_rate, beat_interval)
    }

    pub fn with_interval(sample_rate: f64, beat_interval: usize) -> Self {
        Self {
            sample_rate,
            beat_interval,
            first_beat: beat_interval / 2,
            amplitude: DEFAULT_AMPLITUDE,
            baseline: DEFAULT_BASELINE,
        }
    }

    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn beat_interval(&self) -> usize {
        self.beat_interval
    }

    /// Sample indices of every R-peak in a signal of `len` samples
    pub fn r_peaks(&self, len: usize) -> Vec<usize> {
        (self.first_beat..len).step_by(self.beat_interval).collect()
    }

    pub fn generate(&self, len: usize) -> Vec<f64> {
        let mut signal = vec![self.baseline; len];
        // Waves reach at most ~0.45 s away from their R-peak
        let reach = (0.45 * self.sample_rate).ceil() as usize;
        let mut r = self.first_beat;
        while r < len + reach {
            let start = r.saturating_sub(reach);
            let end = (r + reach + 1).min(len);
            for (i, value) in signal.iter_mut().enumerate().take(end).skip(start) {
                let t = (i as f64 - r as f64) / self.sample_rate;
                *value += self.amplitude * beat_at(t);
            }
            r += self.beat_interval;
        }
        signal
    }
}

/// Normalised single-beat waveform at time `t` seconds from the R-peak
fn beat_at(t: f64) -> f64 {
    WAVES
        .iter()
        .map(|&(offset, width, amplitude)| {
            let z = (t - offset) / width;
            amplitude * (-0.5 * z * z).exp()
        })
        .sum()
}

/// One beat of `duration` seconds with its R-peak `r_offset` seconds in,
/// sampled at `sample_rate`.
pub fn beat_template(sample_rate: f64, duration: f64, r_offset: f64) -> Vec<f64> {
    let len = (duration * sample_rate).round() as usize;
    (0..len)
        .map(|i| beat_at(i as f64 / sample_rate - r_offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_peaks_are_the_maxima() {
        let ecg = SyntheticEcg::with_interval(200.0, 200);
        let signal = ecg.generate(1000);
        let peaks = ecg.r_peaks(signal.len());
        assert_eq!(peaks, vec![100, 300, 500, 700, 900]);
        for &p in &peaks {
            let local = &signal[p - 20..p + 20];
            let max = local.iter().cloned().fold(f64::MIN, f64::max);
            assert_eq!(signal[p], max);
        }
    }

    #[test]
    fn starts_on_baseline() {
        let signal = SyntheticEcg::new(200.0, 60.0).generate(10);
        assert!((signal[0] - DEFAULT_BASELINE).abs() < 1e-6);
    }

    #[test]
    fn template_peaks_at_r_offset() {
        let template = beat_template(200.0, 0.65, 0.25);
        assert_eq!(template.len(), 130);
        let argmax = template
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(argmax, Some(50));
    }
}
