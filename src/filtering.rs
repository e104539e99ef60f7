use crate::error::ConfigError;
use log::{debug, trace};
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos, SosFormatFilter,
};
use sci_rs::signal::filter::{sosfilt_dyn, sosfilt_zi_dyn};

/// Frequency band of a Butterworth stage, cutoffs in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Highpass(f64),
    Bandstop(f64, f64),
    Lowpass(f64),
}

impl Band {
    fn cutoffs(&self) -> Vec<f64> {
        match *self {
            Band::Highpass(fc) | Band::Lowpass(fc) => vec![fc],
            Band::Bandstop(low, high) => vec![low, high],
        }
    }

    fn highest_cutoff(&self) -> f64 {
        match *self {
            Band::Highpass(fc) | Band::Lowpass(fc) => fc,
            Band::Bandstop(low, high) => low.max(high),
        }
    }

    fn band_type(&self) -> FilterBandType {
        match self {
            Band::Highpass(_) => FilterBandType::Highpass,
            Band::Bandstop(..) => FilterBandType::Bandstop,
            Band::Lowpass(_) => FilterBandType::Lowpass,
        }
    }
}

/// Order and band of one stage in the cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDesign {
    pub name: &'static str,
    pub order: usize,
    pub band: Band,
}

/// Baseline wander, powerline interference, then high-frequency noise
pub const ECG_CASCADE: [FilterDesign; 3] = [
    FilterDesign {
        name: "highpass",
        order: 2,
        band: Band::Highpass(0.5),
    },
    FilterDesign {
        name: "bandstop",
        order: 5,
        band: Band::Bandstop(49.0, 51.0),
    },
    FilterDesign {
        name: "lowpass",
        order: 10,
        band: Band::Lowpass(40.0),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Warmup {
    /// No sample seen yet; delay line is still empty
    Cold,
    Running,
}

/// One causal Butterworth filter held as second-order sections.
///
/// Each section carries its own delay line (`zi0`, `zi1`), which persists
/// across calls. The unit-step steady state of those delay lines is computed
/// once at design time; the first sample the filter sees scales it, which
/// suppresses the start-up transient a cold delay line would produce.
#[derive(Debug, Clone)]
pub struct IirFilter {
    name: &'static str,
    sections: Vec<Sos<f64>>,
    steady_state: Vec<(f64, f64)>,
    warmup: Warmup,
}

impl IirFilter {
    pub fn design(design: &FilterDesign, sample_rate: f64) -> Result<Self, ConfigError> {
        validate_sample_rate(sample_rate)?;

        let nyquist = sample_rate / 2.0;
        let cutoff = design.band.highest_cutoff();
        if cutoff >= nyquist || cutoff <= 0.0 {
            return Err(ConfigError::CutoffAboveNyquist {
                filter: design.name,
                cutoff_hz: cutoff,
                nyquist_hz: nyquist,
            });
        }

        let filter = butter_dyn(
            design.order,
            design.band.cutoffs(),
            Some(design.band.band_type()),
            Some(false),
            Some(FilterOutputType::Sos),
            Some(sample_rate),
        );
        let DigitalFilter::Sos(SosFormatFilter { mut sos, .. }) = filter else {
            return Err(ConfigError::FilterDesign(design.name));
        };

        // Steady state for a unit step, kept aside until the first sample arrives
        sosfilt_zi_dyn::<_, _, f64>(sos.iter_mut());
        let steady_state = sos.iter().map(|s| (s.zi0, s.zi1)).collect();
        for section in sos.iter_mut() {
            section.zi0 = 0.0;
            section.zi1 = 0.0;
        }

        debug!(
            "Designed {} (order {}, {:?}) as {} sections at {} Hz",
            design.name,
            design.order,
            design.band,
            sos.len(),
            sample_rate
        );

        Ok(Self {
            name: design.name,
            sections: sos,
            steady_state,
            warmup: Warmup::Cold,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_warm(&self) -> bool {
        self.warmup == Warmup::Running
    }

    /// Load the delay lines with the steady state for a constant input `x`.
    fn warm_up(&mut self, x: f64) {
        for (section, &(zi0, zi1)) in self.sections.iter_mut().zip(&self.steady_state) {
            section.zi0 = zi0 * x;
            section.zi1 = zi1 * x;
        }
        self.warmup = Warmup::Running;
        trace!("{} warmed up from first sample {}", self.name, x);
    }

    /// Single-step transposed direct form II update through every section.
    pub fn process_sample(&mut self, x: f64) -> f64 {
        if self.warmup == Warmup::Cold {
            self.warm_up(x);
        }

        let mut y = x;
        for s in self.sections.iter_mut() {
            let out = s.b[0] * y + s.zi0;
            s.zi0 = s.b[1] * y - s.a[1] * out + s.zi1;
            s.zi1 = s.b[2] * y - s.a[2] * out;
            y = out;
        }
        y
    }

    /// Filter a whole block in one call, continuing from the current state.
    pub fn process_block(&mut self, samples: &[f64]) -> Vec<f64> {
        let Some(&first) = samples.first() else {
            return Vec::new();
        };
        if self.warmup == Warmup::Cold {
            self.warm_up(first);
        }
        sosfilt_dyn(samples.iter(), &mut self.sections)
    }
}

/// Highpass, bandstop and lowpass stages applied in that order
#[derive(Debug, Clone)]
pub struct FilterBank {
    sample_rate: f64,
    stages: Vec<IirFilter>,
}

impl FilterBank {
    /// Design the standard ECG cascade for `sample_rate`.
    ///
    /// Fails if any cutoff is at or above the Nyquist frequency.
    pub fn new(sample_rate: f64) -> Result<Self, ConfigError> {
        Self::with_designs(sample_rate, &ECG_CASCADE)
    }

    pub fn with_designs(sample_rate: f64, designs: &[FilterDesign]) -> Result<Self, ConfigError> {
        validate_sample_rate(sample_rate)?;
        let stages = designs
            .iter()
            .map(|design| IirFilter::design(design, sample_rate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sample_rate,
            stages,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn stages(&self) -> &[IirFilter] {
        &self.stages
    }

    pub fn process_sample(&mut self, x: f64) -> f64 {
        self.stages
            .iter_mut()
            .fold(x, |acc, stage| stage.process_sample(acc))
    }

    /// Run the whole block through each stage in turn.
    pub fn process_block(&mut self, samples: &[f64]) -> Vec<f64> {
        let mut signal = samples.to_vec();
        for stage in self.stages.iter_mut() {
            signal = stage.process_block(&signal);
        }
        signal
    }
}

/// Offline filtering of a whole recording with a freshly designed cascade.
pub fn filter_batch(sample_rate: f64, samples: &[f64]) -> Result<Vec<f64>, ConfigError> {
    let mut bank = FilterBank::new(sample_rate)?;
    Ok(bank.process_block(samples))
}

fn validate_sample_rate(sample_rate: f64) -> Result<(), ConfigError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSampleRate(sample_rate))
    }
}
