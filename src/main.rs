use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;
use ecg_monitor::config::Args;
use ecg_monitor::data_loading::{find_recordings, SampleReader};
use ecg_monitor::output::ReportWriter;
use ecg_monitor::pipeline::{EcgPipeline, Report};
use ecg_monitor::synthetic::SyntheticEcg;
use ecg_monitor::units::convert_units_to_volts;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

enum Source {
    Synthetic { seconds: f64, bpm: f64 },
    Stdin,
    File(PathBuf),
}

impl Source {
    fn name(&self) -> String {
        match self {
            Source::Synthetic { .. } => "synthetic".to_string(),
            Source::Stdin => "stdin".to_string(),
            Source::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("recording")
                .to_string(),
        }
    }
}

fn collect_sources(args: &Args) -> Result<Vec<Source>> {
    if let Some(seconds) = args.synthetic_seconds {
        return Ok(vec![Source::Synthetic {
            seconds,
            bpm: args.synthetic_bpm,
        }]);
    }
    match &args.input_path {
        None => Ok(vec![Source::Stdin]),
        Some(path) if path == Path::new("-") => Ok(vec![Source::Stdin]),
        Some(path) => Ok(find_recordings(path)?
            .into_iter()
            .map(Source::File)
            .collect()),
    }
}

fn parse_start_time(start_time: Option<&str>) -> Result<DateTime<Utc>> {
    match start_time {
        Some(s) => {
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .with_context(|| format!("Invalid start time '{}'", s))?;
            Ok(naive.and_utc())
        }
        None => Ok(Utc::now()),
    }
}

/// Smallest and largest displayed amplitude seen during a replay
#[derive(Debug, Default)]
struct AmplitudeRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl AmplitudeRange {
    fn update(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }
}

fn replay(
    args: &Args,
    name: &str,
    samples: impl Iterator<Item = io::Result<f64>>,
    start: DateTime<Utc>,
) -> Result<()> {
    let config = args.analysis_config();
    let sample_rate = config.sample_rate;
    let mut pipeline = EcgPipeline::new(config)
        .with_context(|| format!("Invalid configuration for {}", name))?;

    let mut writer = match &args.csv_output {
        Some(prefix) => Some(ReportWriter::create(prefix, name, start, sample_rate)?),
        None => None,
    };

    let mut range = AmplitudeRange::default();
    let mut defined_hrv = 0usize;
    for sample in samples {
        let raw = sample.with_context(|| format!("Failed to read sample from {}", name))?;
        let step = pipeline.step(raw);
        range.update(step.reading.displayed());

        for report in &step.reports {
            match report {
                Report::HeartRate { at_sample, bpm } => match bpm {
                    Some(bpm) => info!(
                        "[{}] {:.0}s: {} bpm",
                        name,
                        *at_sample as f64 / sample_rate,
                        bpm
                    ),
                    None => debug!("[{}] sample {}: no heart rate", name, at_sample),
                },
                Report::Hrv {
                    at_sample,
                    measures,
                } => {
                    match measures.filter(|m| m.is_defined()) {
                        Some(m) => {
                            defined_hrv += 1;
                            info!(
                                "[{}] {:.0}s: HRV ibi {:.1} ms, sdnn {:.1} ms, rmssd {:.1} ms",
                                name,
                                *at_sample as f64 / sample_rate,
                                m.ibi.unwrap_or_default(),
                                m.sdnn.unwrap_or_default(),
                                m.rmssd.unwrap_or_default()
                            );
                        }
                        None => warn!("[{}] sample {}: too few beats for HRV", name, at_sample),
                    }
                    if args.json {
                        println!("{}", serde_json::to_string(report)?);
                    }
                }
            }
            if let Some(writer) = writer.as_mut() {
                writer.write(report)?;
            }
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.flush()?;
    }

    info!(
        "[{}] {} samples, {} HRV windows with results",
        name,
        pipeline.ingested(),
        defined_hrv
    );
    if let (Some(min), Some(max)) = (range.min, range.max) {
        info!(
            "[{}] {:?} amplitude range: {:.4} V to {:.4} V",
            name,
            pipeline.settings().display,
            convert_units_to_volts(min, args.adc_resolution, args.max_voltage),
            convert_units_to_volts(max, args.adc_resolution, args.max_voltage)
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let start = parse_start_time(args.start_time.as_deref())?;
    let sources = collect_sources(&args)?;
    if sources.is_empty() {
        warn!("No recordings found");
    }

    for source in sources {
        let name = source.name();
        match source {
            Source::Synthetic { seconds, bpm } => {
                let fs = args.sample_rate;
                let len = (seconds * fs).round().max(0.0) as usize;
                info!("Replaying {:.1}s of synthetic ECG at {} bpm", seconds, bpm);
                let signal = SyntheticEcg::new(fs, bpm).generate(len);
                replay(&args, &name, signal.into_iter().map(Ok), start)?;
            }
            Source::Stdin => {
                info!("Reading samples from stdin");
                let stdin = io::stdin();
                replay(&args, &name, SampleReader::new(stdin.lock()), start)?;
            }
            Source::File(path) => {
                info!("Replaying {}", path.display());
                let file = File::open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                replay(&args, &name, SampleReader::new(BufReader::new(file)), start)?;
            }
        }
    }

    Ok(())
}
