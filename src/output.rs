use crate::heart_analysis::HeartMeasures;
use crate::pipeline::Report;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// `<stem>_<recording>_<kind>.<ext>` next to the prefix
fn output_path(base_path: &str, recording: &str, kind: &str) -> Result<PathBuf> {
    let path = Path::new(base_path);
    let dir = path.parent().unwrap_or(Path::new("."));

    // Create directory if it doesn't exist
    std::fs::create_dir_all(dir)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");

    Ok(dir.join(format!("{}_{}_{}.{}", stem, recording, kind, ext)))
}

/// CSV sink for the periodic reports of one recording.
///
/// Undefined values are written as empty cells.
pub struct ReportWriter {
    start: DateTime<Utc>,
    sample_rate: f64,
    heart_rate: csv::Writer<File>,
    hrv: csv::Writer<File>,
}

impl ReportWriter {
    pub fn create(
        base_path: &str,
        recording: &str,
        start: DateTime<Utc>,
        sample_rate: f64,
    ) -> Result<Self> {
        let hr_path = output_path(base_path, recording, "heart_rate")?;
        let hrv_path = output_path(base_path, recording, "hrv")?;
        info!(
            "Writing results to {} and {}",
            hr_path.display(),
            hrv_path.display()
        );

        let mut heart_rate = csv::Writer::from_writer(File::create(hr_path)?);
        heart_rate.write_record(["timestamp", "elapsed_s", "bpm"])?;

        let mut hrv = csv::Writer::from_writer(File::create(hrv_path)?);
        hrv.write_record([
            "timestamp",
            "elapsed_s",
            "bpm",
            "ibi",
            "sdnn",
            "sdsd",
            "rmssd",
            "pnn20",
            "pnn50",
        ])?;

        Ok(Self {
            start,
            sample_rate,
            heart_rate,
            hrv,
        })
    }

    fn timestamps(&self, at_sample: u64) -> (String, String) {
        let elapsed = at_sample as f64 / self.sample_rate;
        let timestamp = self.start + Duration::milliseconds((elapsed * 1000.0).round() as i64);
        (
            timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.1}", elapsed),
        )
    }

    pub fn write(&mut self, report: &Report) -> Result<()> {
        match report {
            Report::HeartRate { at_sample, bpm } => {
                let (timestamp, elapsed) = self.timestamps(*at_sample);
                self.heart_rate.write_record([
                    timestamp,
                    elapsed,
                    bpm.map(|b| b.to_string()).unwrap_or_default(),
                ])?;
            }
            Report::Hrv {
                at_sample,
                measures,
            } => {
                let (timestamp, elapsed) = self.timestamps(*at_sample);
                let m = measures.unwrap_or_else(HeartMeasures::undefined);
                self.hrv.write_record([
                    timestamp,
                    elapsed,
                    format_optional(m.bpm),
                    format_optional(m.ibi),
                    format_optional(m.sdnn),
                    format_optional(m.sdsd),
                    format_optional(m.rmssd),
                    format_optional(m.pnn20),
                    format_optional(m.pnn50),
                ])?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.heart_rate.flush()?;
        self.hrv.flush()?;
        Ok(())
    }
}
