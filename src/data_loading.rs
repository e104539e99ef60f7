use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Streaming reader for recorder text output.
///
/// Every maximal run of ASCII digits is one sample; anything else (newlines,
/// commas, stray bytes from the serial link) only separates samples.
pub struct SampleReader<R> {
    inner: R,
    digits: String,
}

impl<R: BufRead> SampleReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            digits: String::new(),
        }
    }

    fn take_value(&mut self) -> Option<io::Result<f64>> {
        if self.digits.is_empty() {
            return None;
        }
        let parsed = self
            .digits
            .parse::<f64>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        self.digits.clear();
        Some(parsed)
    }
}

impl<R: BufRead> Iterator for SampleReader<R> {
    type Item = io::Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let buf = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            };
            if buf.is_empty() {
                // End of input flushes a trailing number without separator
                return self.take_value();
            }

            let mut consumed = 0;
            let mut complete = false;
            for &byte in buf {
                consumed += 1;
                if byte.is_ascii_digit() {
                    self.digits.push(byte as char);
                } else if !self.digits.is_empty() {
                    complete = true;
                    break;
                }
            }
            self.inner.consume(consumed);

            if complete {
                return self.take_value();
            }
        }
    }
}

/// Read a whole recording file into memory
pub fn read_recording(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let samples = SampleReader::new(BufReader::new(file))
        .collect::<io::Result<Vec<f64>>>()
        .with_context(|| format!("Failed to read samples from {}", path.display()))?;
    debug!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Recordings to replay: the file itself, or every `.txt` under a directory
/// in path order
pub fn find_recordings(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut recordings = Vec::new();
    for entry in WalkDir::new(input).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("txt")
        {
            recordings.push(path.to_path_buf());
        }
    }
    recordings.sort();

    info!(
        "Found {} recordings under {}",
        recordings.len(),
        input.display()
    );
    Ok(recordings)
}
