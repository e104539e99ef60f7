use crate::error::ConfigError;
use std::collections::VecDeque;

/// Bounded FIFO of the most recent filtered samples.
///
/// Analysis is only allowed once `min_len` samples have been collected.
#[derive(Debug, Clone)]
pub struct SlidingBuffer {
    name: &'static str,
    samples: VecDeque<f64>,
    capacity: usize,
    min_len: usize,
}

impl SlidingBuffer {
    pub fn new(name: &'static str, capacity: usize, min_len: usize) -> Result<Self, ConfigError> {
        if capacity == 0 || min_len == 0 || min_len > capacity {
            return Err(ConfigError::InvalidBuffer {
                name,
                capacity,
                min_len,
            });
        }
        Ok(Self {
            name,
            samples: VecDeque::with_capacity(capacity),
            capacity,
            min_len,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.min_len
    }

    /// Oldest-first view of the buffered samples as one slice
    pub fn as_contiguous(&mut self) -> &[f64] {
        self.samples.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        self.samples.iter()
    }
}
