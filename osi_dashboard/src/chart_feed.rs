use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ChartSample {
    pub timestamp_ms: u64,
    pub value: f64,
}

/// Visual treatment of the trend line.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendStyle {
    #[default]
    Baseline,
    Incident,
}

/// Fixed-capacity FIFO window of latency samples for the trend chart.
#[derive(Debug, Clone)]
pub struct ChartFeed {
    samples: VecDeque<ChartSample>,
    capacity: usize,
    style: TrendStyle,
}

impl Default for ChartFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChartFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            style: TrendStyle::Baseline,
        }
    }

    /// Appends a sample. Values `<= 0` mean "timeout / no signal" and are dropped,
    /// as are non-finite values. Returns whether the buffer changed.
    pub fn push(&mut self, timestamp_ms: u64, value: f64) -> bool {
        if !value.is_finite() || value <= 0.0 {
            return false;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(ChartSample {
            timestamp_ms,
            value,
        });
        true
    }

    pub fn snapshot(&self) -> Vec<ChartSample> {
        self.samples.iter().copied().collect()
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

    pub fn style(&self) -> TrendStyle {
        self.style
    }

    pub fn set_style(&mut self, style: TrendStyle) {
        self.style = style;
    }

    pub fn latest(&self) -> Option<ChartSample> {
        self.samples.back().copied()
    }
}
