use serde::Serialize;

pub const DEFAULT_BUCKET_WIDTH: usize = 100;
/// Frames at or above this size share the last, open-ended bucket.
pub const DEFAULT_HISTOGRAM_LIMIT: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub lower: usize,
    /// Exclusive upper bound; `None` for the overflow bucket.
    pub upper: Option<usize>,
    pub count: u64,
}

/// Fixed-width frame size histogram with bounded memory.
#[derive(Debug, Clone)]
pub struct SizeHistogram {
    width: usize,
    counts: Vec<u64>,
}

impl Default for SizeHistogram {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_WIDTH, DEFAULT_HISTOGRAM_LIMIT)
    }
}

impl SizeHistogram {
    pub fn new(width: usize, limit: usize) -> Self {
        let width = width.max(1);
        let regular = limit.div_ceil(width);
        Self {
            width,
            counts: vec![0; regular + 1],
        }
    }

    pub fn record(&mut self, length: usize) {
        let last = self.counts.len() - 1;
        let idx = (length / self.width).min(last);
        self.counts[idx] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn buckets(&self) -> Vec<HistogramBucket> {
        let last = self.counts.len() - 1;
        self.counts
            .iter()
            .enumerate()
            .map(|(i, count)| HistogramBucket {
                lower: i * self.width,
                upper: (i < last).then_some((i + 1) * self.width),
                count: *count,
            })
            .collect()
    }
}
