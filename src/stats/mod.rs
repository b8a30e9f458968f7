mod histogram;
mod rate;

pub use histogram::{DEFAULT_BUCKET_WIDTH, DEFAULT_HISTOGRAM_LIMIT, HistogramBucket, SizeHistogram};
pub use rate::{DEFAULT_MIN_RATE_WINDOW, RateSample, StatsSnapshot, TrafficStats};
