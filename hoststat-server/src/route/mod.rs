mod stats;

pub use stats::{STATS_PREFIX, stats};
