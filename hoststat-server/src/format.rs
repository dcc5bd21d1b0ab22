/// Time units used by [`format_elapsed`], largest first.
const UNITS: [(char, u64); 5] = [
    ('w', 604_800),
    ('d', 86_400),
    ('h', 3_600),
    ('m', 60),
    ('s', 1),
];

/// Maximum number of tokens in a formatted duration.
const MAX_TOKENS: usize = 3;

/// One non-zero unit of time, e.g. `3h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub count: u64,
    pub unit: char,
    /// Length of one unit in seconds.
    pub unit_secs: u64,
}

impl Bucket {
    pub fn seconds(&self) -> u64 {
        self.count * self.unit_secs
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.unit)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let multiplier = 10f64.powi(decimals);
    (value * multiplier).round() / multiplier
}

/// Split `seconds` into every non-zero bucket, largest unit first.
///
/// Fractions of a second are dropped. Negative and non-finite inputs count as
/// zero.
pub fn elapsed_buckets(seconds: f64) -> Vec<Bucket> {
    // `as` saturates, and NaN maps to 0
    let mut remaining = seconds.max(0.0) as u64;

    UNITS
        .iter()
        .filter_map(|&(unit, unit_secs)| {
            let count = remaining / unit_secs;
            remaining -= count * unit_secs;
            (count > 0).then_some(Bucket {
                count,
                unit,
                unit_secs,
            })
        })
        .collect()
}

/// Human readable duration such as `"2w 3d 4h"`, keeping at most the three
/// largest non-zero units. Returns an empty string below one second.
pub fn format_elapsed(seconds: f64) -> String {
    elapsed_buckets(seconds)
        .iter()
        .take(MAX_TOKENS)
        .map(Bucket::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
