use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod envelope;

pub use envelope::{Code, Envelope, UnknownCode};

/// Free space of the root filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    /// Free space in MiB.
    pub free_size: f64,
    /// Free space as a percentage of the filesystem size.
    pub free_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTemperature {
    pub curr: f64,
    pub crit: f64,
}

/// Temperatures keyed by sensor label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorTemperatures(pub BTreeMap<String, SensorTemperature>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootTime {
    pub boot_time_str: String,
    pub boot_timestamp: i64,
    pub elapsed_seconds: f64,
    pub elapsed_readable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub load_01: f64,
    pub load_05: f64,
    pub load_15: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total memory, e.g. `"15923.45M"`.
    pub total: String,
    /// Used memory, same format as `total`.
    pub used: String,
    pub free_rate: f64,
}
