use std::{collections::BTreeMap, path::Path, str::FromStr};

use hoststat_proto::{
    BootTime, DiskUsage, LoadAverage, MemoryInfo, SensorTemperature, SensorTemperatures,
};
use serde::Serialize;
use sysinfo::{Components, Disks, System};
use time::{OffsetDateTime, UtcOffset, macros::format_description};
use tracing::warn;

use crate::format::{format_elapsed, round_to};

const MIB: f64 = 1024.0 * 1024.0;
const ROOT_MOUNT_POINT: &str = "/";

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("no disk mounted at {0}")]
    DiskNotFound(&'static str),
    #[error("disk mounted at {0} reports zero size")]
    EmptyDisk(&'static str),
    #[error("no temperature sensors found")]
    NoSensors,
    #[error("boot time unavailable")]
    BootTimeUnavailable,
    #[error("invalid boot time: {0}")]
    InvalidBootTime(#[from] time::error::ComponentRange),
    #[error("failed to format boot time: {0}")]
    FormatBootTime(#[from] time::error::Format),
    #[error("load average is not supported on this platform")]
    LoadAverageUnsupported,
    #[error("memory information unavailable")]
    MemoryUnavailable,
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The fixed set of statistics served under `/stats/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    DiskUsage,
    Temperatures,
    BootTime,
    LoadAverage,
    Memory,
}

impl FromStr for StatKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "du" | "disk_usage" => Ok(StatKind::DiskUsage),
            "temps" | "sensors_temp" => Ok(StatKind::Temperatures),
            "boot_time" => Ok(StatKind::BootTime),
            "load_avg" => Ok(StatKind::LoadAverage),
            "mem" | "mem_info" => Ok(StatKind::Memory),
            _ => Err(()),
        }
    }
}

impl StatKind {
    /// Run the collector behind this kind. Each call queries the OS afresh.
    pub fn query(self, boot_offset: UtcOffset) -> Result<Reading, QueryError> {
        let reading = match self {
            StatKind::DiskUsage => query_disk_usage().map(Reading::DiskUsage),
            StatKind::Temperatures => query_temperatures().map(Reading::Temperatures),
            StatKind::BootTime => query_boot_time(boot_offset).map(Reading::BootTime),
            StatKind::LoadAverage => query_load_average().map(Reading::LoadAverage),
            StatKind::Memory => query_memory().map(Reading::Memory),
        };
        reading.inspect_err(|e| warn!(kind = ?self, error = %e, "query failed"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    DiskUsage(DiskUsage),
    Temperatures(SensorTemperatures),
    BootTime(BootTime),
    LoadAverage(LoadAverage),
    Memory(MemoryInfo),
}

fn query_disk_usage() -> Result<DiskUsage, QueryError> {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new(ROOT_MOUNT_POINT))
        .ok_or(QueryError::DiskNotFound(ROOT_MOUNT_POINT))?;

    disk_usage(root.total_space(), root.available_space())
        .ok_or(QueryError::EmptyDisk(ROOT_MOUNT_POINT))
}

fn disk_usage(total: u64, available: u64) -> Option<DiskUsage> {
    if total == 0 {
        return None;
    }
    let used_percent = total.saturating_sub(available) as f64 / total as f64 * 100.0;
    Some(DiskUsage {
        free_size: round_to(available as f64 / MIB, 2),
        free_rate: round_to(100.0 - used_percent, 2),
    })
}

fn query_temperatures() -> Result<SensorTemperatures, QueryError> {
    let components = Components::new_with_refreshed_list();
    sensor_temperatures(components.list().iter().map(|component| {
        (
            component.label(),
            component.temperature(),
            component.critical(),
        )
    }))
}

/// Maps `(label, current, critical)` sensor readings. Sensors without a
/// current reading are skipped, a missing critical threshold becomes `0` and a
/// repeated label keeps its last reading.
fn sensor_temperatures<'a>(
    readings: impl IntoIterator<Item = (&'a str, Option<f32>, Option<f32>)>,
) -> Result<SensorTemperatures, QueryError> {
    let temps = readings
        .into_iter()
        .filter_map(|(label, curr, crit)| {
            Some((
                label.to_owned(),
                SensorTemperature {
                    curr: round_to(curr? as f64, 2),
                    crit: round_to(crit.unwrap_or(0.0) as f64, 2),
                },
            ))
        })
        .collect::<BTreeMap<_, _>>();

    if temps.is_empty() {
        return Err(QueryError::NoSensors);
    }
    Ok(SensorTemperatures(temps))
}

/// Boot time as a unix timestamp, `None` when the platform reports none.
fn boot_timestamp(raw: u64) -> Option<i64> {
    i64::try_from(raw).ok().filter(|&ts| ts > 0)
}

/// Local UTC offset in force when the host booted, falling back to the
/// current one when the boot time is unknown.
///
/// Only sound while the process is single threaded.
pub fn boot_local_offset() -> Result<UtcOffset, time::error::IndeterminateOffset> {
    match boot_timestamp(System::boot_time())
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
    {
        Some(booted_at) => UtcOffset::local_offset_at(booted_at),
        None => UtcOffset::current_local_offset(),
    }
}

fn query_boot_time(boot_offset: UtcOffset) -> Result<BootTime, QueryError> {
    boot_time(System::boot_time(), OffsetDateTime::now_utc(), boot_offset)
}

fn boot_time(
    raw_boot_time: u64,
    now: OffsetDateTime,
    boot_offset: UtcOffset,
) -> Result<BootTime, QueryError> {
    let boot_timestamp = boot_timestamp(raw_boot_time).ok_or(QueryError::BootTimeUnavailable)?;
    let booted_at = OffsetDateTime::from_unix_timestamp(boot_timestamp)?;
    let elapsed_seconds = (now - booted_at).as_seconds_f64();

    Ok(BootTime {
        boot_time_str: booted_at
            .to_offset(boot_offset)
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))?,
        boot_timestamp,
        elapsed_seconds: round_to(elapsed_seconds, 2),
        elapsed_readable: format_elapsed(elapsed_seconds),
    })
}

fn query_load_average() -> Result<LoadAverage, QueryError> {
    if cfg!(windows) || !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(QueryError::LoadAverageUnsupported);
    }
    let load = System::load_average();
    Ok(LoadAverage {
        load_01: round_to(load.one, 2),
        load_05: round_to(load.five, 2),
        load_15: round_to(load.fifteen, 2),
    })
}

fn query_memory() -> Result<MemoryInfo, QueryError> {
    let mut system = System::new();
    system.refresh_memory();
    memory_info(system.total_memory(), system.used_memory()).ok_or(QueryError::MemoryUnavailable)
}

fn memory_info(total: u64, used: u64) -> Option<MemoryInfo> {
    if total == 0 {
        return None;
    }
    let used_percent = used as f64 / total as f64 * 100.0;
    Some(MemoryInfo {
        total: format!("{:.2}M", total as f64 / MIB),
        used: format!("{:.2}M", used as f64 / MIB),
        free_rate: round_to(100.0 - used_percent, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn parse_stat_kinds() {
        assert_eq!("du".parse(), Ok(StatKind::DiskUsage));
        assert_eq!("disk_usage".parse(), Ok(StatKind::DiskUsage));
        assert_eq!("temps".parse(), Ok(StatKind::Temperatures));
        assert_eq!("sensors_temp".parse(), Ok(StatKind::Temperatures));
        assert_eq!("boot_time".parse(), Ok(StatKind::BootTime));
        assert_eq!("load_avg".parse(), Ok(StatKind::LoadAverage));
        assert_eq!("mem".parse(), Ok(StatKind::Memory));
        assert_eq!("mem_info".parse(), Ok(StatKind::Memory));

        assert_eq!("".parse::<StatKind>(), Err(()));
        assert_eq!("MEM".parse::<StatKind>(), Err(()));
        assert_eq!("mem/".parse::<StatKind>(), Err(()));
    }

    #[test]
    fn test_disk_usage() {
        // 100 GiB disk with 25 GiB available
        let usage = disk_usage(100 * 1024 * MIB as u64, 25 * 1024 * MIB as u64).unwrap();

        assert_eq!(usage.free_size, 25_600.0);
        assert_eq!(usage.free_rate, 25.0);
        assert!(disk_usage(0, 0).is_none());
    }

    #[test]
    fn test_memory_info() {
        let info = memory_info(8 * 1024 * MIB as u64, 3 * 1024 * MIB as u64 / 2).unwrap();

        assert_eq!(info.total, "8192.00M");
        assert_eq!(info.used, "1536.00M");
        assert_eq!(info.free_rate, 81.25);
        assert!(memory_info(0, 0).is_none());
    }

    #[test]
    fn test_boot_time() {
        let now = datetime!(2024-01-02 02:03:04.5 UTC);
        let booted = datetime!(2024-01-01 00:00:00 UTC).unix_timestamp();

        let boot = boot_time(booted as u64, now, offset!(+8)).unwrap();

        assert_eq!(boot.boot_time_str, "2024-01-01 08:00:00");
        assert_eq!(boot.boot_timestamp, booted);
        assert_eq!(boot.elapsed_seconds, 93_784.5);
        assert_eq!(boot.elapsed_readable, "1d 2h 3m");
    }

    #[test]
    fn test_boot_time_out_of_range() {
        let res = boot_time(i64::MAX as u64, OffsetDateTime::now_utc(), UtcOffset::UTC);

        assert!(matches!(res, Err(QueryError::InvalidBootTime(_))));
    }

    #[test]
    fn test_boot_time_unavailable() {
        for raw in [0, u64::MAX] {
            let res = boot_time(raw, OffsetDateTime::now_utc(), UtcOffset::UTC);

            assert!(
                matches!(res, Err(QueryError::BootTimeUnavailable)),
                "raw boot time {raw}"
            );
        }
        assert_eq!(boot_timestamp(0), None);
        assert_eq!(boot_timestamp(1_700_000_000), Some(1_700_000_000));
    }

    #[test]
    fn test_boot_time_uses_offset_at_boot() {
        // booted in winter (+01:00), queried in summer
        let booted = datetime!(2024-01-15 11:00:00 UTC).unix_timestamp();
        let now = datetime!(2024-07-01 00:00:00 UTC);

        let boot = boot_time(booted as u64, now, offset!(+1)).unwrap();

        assert_eq!(boot.boot_time_str, "2024-01-15 12:00:00");
    }

    #[test]
    fn test_boot_local_offset() {
        // indeterminate while the test harness runs other threads
        if let Ok(offset) = boot_local_offset() {
            assert!(offset.whole_hours().abs() <= 25);
        }
    }

    #[test]
    fn test_sensor_temperatures() {
        let temps = sensor_temperatures([
            ("coretemp Core 0", Some(45.678), Some(100.0)),
            ("acpitz", Some(27.8), None),
            ("nvme Composite", None, Some(84.85)),
        ])
        .unwrap();

        assert_eq!(
            temps.0.get("coretemp Core 0"),
            Some(&SensorTemperature {
                curr: 45.68,
                crit: 100.0
            })
        );
        assert_eq!(temps.0.get("acpitz").map(|t| t.crit), Some(0.0));
        assert!(!temps.0.contains_key("nvme Composite"));
        assert_eq!(temps.0.len(), 2);
    }

    #[test]
    fn test_sensor_temperatures_last_label_wins() {
        let temps = sensor_temperatures([
            ("k10temp Tctl", Some(40.0), Some(95.0)),
            ("k10temp Tctl", Some(52.5), Some(90.0)),
        ])
        .unwrap();

        assert_eq!(
            temps.0.get("k10temp Tctl"),
            Some(&SensorTemperature {
                curr: 52.5,
                crit: 90.0
            })
        );
    }

    #[test]
    fn test_sensor_temperatures_empty() {
        assert!(matches!(
            sensor_temperatures(Vec::<(&str, Option<f32>, Option<f32>)>::new()),
            Err(QueryError::NoSensors)
        ));
        assert!(matches!(
            sensor_temperatures([("acpitz", None, None)]),
            Err(QueryError::NoSensors)
        ));
    }

    #[test]
    fn test_query_disk_usage() {
        println!("{:?}", query_disk_usage());
    }

    #[test]
    fn test_query_temperatures() {
        println!("{:?}", query_temperatures());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_query_boot_time() {
        let boot = query_boot_time(UtcOffset::UTC).expect("Failed to query boot time");

        assert!(boot.elapsed_seconds > 0.0);
        println!("{:?}", boot);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_query_load_average() {
        let load = query_load_average().expect("Failed to query load average");

        assert!(load.load_01 >= 0.0);
        println!("{:?}", load);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_query_memory() {
        let memory = query_memory().expect("Failed to query memory");

        assert!(memory.total.ends_with('M'));
        assert!((0.0..=100.0).contains(&memory.free_rate));
        println!("{:?}", memory);
    }
}
