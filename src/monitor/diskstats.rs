use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{MonitorError, Result};

/// Minimum column count for a diskstats line to be considered well-formed:
/// major, minor, name, reads, reads merged, sectors read, time reading,
/// writes, writes merged, sectors written, time writing. Newer kernels
/// append further columns; shorter lines are skipped.
const MIN_FIELDS: usize = 11;

const NAME_FIELD: usize = 2;
const SECTORS_READ_FIELD: usize = 5;
const SECTORS_WRITTEN_FIELD: usize = 9;

/// Cumulative sector counters for one block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIoCounters {
    pub sectors_read: u64,
    pub sectors_written: u64,
}

/// Point-in-time view of every device in the statistics file.
pub type StatsSnapshot = HashMap<String, DiskIoCounters>;

/// Reads per-device I/O counters from a diskstats-format file
/// (normally /proc/diskstats). The file is re-read in full on every poll.
pub struct StatsReader {
    path: PathBuf,
}

impl StatsReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<StatsSnapshot> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| MonitorError::Stats {
            path: self.path.clone(),
            source,
        })?;
        parse_diskstats(&contents)
    }
}

/// Parse diskstats contents into a snapshot. Lines with fewer than
/// [`MIN_FIELDS`] whitespace-separated fields are skipped; a non-numeric
/// value in a retained counter position fails the whole read.
pub fn parse_diskstats(contents: &str) -> Result<StatsSnapshot> {
    let mut snapshot = StatsSnapshot::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }
        let name = fields[NAME_FIELD];
        let counters = DiskIoCounters {
            sectors_read: parse_counter(name, "sectors read", fields[SECTORS_READ_FIELD])?,
            sectors_written: parse_counter(name, "sectors written", fields[SECTORS_WRITTEN_FIELD])?,
        };
        snapshot.insert(name.to_string(), counters);
    }
    Ok(snapshot)
}

fn parse_counter(device: &str, field: &'static str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| MonitorError::Parse {
        device: device.to_string(),
        field,
        value: value.to_string(),
    })
}
