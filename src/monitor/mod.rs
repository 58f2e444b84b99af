pub mod diskstats;
pub mod idle;

pub use diskstats::{DiskIoCounters, StatsReader, StatsSnapshot};
pub use idle::DiskMonitor;
