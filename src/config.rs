use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Block devices to watch, as given on the command line.
    pub devices: Vec<PathBuf>,
    /// Inactivity window before a disk is sent to standby.
    pub timeout: Duration,
    pub mode: IdleMode,
    /// hdparm -S value programmed into the drive firmware at startup.
    pub drive_standby: Option<u8>,
    /// Overrides the derived poll interval.
    pub poll_interval: Option<Duration>,
    /// Grace period before the first poll, for disks that enumerate late.
    pub warmup: Duration,
    pub diskstats: PathBuf,
    pub hdparm: PathBuf,
}

impl Config {
    /// Sample at 1% of the timeout, but never faster than once a second.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
            .unwrap_or_else(|| Duration::from_secs((self.timeout.as_secs() / 100).max(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleMode {
    /// Standby after the counters have been stable for the whole timeout.
    Timeout,
    /// Standby whenever a poll sees no I/O since the previous poll.
    EveryPoll,
}

impl std::str::FromStr for IdleMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timeout" | "deadline" => Ok(IdleMode::Timeout),
            "every-poll" | "everypoll" | "edge" => Ok(IdleMode::EveryPoll),
            _ => Err(anyhow::anyhow!(
                "Invalid idle mode: {}. Valid options: timeout, every-poll",
                s
            )),
        }
    }
}
