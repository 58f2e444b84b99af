use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::IdleMode;
use crate::monitor::diskstats::{DiskIoCounters, StatsSnapshot};

/// How a monitor decides that an idle disk is due for standby.
#[derive(Debug, Clone, Copy)]
enum IdlePolicy {
    /// Standby once counters have been stable for the whole window.
    Timeout { window: Duration, deadline: Instant },
    /// Standby on any poll whose counters match the previous poll.
    EveryPoll,
}

/// Per-disk idle tracker. Holds the last observed sector counters and
/// decides when the disk should be sent to standby. The actual standby
/// transition is the caller's job: `evaluate` never sets the flag itself.
pub struct DiskMonitor {
    name: String,
    path: PathBuf,
    counters: Option<DiskIoCounters>,
    policy: IdlePolicy,
    standby: bool,
    last_standby: Option<DateTime<Local>>,
}

impl DiskMonitor {
    /// `path` is kept verbatim for the standby command; the diskstats
    /// lookup key is the basename of the resolved path, so /dev/disk/by-id
    /// symlinks work.
    pub fn new(path: &Path, mode: IdleMode, timeout: Duration, now: Instant) -> Self {
        let policy = match mode {
            IdleMode::Timeout => IdlePolicy::Timeout {
                window: timeout,
                deadline: now + timeout,
            },
            IdleMode::EveryPoll => IdlePolicy::EveryPoll,
        };
        Self {
            name: canonical_name(path),
            path: path.to_path_buf(),
            counters: None,
            policy,
            standby: false,
            last_standby: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn is_standby(&self) -> bool {
        self.standby
    }

    pub fn last_standby(&self) -> Option<DateTime<Local>> {
        self.last_standby
    }

    /// Fold one snapshot into the tracker. Returns true when the caller
    /// should issue a standby command now.
    pub fn evaluate(&mut self, snapshot: &StatsSnapshot, now: Instant) -> bool {
        let Some(current) = snapshot.get(self.name.as_str()) else {
            warn!(device = %self.name, "no diskstats entry this cycle");
            return false;
        };
        let changed = self.counters != Some(*current);
        if changed {
            self.counters = Some(*current);
            if let IdlePolicy::Timeout { window, deadline } = &mut self.policy {
                *deadline = now + *window;
            }
            if self.standby {
                println!("{} resumed from standby", self.name);
                self.standby = false;
            }
            return false;
        }
        if self.standby {
            return false;
        }
        match self.policy {
            IdlePolicy::EveryPoll => true,
            IdlePolicy::Timeout { deadline, .. } => now >= deadline,
        }
    }

    /// Re-baseline after a standby command. The command itself takes time
    /// and may touch the counters, so the caller re-reads the statistics
    /// and hands the fresh snapshot here before marking the disk standing
    /// by. Unlike `evaluate` this never reports a resume.
    pub fn resync(&mut self, snapshot: &StatsSnapshot, now: Instant) {
        if let Some(current) = snapshot.get(self.name.as_str()) {
            self.counters = Some(*current);
        }
        if let IdlePolicy::Timeout { window, deadline } = &mut self.policy {
            *deadline = now + *window;
        }
    }

    /// Record that a standby command was issued. Called after the attempt
    /// regardless of its exit status; the next counter change clears the
    /// flag either way.
    pub fn standby_dispatched(&mut self, when: DateTime<Local>) {
        self.standby = true;
        self.last_standby = Some(when);
    }
}

fn canonical_name(path: &Path) -> String {
    let resolved = match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(device = %path.display(), "cannot resolve device path: {err}");
            path.to_path_buf()
        }
    };
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| resolved.to_string_lossy().into_owned())
}
