use chrono::Local;
use std::time::{Duration, Instant};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::Result;
use crate::monitor::{DiskMonitor, StatsReader};
use crate::standby::StandbyController;

/// Owns the reader, the controller, and every disk's state, and drives
/// the sleep/snapshot/evaluate/dispatch cycle. Single-threaded by design:
/// one task mutates everything, so there is nothing to lock.
pub struct PollLoop {
    reader: StatsReader,
    controller: StandbyController,
    disks: Vec<DiskMonitor>,
    interval: Duration,
}

impl PollLoop {
    /// Build the loop: optional warm-up sleep, one initial snapshot to
    /// seed every disk's baseline, and the firmware standby timer if one
    /// was configured.
    pub async fn init(config: &Config) -> Result<Self> {
        if !config.warmup.is_zero() {
            println!(
                "Waiting {}s for the kernel to finish detecting drives",
                config.warmup.as_secs()
            );
            tokio::time::sleep(config.warmup).await;
        }

        let reader = StatsReader::new(config.diskstats.clone());
        let controller = StandbyController::new(config.hdparm.clone());
        let snapshot = reader.read()?;
        let now = Instant::now();

        let mut disks = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            if let Some(value) = config.drive_standby {
                if let Err(err) = controller.set_drive_timeout(device, value).await {
                    error!(device = %device.display(), "cannot set drive standby timer: {err}");
                }
            }
            let mut disk = DiskMonitor::new(device, config.mode, config.timeout, now);
            // Seed the baseline so a quiet disk is not declared idle on
            // counters it never reported.
            disk.evaluate(&snapshot, now);
            println!(
                "Monitoring {} ({}) with timeout {}s and drive-standby {}",
                disk.name(),
                device.display(),
                config.timeout.as_secs(),
                config
                    .drive_standby
                    .map_or_else(|| "off".to_string(), |v| v.to_string())
            );
            disks.push(disk);
        }

        Ok(Self {
            reader,
            controller,
            disks,
            interval: config.poll_interval(),
        })
    }

    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::time::sleep(self.interval).await;
            self.cycle().await;
        }
    }

    /// One poll: read a snapshot, evaluate every disk against it, dispatch
    /// standby where due. A failed read skips the cycle; the next one
    /// starts from scratch.
    pub async fn cycle(&mut self) {
        let snapshot = match self.reader.read() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!("skipping poll cycle: {err}");
                return;
            }
        };
        let now = Instant::now();
        for idx in 0..self.disks.len() {
            if self.disks[idx].evaluate(&snapshot, now) {
                self.dispatch(idx).await;
            }
        }
    }

    async fn dispatch(&mut self, idx: usize) {
        let disk = &self.disks[idx];
        match disk.last_standby() {
            Some(prev) => println!(
                "Sending {} to standby. Last standby was {}",
                disk.name(),
                prev.format("%a %b %e %H:%M:%S %Y")
            ),
            None => println!("Sending {} to standby", disk.name()),
        }
        if let Err(err) = self.controller.send_standby(disk.path()).await {
            error!(device = %disk.name(), "standby command failed: {err}");
        }
        // hdparm may have taken a while; re-read so any counter churn it
        // caused does not immediately re-trigger the timeout.
        match self.reader.read() {
            Ok(fresh) => self.disks[idx].resync(&fresh, Instant::now()),
            Err(err) => warn!("cannot re-read statistics after standby: {err}"),
        }
        self.disks[idx].standby_dispatched(Local::now());
    }

    #[cfg(test)]
    pub(crate) fn disks(&self) -> &[DiskMonitor] {
        &self.disks
    }
}
