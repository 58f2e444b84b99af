use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{MonitorError, Result};

/// Hard bound on a single hdparm invocation. A hung command stalls the
/// whole loop until this expires; the workload is low-frequency enough
/// that this is acceptable.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Issues power commands to a disk through an external hdparm-compatible
/// executable. Failures are reported, never retried; the next poll cycle
/// re-evaluates the disk anyway.
pub struct StandbyController {
    hdparm: PathBuf,
    command_timeout: Duration,
}

impl StandbyController {
    pub fn new(hdparm: PathBuf) -> Self {
        Self {
            hdparm,
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(hdparm: PathBuf, command_timeout: Duration) -> Self {
        Self {
            hdparm,
            command_timeout,
        }
    }

    /// hdparm -y: put the drive into standby now.
    pub async fn send_standby(&self, device: &Path) -> Result<()> {
        self.run(&[OsString::from("-y"), device.as_os_str().to_os_string()])
            .await
    }

    /// hdparm -S: program the drive's own auto-standby timer. This is the
    /// firmware-side timer, independent of the polling timeout.
    pub async fn set_drive_timeout(&self, device: &Path, value: u8) -> Result<()> {
        self.run(&[
            OsString::from("-S"),
            OsString::from(value.to_string()),
            device.as_os_str().to_os_string(),
        ])
        .await
    }

    async fn run(&self, args: &[OsString]) -> Result<()> {
        let command = self.render(args);
        // kill_on_drop: a command that outlives the timeout is killed, not
        // left running against the disk.
        let output = tokio::time::timeout(
            self.command_timeout,
            Command::new(&self.hdparm)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| MonitorError::CommandTimeout {
            command: command.clone(),
            secs: self.command_timeout.as_secs(),
        })?
        .map_err(|source| MonitorError::CommandSpawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(MonitorError::CommandFailed {
                command,
                status: output.status,
                output: merge_output(&output.stdout, &output.stderr),
            });
        }
        Ok(())
    }

    fn render(&self, args: &[OsString]) -> String {
        let mut rendered = self.hdparm.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut merged = String::from_utf8_lossy(stdout).trim().to_string();
    let err = String::from_utf8_lossy(stderr);
    let err = err.trim();
    if !err.is_empty() {
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(err);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    // Closing the write handle matters: exec of a script still open for
    // writing fails with ETXTBSY.
    fn stub_script(body: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.as_file().metadata().unwrap().permissions();
        perms.set_mode(0o755);
        file.as_file().set_permissions(perms).unwrap();
        file.into_temp_path()
    }

    #[tokio::test]
    async fn send_standby_succeeds_with_zero_exit() {
        let controller = StandbyController::new(PathBuf::from("true"));
        controller
            .send_standby(Path::new("/dev/null"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_reports_status_and_output() {
        let script = stub_script("echo drive is busy\nexit 5");
        let controller = StandbyController::new(script.to_path_buf());
        let err = controller
            .send_standby(Path::new("/dev/sda"))
            .await
            .unwrap_err();
        match err {
            MonitorError::CommandFailed { command, status, output } => {
                assert!(command.ends_with("-y /dev/sda"));
                assert_eq!(status.code(), Some(5));
                assert_eq!(output, "drive is busy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let controller = StandbyController::new(PathBuf::from("/nonexistent/hdparm"));
        let err = controller
            .send_standby(Path::new("/dev/sda"))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::CommandSpawn { .. }));
    }

    #[tokio::test]
    async fn stuck_command_times_out() {
        let script = stub_script("sleep 5");
        let controller =
            StandbyController::with_timeout(script.to_path_buf(), Duration::from_millis(50));
        let err = controller
            .send_standby(Path::new("/dev/sda"))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn drive_timeout_passes_value_before_device() {
        // `echo` accepts anything; we only care that the call succeeds and
        // the arguments render in hdparm order.
        let controller = StandbyController::new(PathBuf::from("echo"));
        controller
            .set_drive_timeout(Path::new("/dev/sda"), 242)
            .await
            .unwrap();
        assert_eq!(
            controller.render(&[OsString::from("-S"), OsString::from("242")]),
            "echo -S 242"
        );
    }
}
