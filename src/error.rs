use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, MonitorError>;

/// Everything that can go wrong inside a poll cycle. None of these abort
/// the process; the loop logs them and carries on with the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("cannot read disk statistics from {path}: {source}")]
    Stats {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {field} counter {value:?} for device {device}")]
    Parse {
        device: String,
        field: &'static str,
        value: String,
    },

    #[error("failed to run `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {output}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        output: String,
    },

    #[error("`{command}` did not finish within {secs}s")]
    CommandTimeout { command: String, secs: u64 },
}
