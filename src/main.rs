use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod monitor;
mod poll;
mod standby;

use config::Config;
use monitor::StatsReader;
use poll::PollLoop;

#[derive(Parser)]
#[command(name = "spindownd", version)]
#[command(about = "Spin down idle disks after a configurable inactivity window", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor disks and send idle ones to standby
    Run {
        /// Seconds of inactivity before a disk is sent to standby
        #[arg(short = 't', long, default_value = "10800")]
        timeout: u64,

        /// Also program the drive's own standby timer (hdparm -S value, 0-255)
        #[arg(short = 's', long)]
        drive_standby: Option<u8>,

        /// Idle policy: timeout or every-poll
        #[arg(short = 'm', long, default_value = "timeout")]
        mode: String,

        /// Seconds between polls (default: timeout / 100, minimum 1)
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Seconds to wait before the first poll while drives enumerate
        #[arg(long, default_value = "120")]
        warmup: u64,

        /// Disk statistics file
        #[arg(long, default_value = "/proc/diskstats")]
        diskstats: PathBuf,

        /// hdparm-compatible executable used to issue standby commands
        #[arg(long, default_value = "hdparm")]
        hdparm: PathBuf,

        /// Block devices to monitor (e.g. /dev/sda)
        #[arg(required = true)]
        devices: Vec<PathBuf>,
    },
    /// List devices and sector counters from the statistics file
    List {
        /// Disk statistics file
        #[arg(long, default_value = "/proc/diskstats")]
        diskstats: PathBuf,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            timeout,
            drive_standby,
            mode,
            poll_interval,
            warmup,
            diskstats,
            hdparm,
            devices,
        } => {
            anyhow::ensure!(timeout > 0, "timeout must be at least 1 second");
            let config = Config {
                devices,
                timeout: Duration::from_secs(timeout),
                mode: mode.parse()?,
                drive_standby,
                poll_interval: poll_interval.map(Duration::from_secs),
                warmup: Duration::from_secs(warmup),
                diskstats,
                hdparm,
            };
            run_monitor(config).await?;
        }
        Commands::List { diskstats, json } => {
            list_devices(&diskstats, json)?;
        }
    }

    Ok(())
}

async fn run_monitor(config: Config) -> anyhow::Result<()> {
    let poll = PollLoop::init(&config).await?;
    tokio::select! {
        result = poll.run() => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, exiting");
            Ok(())
        }
    }
}

fn list_devices(diskstats: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = StatsReader::new(diskstats.to_path_buf()).read()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    let mut names: Vec<&String> = snapshot.keys().collect();
    names.sort();
    println!("{:<16} {:>16} {:>16}", "DEVICE", "SECTORS READ", "SECTORS WRITTEN");
    for name in names {
        let counters = &snapshot[name];
        println!(
            "{:<16} {:>16} {:>16}",
            name, counters.sectors_read, counters.sectors_written
        );
    }
    Ok(())
}
