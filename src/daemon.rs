//! ydotoold bootstrap
//!
//! `ydotool` talks to a background daemon. Before the dispatch loop starts,
//! make sure one is running: look it up with `pgrep -x`, spawn it detached if
//! absent, then poll until it shows up or the settle timeout passes.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;

/// How often to re-check for the daemon after starting it
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("No daemon command configured")]
    EmptyCommand,

    #[error("{program} not found. Please install ydotool (e.g. sudo dnf install ydotool)")]
    NotFound { program: String },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited right after starting ({status})")]
    Exited { program: String, status: ExitStatus },
}

/// How the daemon came to be available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    /// Found running before we did anything
    AlreadyRunning,
    /// Started and seen by `pgrep` within the settle timeout
    Started,
    /// Started but not seen before the settle timeout; injection may fail
    Unconfirmed,
}

/// Whether a process named exactly `name` is running
pub fn is_running(name: &str) -> bool {
    match Command::new("pgrep")
        .arg("-x")
        .arg(name)
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!("pgrep unavailable: {}", e);
            false
        }
    }
}

/// Spawn the daemon detached from our stdio and process group
pub fn start(command: &[String]) -> Result<Child, DaemonError> {
    let (program, args) = command.split_first().ok_or(DaemonError::EmptyCommand)?;

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        // Keep Ctrl+C in our terminal from reaching the daemon
        .process_group(0)
        .spawn()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DaemonError::NotFound {
                    program: program.clone(),
                }
            } else {
                DaemonError::Spawn {
                    program: program.clone(),
                    source: e,
                }
            }
        })
}

/// Poll `check` every `interval` until it holds or `timeout` elapses.
/// Always checks at least once.
pub fn wait_for(timeout: Duration, interval: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}

/// Make sure the injection daemon is running, starting it if needed
pub fn ensure_running(config: &DaemonConfig) -> Result<DaemonStatus, DaemonError> {
    if is_running(&config.name) {
        info!("{} is already running", config.name);
        return Ok(DaemonStatus::AlreadyRunning);
    }

    info!("Starting {}...", config.name);
    let mut child = start(&config.command)?;
    let program = config.command.first().cloned().unwrap_or_default();

    let mut exited = None;
    let up = wait_for(config.settle_timeout(), POLL_INTERVAL, || {
        if is_running(&config.name) {
            return true;
        }
        match child.try_wait() {
            Ok(Some(status)) => {
                exited = Some(status);
                true
            }
            _ => false,
        }
    });

    if let Some(status) = exited {
        return Err(DaemonError::Exited { program, status });
    }

    if up {
        info!("{} started (pid {})", config.name, child.id());
        Ok(DaemonStatus::Started)
    } else {
        warn!(
            "{} not visible after {:?}; continuing anyway",
            config.name,
            config.settle_timeout()
        );
        Ok(DaemonStatus::Unconfirmed)
    }
}
