//! The three remapping approaches being compared.
//!
//! Only the userspace remapper can actually be run. The kernel module and
//! hybrid numbers are generated from fixed figures and flagged as simulated
//! in every record.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::sys::signal::{self, Signal};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::result::{mean, BenchmarkResult, LatencyStats};

pub const USERSPACE: &str = "Userspace";
pub const USERSPACE_SIMULATED: &str = "Userspace (Simulated)";
pub const KERNEL_MODULE: &str = "Kernel Module (Simulated)";
pub const HYBRID: &str = "Hybrid (Estimated)";

/// Time given to the remapper to find its device before sampling
const SETTLE_TIME: Duration = Duration::from_secs(2);

/// Stand-in for per-event processing in the userspace measurement
const PLACEHOLDER_WORK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub duration: Duration,
    /// Synthetic events per second
    pub rate: u32,
    pub simulate: bool,
    /// Remapper binary for the userspace run
    pub remapper: Option<PathBuf>,
}

impl BenchOptions {
    fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate.max(1)
    }

    /// Events a run of `duration` at `rate` should produce
    pub fn expected_events(&self) -> u64 {
        (self.duration.as_secs_f64() * f64::from(self.rate)).round() as u64
    }
}

/// Call `tick` with the elapsed time, once per interval, for `duration`
fn run_paced(opts: &BenchOptions, mut tick: impl FnMut(Duration)) -> u64 {
    let start = Instant::now();
    let mut ticks = 0;
    while start.elapsed() < opts.duration {
        tick(start.elapsed());
        ticks += 1;
        std::thread::sleep(opts.interval());
    }
    ticks
}

/// Stops and reaps the remapper on every exit path
struct ChildGuard(Child);

impl ChildGuard {
    /// SIGTERM so the remapper shuts down in order, then reap it
    fn terminate(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.0.try_wait()? {
            return Ok(status);
        }
        let pid = nix::unistd::Pid::from_raw(self.0.id() as i32);
        if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
            warn!("SIGTERM to remapper failed ({}), killing it", e);
            self.0.kill()?;
        }
        self.0.wait()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        match self.terminate() {
            Ok(status) => debug!("Remapper exited: {}", status),
            Err(e) => warn!("Failed to stop remapper: {}", e),
        }
    }
}

fn spawn_remapper(path: &Path) -> Result<ChildGuard> {
    let child = Command::new(path)
        .args(["--log-level", "warn"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start {}", path.display()))?;
    info!("Started {} (pid {})", path.display(), child.id());
    Ok(ChildGuard(child))
}

/// Userspace remapper: runs the real binary when possible and samples its
/// CPU and RSS. Latency samples time a 1 ms placeholder, not real input.
pub fn userspace(opts: &BenchOptions) -> Result<BenchmarkResult> {
    let target = if opts.simulate {
        None
    } else {
        opts.remapper.as_deref().filter(|p| p.exists())
    };
    if target.is_none() && !opts.simulate {
        warn!("Remapper binary not found; resource usage will not be measured");
    }

    let child = target.map(spawn_remapper).transpose()?;
    if child.is_some() {
        std::thread::sleep(SETTLE_TIME);
    }

    let pid = child.as_ref().map(|c| Pid::from_u32(c.0.id()));
    let mut sys = System::new();
    let mut latencies = Vec::new();
    let mut cpu = Vec::new();
    let mut memory = Vec::new();

    let total = run_paced(opts, |_| {
        let start = Instant::now();
        std::thread::sleep(PLACEHOLDER_WORK);
        latencies.push(start.elapsed().as_secs_f64() * 1000.0);

        if let Some(pid) = pid {
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::everything(),
            );
            if let Some(proc) = sys.process(pid) {
                cpu.push(f64::from(proc.cpu_usage()));
                memory.push(proc.memory() as f64 / 1_048_576.0);
            }
        }
    });
    drop(child);

    let name = if pid.is_some() { USERSPACE } else { USERSPACE_SIMULATED };
    Ok(
        BenchmarkResult::new(name, LatencyStats::from_samples(&latencies), pid.is_none())
            .with_resources(mean(&cpu), mean(&memory))
            .with_events(total, 0),
    )
}

/// Kernel module latency pattern: 0.1 to 0.2 ms
pub fn kernel_latency_ms(elapsed: Duration) -> f64 {
    0.1 + (elapsed.as_secs_f64() % 0.001) * 100.0
}

/// Kernel module: generated figures, nothing is loaded
pub fn kernel_module(opts: &BenchOptions) -> BenchmarkResult {
    let mut latencies = Vec::new();
    let total = run_paced(opts, |elapsed| latencies.push(kernel_latency_ms(elapsed)));

    BenchmarkResult::new(KERNEL_MODULE, LatencyStats::from_samples(&latencies), true)
        .with_resources(0.1, 0.05)
        .with_events(total, 0)
}

/// Hybrid: fixed estimates, returns immediately
pub fn hybrid(opts: &BenchOptions) -> BenchmarkResult {
    let latency = LatencyStats {
        avg_ms: 0.15,
        min_ms: 0.1,
        max_ms: 0.3,
        std_ms: 0.05,
    };
    BenchmarkResult::new(HYBRID, latency, true)
        .with_resources(0.5, 2.0)
        .with_events(opts.expected_events(), 0)
}
