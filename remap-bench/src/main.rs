//! M720 Remapper Benchmarks
//!
//! Compares the userspace remapper against a kernel module and a hybrid
//! design. Only the userspace numbers can be measured; the other two are
//! simulated and labelled as such in the console report and the JSON file.
//!
//! Usage:
//!   remap-bench                   # Measure (root) or simulate (non-root)
//!   remap-bench --simulate        # Never start the remapper
//!   remap-bench --duration 5      # Shorter run

mod approach;
mod report;
mod result;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::info;

use approach::BenchOptions;

/// M720 remapper performance comparison
#[derive(Parser)]
#[command(name = "remap-bench", version, about)]
struct Cli {
    /// Don't run the remapper; report simulated figures only
    #[arg(long)]
    simulate: bool,

    /// JSON output file
    #[arg(short, long, default_value = "benchmark_results.json")]
    output: PathBuf,

    /// Seconds per timed approach
    #[arg(short, long, default_value_t = 30)]
    duration: u64,

    /// Synthetic events per second
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
    rate: u32,

    /// Remapper binary (default: m720-remapper next to this executable)
    #[arg(long)]
    remapper: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn default_remapper() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.with_file_name("m720-remapper"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut simulate = cli.simulate;
    if !simulate && !nix::unistd::geteuid().is_root() {
        println!("Note: measuring the remapper requires root privileges.");
        println!("Run with sudo for real measurements. Falling back to simulation mode.");
        simulate = true;
    }

    let opts = BenchOptions {
        duration: Duration::from_secs(cli.duration),
        rate: cli.rate,
        simulate,
        remapper: cli.remapper.or_else(default_remapper),
    };

    println!("M720 Button Remapper Performance Benchmarks");
    println!("{}", "=".repeat(50));
    info!(
        "[{}] {}s per approach at {} events/s{}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        cli.duration,
        cli.rate,
        if simulate { " (simulation mode)" } else { "" }
    );

    let mut results = Vec::new();

    println!("\nTesting userspace approach...");
    results.push(approach::userspace(&opts)?);

    println!("\nTesting kernel module approach (simulated)...");
    results.push(approach::kernel_module(&opts));

    println!("\nTesting hybrid approach (estimated)...");
    results.push(approach::hybrid(&opts));

    println!();
    for line in report::render(&results) {
        println!("{line}");
    }

    report::save_json(&results, &cli.output)?;
    println!("\nResults saved to: {}", cli.output.display());

    Ok(())
}
