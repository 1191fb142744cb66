//! Logitech M720 Button Remapper
//!
//! Finds the mouse, makes sure ydotoold is up, then maps thumb/side button
//! presses to virtual desktop switches until interrupted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use m720_remapper::action::button_name;
use m720_remapper::config::RemapperConfig;
use m720_remapper::daemon;
use m720_remapper::device::{self, DeviceInfo, DeviceMatcher, EvdevSource};
use m720_remapper::dispatch::Dispatcher;
use m720_remapper::error::RemapError;
use m720_remapper::injector::YdotoolInjector;
use m720_remapper::ActionMap;

#[derive(Parser)]
#[command(name = "m720-remapper", version)]
#[command(about = "Map Logitech M720 side buttons to virtual desktop switching")]
struct Cli {
    /// Config file path (default: ~/.config/m720-remapper/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// List input devices and whether they match, then exit
    #[arg(long)]
    list_devices: bool,

    /// Don't check for or start ydotoold
    #[arg(long)]
    no_daemon: bool,

    /// Write the effective config to the config path, then exit
    #[arg(long)]
    write_config: bool,
}

fn setup_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Clear the returned flag on SIGINT/SIGTERM
fn setup_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    Ok(running)
}

fn print_devices(devices: &[DeviceInfo], matcher: &DeviceMatcher) {
    println!("Available devices:");
    if devices.is_empty() {
        println!("  (none readable)");
    }
    for (i, dev) in devices.iter().enumerate() {
        let marker = if matcher.matches_device(dev) { "*" } else { " " };
        println!("{} {}: {} ({})", marker, i, dev.name, dev.path.display());
    }

    let unreadable = device::unreadable_nodes();
    if !unreadable.is_empty() {
        println!(
            "{} device node(s) could not be opened (permission denied)",
            unreadable.len()
        );
    }
}

fn print_mapping(map: &ActionMap) {
    info!("Button mapping:");
    for code in map.mapped_codes() {
        let canonical = map.canonical(code);
        let action = map.map_code(code);
        if canonical == code {
            info!("  {} -> {}", button_name(code), action.chord());
        } else {
            info!(
                "  {} (same as {}) -> {}",
                button_name(code),
                button_name(canonical),
                action.chord()
            );
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config_path = cli.config.unwrap_or_else(RemapperConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let config = RemapperConfig::load(&config_path)?;
    let map = ActionMap::from_config(&config.bindings)?;
    let matcher = DeviceMatcher::from_config(&config.device);

    if cli.write_config {
        config.save(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    if cli.list_devices {
        print_devices(&device::list_devices(), &matcher);
        return Ok(());
    }

    if !nix::unistd::geteuid().is_root() {
        eprintln!("This program needs root access to read input devices.");
        eprintln!("Please run with: sudo m720-remapper");
        std::process::exit(1);
    }

    if !cli.no_daemon {
        if let Err(e) = daemon::ensure_running(&config.daemon) {
            warn!("Could not start {}: {}", config.daemon.name, e);
        }
    }

    let info = match device::find_device(device::list_devices(), &matcher) {
        Ok(info) => info,
        Err(RemapError::DeviceNotFound { available }) => {
            eprintln!("M720 mouse not found!");
            print_devices(&available, &matcher);
            bail!("No device matching {:?}", config.device.name_substrings);
        }
        Err(e) => return Err(e.into()),
    };

    let source = EvdevSource::open(&info)?;
    let running = setup_interrupt_handler()?;

    info!("M720 Button Remapper started on {}", info);
    print_mapping(&map);
    info!("Press Ctrl+C to exit");

    let injector = YdotoolInjector::new(config.injector.program.clone());
    info!("Sending shortcuts with {}", injector.program());
    let mut dispatcher = Dispatcher::new(map, injector).with_timeout(config.poll_timeout());
    let result = dispatcher.run(source, &running);

    let stats = dispatcher.stats();
    info!(
        "Handled {} press(es): {} injected, {} failed, {} unmapped",
        stats.presses, stats.injections, stats.failures, stats.unmapped
    );

    result?;
    Ok(())
}
