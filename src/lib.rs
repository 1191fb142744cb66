//! Logitech M720 Button Remapper
//!
//! Listens for the M720's thumb and side buttons on evdev and turns them into
//! virtual desktop switches (Super+PageUp / Super+PageDown) via ydotool.

pub mod action;
pub mod config;
pub mod daemon;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod injector;

pub use action::{button_name, Action, ActionMap};
pub use config::{BindingsConfig, ButtonBinding, ButtonCode, RemapperConfig};
pub use daemon::{ensure_running, DaemonError, DaemonStatus};
pub use device::{
    find_device, list_devices, DeviceInfo, DeviceMatcher, EvdevSource, InputSource, Readiness,
};
pub use dispatch::{DispatchStats, Dispatcher, LoopState, Outcome};
pub use error::{ConfigError, RemapError};
pub use event::{Event, EventKind};
pub use injector::{InjectionError, KeyInjector, YdotoolInjector};
