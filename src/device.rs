//! Input device discovery and reading
//!
//! Discovery is split in two so the matching heuristic can be tested without
//! hardware: [`list_devices`] enumerates evdev nodes into plain
//! [`DeviceInfo`] records, and [`DeviceMatcher`] decides which of those is
//! the mouse we want. [`EvdevSource`] then opens the chosen node for the
//! dispatch loop.
//!
//! The device is never grabbed. Other readers (the compositor in particular)
//! keep receiving every event, so clicks, motion and scrolling stay normal.

use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev::Device;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::RemapError;
use crate::event::Event;

const INPUT_DIR: &str = "/dev/input";

/// Description of an enumerated input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    /// Supported EV_KEY codes (keys and buttons)
    pub keys: Vec<u16>,
}

impl DeviceInfo {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, keys: Vec<u16>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            keys,
        }
    }

    fn from_device(path: PathBuf, device: &Device) -> Self {
        let keys = device
            .supported_keys()
            .map(|keys| keys.iter().map(|k| k.code()).collect())
            .unwrap_or_default();
        Self {
            path,
            name: device.name().unwrap_or("Unknown").to_string(),
            keys,
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Decides whether a device is the mouse to listen on
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    name_substrings: Vec<String>,
    button_codes: Vec<u16>,
}

impl DeviceMatcher {
    pub fn new(name_substrings: Vec<String>, button_codes: Vec<u16>) -> Self {
        Self {
            name_substrings,
            button_codes,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.name_substrings.clone(),
            config.button_codes.iter().map(|c| c.0).collect(),
        )
    }

    /// Name contains any configured substring
    pub fn name_matches(&self, name: &str) -> bool {
        self.name_substrings.iter().any(|s| name.contains(s.as_str()))
    }

    /// Configured mouse buttons this capability set reports
    pub fn buttons_in<'a>(&'a self, keys: &'a [u16]) -> impl Iterator<Item = u16> + 'a {
        self.button_codes
            .iter()
            .copied()
            .filter(move |code| keys.contains(code))
    }

    /// Name matches AND at least one configured mouse button is present
    pub fn matches(&self, name: &str, keys: &[u16]) -> bool {
        self.name_matches(name) && self.buttons_in(keys).next().is_some()
    }

    pub fn matches_device(&self, device: &DeviceInfo) -> bool {
        self.matches(&device.name, &device.keys)
    }
}

/// Pick the first candidate accepted by `matcher`.
///
/// On failure the error carries every candidate so the caller can list them.
pub fn find_device<I>(candidates: I, matcher: &DeviceMatcher) -> Result<DeviceInfo, RemapError>
where
    I: IntoIterator<Item = DeviceInfo>,
{
    let candidates: Vec<DeviceInfo> = candidates.into_iter().collect();

    for device in &candidates {
        if !matcher.name_matches(&device.name) {
            continue;
        }
        debug!("Found potential device: {}", device);

        let buttons: Vec<String> = matcher
            .buttons_in(&device.keys)
            .map(crate::action::button_name)
            .collect();
        if buttons.is_empty() {
            debug!("  {} has no mouse buttons, skipping", device.name);
            continue;
        }

        info!("Found device {} with buttons: {}", device, buttons.join(", "));
        return Ok(device.clone());
    }

    Err(RemapError::DeviceNotFound {
        available: candidates,
    })
}

/// Trailing number of an `eventN` node, for ordering
fn event_index(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Enumerate readable evdev devices, ordered by event node number.
///
/// Nodes the current user cannot open are silently absent; see
/// [`unreadable_nodes`].
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut devices: Vec<DeviceInfo> = evdev::enumerate()
        .map(|(path, device)| DeviceInfo::from_device(path, &device))
        .collect();
    devices.sort_by_key(|d| (event_index(&d.path).unwrap_or(u32::MAX), d.path.clone()));
    devices
}

/// `/dev/input/event*` nodes that exist but cannot be opened for lack of
/// permission
pub fn unreadable_nodes() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(INPUT_DIR) else {
        return Vec::new();
    };

    let mut nodes: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| event_index(p).is_some())
        .filter(|p| {
            matches!(
                std::fs::File::open(p),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied
            )
        })
        .collect();
    nodes.sort_by_key(|p| event_index(p));
    nodes
}

/// Result of waiting on an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Events are pending
    Ready,
    /// Timeout elapsed (or the wait was interrupted by a signal)
    TimedOut,
}

/// A readable stream of input events owned by the dispatch loop
pub trait InputSource {
    /// Display name for logs
    fn name(&self) -> &str;

    /// Block until events are pending or `timeout` elapses
    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness>;

    /// Read pending events without blocking.
    ///
    /// An empty batch means nothing is pending; a would-block read is not an
    /// error. Events not returned here are reported by the next `wait`.
    fn drain(&mut self) -> io::Result<Vec<Event>>;
}

/// A non-grabbed evdev device opened for reading
pub struct EvdevSource {
    device: Device,
    info: DeviceInfo,
}

impl EvdevSource {
    /// Open the device node in non-blocking mode
    pub fn open(info: &DeviceInfo) -> Result<Self, RemapError> {
        let device =
            Device::open(&info.path).map_err(|e| RemapError::from_open(info.path.clone(), e))?;

        set_nonblocking(&device).map_err(|e| RemapError::Open {
            path: info.path.clone(),
            source: e,
        })?;

        info!("Listening on {} (not grabbed)", info);
        Ok(Self {
            device,
            info: info.clone(),
        })
    }
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    let current = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(current) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

impl InputSource for EvdevSource {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness> {
        // SAFETY: the fd belongs to self.device, which outlives this call
        let fd = unsafe { BorrowedFd::borrow_raw(self.device.as_raw_fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        let timeout_ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);

        match poll(&mut fds, timeout_ms) {
            Ok(0) => Ok(Readiness::TimedOut),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL)
                {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        format!("{} went away ({:?})", self.info.name, revents),
                    ));
                }
                Ok(Readiness::Ready)
            }
            Err(Errno::EINTR) => Ok(Readiness::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    fn drain(&mut self) -> io::Result<Vec<Event>> {
        // One read per wake-up: evdev resyncs after SYN_DROPPED inside the
        // read, and a second read that would block discards that resync.
        // Anything left over makes the next poll report ready again.
        collect_batch(self.device.fetch_events())
    }
}

/// Convert the result of a single `fetch_events` into a batch.
/// Would-block and interrupted reads are an empty batch.
fn collect_batch<I>(fetched: io::Result<I>) -> io::Result<Vec<Event>>
where
    I: Iterator<Item = evdev::InputEvent>,
{
    match fetched {
        Ok(batch) => Ok(batch.map(Event::from).collect()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
