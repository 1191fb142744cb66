//! Remapper configuration
//!
//! Stored as TOML at `~/.config/m720-remapper/config.toml`. A missing file
//! means "use the built-in M720 defaults". Button codes can be written either
//! as evdev names (`"BTN_SIDE"`) or as raw numbers (`275`); known codes are
//! saved back as names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::action::{
    button_code_from_name, known_button_name, Action, BTN_BACK, BTN_EXTRA, BTN_FORWARD,
    BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE,
};
use crate::error::ConfigError;

/// A button code that (de)serializes as its evdev name where possible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonCode(pub u16);

impl Serialize for ButtonCode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match known_button_name(self.0) {
            Some(name) => s.serialize_str(name),
            None => s.serialize_u16(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ButtonCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ButtonRepr {
            Code(u16),
            Name(String),
        }

        match ButtonRepr::deserialize(d)? {
            ButtonRepr::Code(code) => Ok(ButtonCode(code)),
            ButtonRepr::Name(name) => button_code_from_name(&name)
                .or_else(|| name.parse::<u16>().ok())
                .map(ButtonCode)
                .ok_or_else(|| {
                    serde::de::Error::custom(ConfigError::UnknownButton(name).to_string())
                }),
        }
    }
}

/// Which input device to listen on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// A device matches if its name contains any of these
    #[serde(default = "default_name_substrings")]
    pub name_substrings: Vec<String>,
    /// ...and it reports at least one of these buttons
    #[serde(default = "default_button_codes")]
    pub button_codes: Vec<ButtonCode>,
}

fn default_name_substrings() -> Vec<String> {
    vec!["M720".to_string(), "Logitech".to_string()]
}

fn default_button_codes() -> Vec<ButtonCode> {
    [
        BTN_LEFT,
        BTN_RIGHT,
        BTN_MIDDLE,
        BTN_SIDE,
        BTN_EXTRA,
        BTN_FORWARD,
        BTN_BACK,
    ]
    .into_iter()
    .map(ButtonCode)
    .collect()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name_substrings: default_name_substrings(),
            button_codes: default_button_codes(),
        }
    }
}

/// One physical button and the action it triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonBinding {
    /// Canonical button code
    pub code: ButtonCode,
    pub action: Action,
    /// Alternate codes the same physical button may report
    #[serde(default)]
    pub aliases: Vec<ButtonCode>,
}

/// Button bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingsConfig {
    #[serde(default = "default_buttons", rename = "button")]
    pub buttons: Vec<ButtonBinding>,
}

fn default_buttons() -> Vec<ButtonBinding> {
    vec![
        ButtonBinding {
            code: ButtonCode(BTN_SIDE),
            action: Action::DesktopRight,
            aliases: vec![ButtonCode(BTN_BACK)],
        },
        ButtonBinding {
            code: ButtonCode(BTN_EXTRA),
            action: Action::DesktopLeft,
            aliases: vec![ButtonCode(BTN_FORWARD)],
        },
    ]
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            buttons: default_buttons(),
        }
    }
}

/// External key injection tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectorConfig {
    #[serde(default = "default_injector_program")]
    pub program: String,
}

fn default_injector_program() -> String {
    "ydotool".to_string()
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            program: default_injector_program(),
        }
    }
}

/// Injection daemon bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Process name looked up with `pgrep -x`
    #[serde(default = "default_daemon_name")]
    pub name: String,
    /// Command line used to start it
    #[serde(default = "default_daemon_command")]
    pub command: Vec<String>,
    /// Upper bound on waiting for the daemon to appear after starting it
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,
}

fn default_daemon_name() -> String {
    "ydotoold".to_string()
}

fn default_daemon_command() -> Vec<String> {
    vec!["ydotoold".to_string()]
}

fn default_settle_timeout() -> u64 {
    2000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: default_daemon_name(),
            command: default_daemon_command(),
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

impl DaemonConfig {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

/// Complete remapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapperConfig {
    /// Wait timeout of the dispatch loop; bounds shutdown latency
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub bindings: BindingsConfig,
    #[serde(default)]
    pub injector: InjectorConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Shortest wait timeout; zero would turn the wait into a busy loop
pub const MIN_POLL_TIMEOUT_MS: u64 = 1;
/// Longest wait timeout `poll(2)` accepts here
pub const MAX_POLL_TIMEOUT_MS: u64 = u16::MAX as u64;

fn default_poll_timeout() -> u64 {
    1000
}

impl Default for RemapperConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout(),
            device: DeviceConfig::default(),
            bindings: BindingsConfig::default(),
            injector: InjectorConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl RemapperConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("m720-remapper")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde can't express as types
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_POLL_TIMEOUT_MS..=MAX_POLL_TIMEOUT_MS).contains(&self.poll_timeout_ms) {
            return Err(ConfigError::InvalidPollTimeout {
                value: self.poll_timeout_ms,
                min: MIN_POLL_TIMEOUT_MS,
                max: MAX_POLL_TIMEOUT_MS,
            });
        }
        Ok(())
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Raw codes of the configured mouse buttons
    pub fn button_codes(&self) -> Vec<u16> {
        self.device.button_codes.iter().map(|c| c.0).collect()
    }
}
