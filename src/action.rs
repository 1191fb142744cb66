//! Button-to-action mapping
//!
//! The M720 reports its thumb and side buttons under more than one code
//! depending on receiver and firmware, so lookups first normalize a raw code
//! to its canonical button, then resolve the canonical button to an
//! [`Action`]. The resulting [`ActionMap`] is immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::BindingsConfig;
use crate::error::ConfigError;

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_SIDE: u16 = 0x113;
pub const BTN_EXTRA: u16 = 0x114;
pub const BTN_FORWARD: u16 = 0x115;
pub const BTN_BACK: u16 = 0x116;
pub const BTN_TASK: u16 = 0x117;

/// Mouse button names, in code order
const BUTTON_NAMES: &[(u16, &str)] = &[
    (BTN_LEFT, "BTN_LEFT"),
    (BTN_RIGHT, "BTN_RIGHT"),
    (BTN_MIDDLE, "BTN_MIDDLE"),
    (BTN_SIDE, "BTN_SIDE"),
    (BTN_EXTRA, "BTN_EXTRA"),
    (BTN_FORWARD, "BTN_FORWARD"),
    (BTN_BACK, "BTN_BACK"),
    (BTN_TASK, "BTN_TASK"),
];

/// evdev name of a known mouse button
pub fn known_button_name(code: u16) -> Option<&'static str> {
    BUTTON_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Display name for a button code (e.g. `BTN_SIDE`), or `BTN_<code>`
pub fn button_name(code: u16) -> String {
    known_button_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("BTN_{code}"))
}

/// Resolve a button name (case-insensitive, `BTN_` prefix optional)
pub fn button_code_from_name(name: &str) -> Option<u16> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("BTN_") {
        upper
    } else {
        format!("BTN_{upper}")
    };
    BUTTON_NAMES
        .iter()
        .find(|(_, n)| *n == full)
        .map(|(c, _)| *c)
}

/// Logical remapping target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Switch to the previous virtual desktop (Super+PageUp)
    DesktopLeft,
    /// Switch to the next virtual desktop (Super+PageDown)
    DesktopRight,
    /// No binding; never injected
    Unmapped,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::DesktopLeft => "desktop-left",
            Action::DesktopRight => "desktop-right",
            Action::Unmapped => "unmapped",
        }
    }

    /// Key chord shown to the user
    pub fn chord(&self) -> &'static str {
        match self {
            Action::DesktopLeft => "Super + Page Up",
            Action::DesktopRight => "Super + Page Down",
            Action::Unmapped => "-",
        }
    }

    pub fn is_mapped(&self) -> bool {
        *self != Action::Unmapped
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static lookup from raw button code to [`Action`]
#[derive(Debug, Clone)]
pub struct ActionMap {
    /// Raw code -> canonical button code
    aliases: HashMap<u16, u16>,
    /// Canonical button code -> action
    actions: HashMap<u16, Action>,
}

impl ActionMap {
    /// Build the table from configured bindings.
    ///
    /// Fails if any raw code (canonical or alias) would resolve to two
    /// different actions.
    pub fn from_config(config: &BindingsConfig) -> Result<Self, ConfigError> {
        let mut aliases: HashMap<u16, u16> = HashMap::new();
        let mut actions: HashMap<u16, Action> = HashMap::new();
        // Every raw code seen so far and the action it resolves to
        let mut resolved: HashMap<u16, Action> = HashMap::new();

        for binding in &config.buttons {
            let canonical = binding.code.0;
            let raw_codes = std::iter::once(canonical).chain(binding.aliases.iter().map(|a| a.0));

            for raw in raw_codes {
                if let Some(&existing) = resolved.get(&raw) {
                    if existing != binding.action {
                        return Err(ConfigError::ConflictingBinding {
                            code: raw,
                            first: existing.name(),
                            second: binding.action.name(),
                        });
                    }
                    continue;
                }
                resolved.insert(raw, binding.action);
                if raw != canonical {
                    aliases.insert(raw, canonical);
                }
            }

            actions.insert(canonical, binding.action);
        }

        Ok(Self { aliases, actions })
    }

    /// Normalize a raw code to its canonical button
    pub fn canonical(&self, code: u16) -> u16 {
        self.aliases.get(&code).copied().unwrap_or(code)
    }

    /// Look up the action for a raw button code. Never fails.
    pub fn map_code(&self, code: u16) -> Action {
        self.actions
            .get(&self.canonical(code))
            .copied()
            .unwrap_or(Action::Unmapped)
    }

    /// All raw codes that resolve to a mapped action, sorted
    pub fn mapped_codes(&self) -> Vec<u16> {
        let mut codes: Vec<u16> = self
            .actions
            .iter()
            .filter(|(_, a)| a.is_mapped())
            .map(|(c, _)| *c)
            .chain(
                self.aliases
                    .iter()
                    .filter(|(_, canonical)| {
                        self.actions.get(canonical).is_some_and(|a| a.is_mapped())
                    })
                    .map(|(raw, _)| *raw),
            )
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }
}

impl Default for ActionMap {
    fn default() -> Self {
        // Default bindings never conflict
        Self::from_config(&BindingsConfig::default()).unwrap_or_else(|_| Self {
            aliases: HashMap::new(),
            actions: HashMap::new(),
        })
    }
}
