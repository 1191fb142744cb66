//! Synthetic key chord injection
//!
//! Each [`Action`] has a fixed press/release sequence of Linux key codes. The
//! [`KeyInjector`] trait is the seam between the dispatch loop and whatever
//! actually emits the keys; [`YdotoolInjector`] shells out to `ydotool`, and
//! tests substitute a recording fake.

use std::io;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::action::Action;

pub const KEY_LEFTMETA: u16 = 125;
pub const KEY_PAGEUP: u16 = 104;
pub const KEY_PAGEDOWN: u16 = 109;

/// One key transition in an injection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub code: u16,
    pub pressed: bool,
}

impl KeyStroke {
    pub const fn down(code: u16) -> Self {
        Self {
            code,
            pressed: true,
        }
    }

    pub const fn up(code: u16) -> Self {
        Self {
            code,
            pressed: false,
        }
    }

    /// `ydotool key` token, e.g. `125:1`
    pub fn token(&self) -> String {
        format!("{}:{}", self.code, u8::from(self.pressed))
    }
}

const SUPER_PAGE_UP: &[KeyStroke] = &[
    KeyStroke::down(KEY_LEFTMETA),
    KeyStroke::down(KEY_PAGEUP),
    KeyStroke::up(KEY_PAGEUP),
    KeyStroke::up(KEY_LEFTMETA),
];

const SUPER_PAGE_DOWN: &[KeyStroke] = &[
    KeyStroke::down(KEY_LEFTMETA),
    KeyStroke::down(KEY_PAGEDOWN),
    KeyStroke::up(KEY_PAGEDOWN),
    KeyStroke::up(KEY_LEFTMETA),
];

/// Injection sequence for an action; `None` for [`Action::Unmapped`]
pub fn sequence_for(action: Action) -> Option<&'static [KeyStroke]> {
    match action {
        Action::DesktopLeft => Some(SUPER_PAGE_UP),
        Action::DesktopRight => Some(SUPER_PAGE_DOWN),
        Action::Unmapped => None,
    }
}

/// Render a sequence as `ydotool key` arguments
pub fn format_sequence(sequence: &[KeyStroke]) -> Vec<String> {
    sequence.iter().map(KeyStroke::token).collect()
}

/// Errors from key injection. None of these are fatal to the dispatch loop.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("{tool} not found. Please install it (e.g. sudo dnf install ydotool)")]
    ToolUnavailable { tool: String },

    #[error("{tool} failed with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Something that can emit the key chord for an action.
///
/// Calls are synchronous: the chord has been fully sent (or has failed)
/// when `inject` returns.
pub trait KeyInjector {
    fn inject(&mut self, action: Action) -> Result<(), InjectionError>;
}

/// Injects chords by running `ydotool key ...`
#[derive(Debug, Clone)]
pub struct YdotoolInjector {
    program: String,
}

impl YdotoolInjector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl KeyInjector for YdotoolInjector {
    fn inject(&mut self, action: Action) -> Result<(), InjectionError> {
        let Some(sequence) = sequence_for(action) else {
            debug!("Ignoring injection request for {}", action);
            return Ok(());
        };

        let args = format_sequence(sequence);
        debug!("Running {} key {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .arg("key")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    InjectionError::ToolUnavailable {
                        tool: self.program.clone(),
                    }
                } else {
                    InjectionError::Spawn {
                        tool: self.program.clone(),
                        source: e,
                    }
                }
            })?;

        if !output.status.success() {
            return Err(InjectionError::ToolFailed {
                tool: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_match_ydotool_format() {
        assert_eq!(
            format_sequence(sequence_for(Action::DesktopLeft).unwrap()),
            vec!["125:1", "104:1", "104:0", "125:0"]
        );
        assert_eq!(
            format_sequence(sequence_for(Action::DesktopRight).unwrap()),
            vec!["125:1", "109:1", "109:0", "125:0"]
        );
        assert!(sequence_for(Action::Unmapped).is_none());
    }

    #[test]
    fn test_sequences_release_everything_they_press() {
        for action in [Action::DesktopLeft, Action::DesktopRight] {
            let seq = sequence_for(action).unwrap();
            let presses = seq.iter().filter(|k| k.pressed).count();
            let releases = seq.iter().filter(|k| !k.pressed).count();
            assert_eq!(presses, releases);
            // Modifier wraps the chord
            assert_eq!(seq.first(), Some(&KeyStroke::down(KEY_LEFTMETA)));
            assert_eq!(seq.last(), Some(&KeyStroke::up(KEY_LEFTMETA)));
        }
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let mut injector = YdotoolInjector::new("/nonexistent/ydotool-for-tests");
        match injector.inject(Action::DesktopLeft) {
            Err(InjectionError::ToolUnavailable { tool }) => {
                assert_eq!(tool, "/nonexistent/ydotool-for-tests");
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_exit_is_tool_failed() {
        // `false` ignores its arguments and exits 1
        let mut injector = YdotoolInjector::new("false");
        assert!(matches!(
            injector.inject(Action::DesktopRight),
            Err(InjectionError::ToolFailed { .. })
        ));
    }

    #[test]
    fn test_zero_exit_is_success() {
        let mut injector = YdotoolInjector::new("true");
        assert_eq!(injector.program(), "true");
        assert!(injector.inject(Action::DesktopRight).is_ok());
    }

    #[test]
    fn test_unmapped_is_noop() {
        // Would fail if it actually tried to run anything
        let mut injector = YdotoolInjector::new("/nonexistent/ydotool-for-tests");
        assert!(injector.inject(Action::Unmapped).is_ok());
    }
}
